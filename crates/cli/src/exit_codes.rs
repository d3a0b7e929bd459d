//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: schedulers and batch scripts
//! rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain       | Description                                  |
//! |---------|--------------|----------------------------------------------|
//! | 0       | Universal    | Success                                      |
//! | 1       | Universal    | General error (unspecified)                  |
//! | 2       | Universal    | CLI usage error (bad args, missing file)     |
//! | 3-9     | run          | Batch consolidation codes                    |
//! | 10-19   | homologation | Homologation table codes (`lookup`, `validate`) |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use glosas_recon::error::DiagnosticCode;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (3-9)
// =============================================================================

/// Config file unreadable, unparsable, or failing validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// An input path does not exist or a directory cannot be listed.
pub const EXIT_INPUT: u8 = 4;

/// No invoice pair could be consolidated; no artifact was written.
pub const EXIT_EMPTY_BATCH: u8 = 5;

/// Output directory or artifact could not be written.
pub const EXIT_OUTPUT_UNWRITABLE: u8 = 6;

/// Artifact written, but diagnostics were raised and `--strict` was given.
pub const EXIT_RUN_DIAGNOSTICS: u8 = 7;

// =============================================================================
// Homologation (10-19)
// =============================================================================

/// Homologation workbook missing or unreadable.
pub const EXIT_HOMOLOGATION_UNAVAILABLE: u8 = 10;

/// Homologation workbook lacks required columns.
pub const EXIT_HOMOLOGATION_COLUMNS: u8 = 11;

/// Map a run-fatal or command-fatal diagnostic to its exit code.
pub fn diagnostic_exit_code(code: DiagnosticCode) -> u8 {
    match code {
        DiagnosticCode::InvalidConfig => EXIT_INVALID_CONFIG,
        DiagnosticCode::Io => EXIT_INPUT,
        DiagnosticCode::EmptyBatch => EXIT_EMPTY_BATCH,
        DiagnosticCode::OutputUnwritable => EXIT_OUTPUT_UNWRITABLE,
        DiagnosticCode::HomologationUnavailable | DiagnosticCode::WorkbookReadError => {
            EXIT_HOMOLOGATION_UNAVAILABLE
        }
        DiagnosticCode::MissingHomologationColumns => EXIT_HOMOLOGATION_COLUMNS,
        _ => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INVALID_CONFIG,
            EXIT_INPUT,
            EXIT_EMPTY_BATCH,
            EXIT_OUTPUT_UNWRITABLE,
            EXIT_RUN_DIAGNOSTICS,
            EXIT_HOMOLOGATION_UNAVAILABLE,
            EXIT_HOMOLOGATION_COLUMNS,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn fatal_diagnostics_map_to_run_range() {
        assert_eq!(diagnostic_exit_code(DiagnosticCode::EmptyBatch), EXIT_EMPTY_BATCH);
        assert_eq!(diagnostic_exit_code(DiagnosticCode::OutputUnwritable), EXIT_OUTPUT_UNWRITABLE);
        assert_eq!(diagnostic_exit_code(DiagnosticCode::UnpairedFile), EXIT_ERROR);
    }
}

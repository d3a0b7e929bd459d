// Batch orchestration: discover inputs, run the engine against the
// filesystem, write the artifact and fold everything into a RunReport.

use std::path::{Path, PathBuf};

use glosas_recon::config::{Insurer, RunConfig};
use glosas_recon::engine::{run, HomologationSummary};
use glosas_recon::error::{Diagnostic, GlosaError};
use glosas_recon::model::{InvoicePair, RunStats};
use serde::Serialize;
use tracing::{error, info};

use crate::artifact::write_artifact;
use crate::discover::discover_inputs;
use crate::source::FileSheets;

/// Result record handed back to the orchestrator for one (insurer, batch).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub insurer: Insurer,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub stats: RunStats,
    pub homologation: HomologationSummary,
    pub pairs: Vec<InvoicePair>,
    pub diagnostics: Vec<Diagnostic>,
    /// Run-fatal error that prevented the artifact from being written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<Diagnostic>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let mut s = format!(
            "{}: {} pair(s) consolidated, {} failed, {} row(s), {} homologated",
            self.insurer,
            self.stats.pairs_processed,
            self.stats.failed_pairs,
            self.stats.consolidated_rows,
            self.stats.homologated,
        );
        if let Some(path) = &self.output_path {
            s.push_str(&format!(" -> {}", path.display()));
        }
        s
    }
}

/// Run one batch end to end.
///
/// Only input discovery failures are returned as `Err`; run-fatal errors
/// (`EmptyBatch`, `OutputUnwritable`) are reported through
/// [`RunReport::fatal`] with `success = false`.
pub fn run_batch<P: AsRef<Path>>(config: &RunConfig, inputs: &[P]) -> Result<RunReport, GlosaError> {
    let files: Vec<PathBuf> = discover_inputs(inputs)?
        .into_iter()
        .filter(|p| p != &config.homologation_path)
        .collect();
    info!(insurer = %config.insurer, files = files.len(), "starting batch");

    let output = run(config, &files, &FileSheets);

    let written = output
        .ensure_non_empty()
        .and_then(|()| write_artifact(&output, &config.output_dir));
    let (output_path, fatal) = match written {
        Ok(path) => (Some(path), None),
        Err(err) => {
            error!("{err}");
            (None, Some(Diagnostic::error(&err)))
        }
    };

    Ok(RunReport {
        insurer: config.insurer,
        success: fatal.is_none(),
        output_path,
        stats: output.stats,
        homologation: output.homologation,
        pairs: output.pairs,
        diagnostics: output.diagnostics,
        fatal,
    })
}

// Subcommand implementations: run, pair, lookup, validate.

use std::path::{Path, PathBuf};

use glosas_io::{discover_inputs, run_batch, FileSheets, RunReport};
use glosas_recon::engine::load_homologation;
use glosas_recon::error::{Diagnostic, GlosaError};
use glosas_recon::homologation::{resolver_for, CodeResolver, HomologationTable};
use glosas_recon::pairing::pair_files;
use glosas_recon::RunConfig;
use serde::Serialize;
use serde_json::json;

use crate::exit_codes::{diagnostic_exit_code, EXIT_RUN_DIAGNOSTICS};
use crate::settings::{load_config, Overrides};
use crate::CliError;

/// Map an engine error to its exit code, with a hint where one helps.
pub fn glosa_err(err: GlosaError) -> CliError {
    let hint = match &err {
        GlosaError::HomologationUnavailable { .. } => {
            Some("set homologation_path in the config or pass --homologation")
        }
        GlosaError::MissingHomologationColumns { .. } => {
            Some("map the workbook headers under [homologation_columns]")
        }
        GlosaError::OutputUnwritable { .. } => Some("check --output-dir permissions"),
        GlosaError::EmptyBatch { .. } => Some("rerun with -v or --json to see why each pair failed"),
        GlosaError::Io(_) => Some("inputs must be existing files or directories"),
        _ => None,
    };
    let cli = CliError {
        code: diagnostic_exit_code(err.code()),
        message: err.to_string(),
        hint: None,
    };
    match hint {
        Some(h) => cli.with_hint(h),
        None => cli,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(format!("JSON encode: {e}")))?;
    println!("{text}");
    Ok(())
}

// ============================================================================
// run
// ============================================================================

pub struct RunOptions {
    pub json: bool,
    pub strict: bool,
    pub show_diagnostics: bool,
}

pub fn cmd_run(
    config_path: Option<&Path>,
    overrides: &Overrides,
    inputs: &[PathBuf],
    opts: RunOptions,
) -> Result<(), CliError> {
    if inputs.is_empty() {
        return Err(CliError::usage("no input files or directories given")
            .with_hint("glosas run <DIR|FILE>... (e.g. glosas run ./bandeja)"));
    }
    let config = load_config(config_path, overrides, false)?;
    let report = run_batch(&config, inputs).map_err(glosa_err)?;

    if opts.json {
        print_json(&report)?;
    } else {
        print_run_summary(&report, opts.show_diagnostics);
    }

    if let Some(fatal) = &report.fatal {
        let err = CliError {
            code: diagnostic_exit_code(fatal.code),
            message: fatal.message.clone(),
            hint: None,
        };
        return Err(if report.diagnostics.is_empty() {
            err
        } else {
            err.with_hint("rerun with --show-diagnostics to see why each pair failed")
        });
    }
    if opts.strict && !report.diagnostics.is_empty() {
        return Err(CliError {
            code: EXIT_RUN_DIAGNOSTICS,
            message: format!("{} diagnostic(s) raised (--strict)", report.diagnostics.len()),
            hint: None,
        });
    }
    Ok(())
}

fn print_run_summary(report: &RunReport, show_diagnostics: bool) {
    eprintln!("{}", report.summary());
    eprintln!(
        "  homologation: {} ({} entries, {} billing codes)",
        report.homologation.mode, report.homologation.entries, report.homologation.billing_codes
    );
    if report.stats.orphan_rejections > 0 {
        eprintln!("  orphan rejections: {}", report.stats.orphan_rejections);
    }
    if report.diagnostics.is_empty() {
        return;
    }
    if show_diagnostics {
        for d in &report.diagnostics {
            eprintln!("  {d}");
        }
    } else {
        eprintln!(
            "  {} diagnostic(s); --show-diagnostics to list them",
            report.diagnostics.len()
        );
    }
}

// ============================================================================
// pair
// ============================================================================

pub fn cmd_pair(inputs: &[PathBuf], json: bool) -> Result<(), CliError> {
    if inputs.is_empty() {
        return Err(CliError::usage("no input files or directories given"));
    }
    let files = discover_inputs(inputs).map_err(glosa_err)?;
    let out = pair_files(&files);
    let warnings: Vec<Diagnostic> = out.warnings.iter().map(Diagnostic::warning).collect();

    if json {
        return print_json(&json!({
            "pairs": out.pairs,
            "warnings": warnings,
        }));
    }

    for pair in &out.pairs {
        println!("{}\t{}\t{}", pair.invoice_id, pair.detail.display(), pair.rejection.display());
    }
    for w in &warnings {
        eprintln!("warning: {}", w.message);
    }
    eprintln!("{} pair(s), {} warning(s)", out.pairs.len(), warnings.len());
    Ok(())
}

// ============================================================================
// lookup
// ============================================================================

#[derive(Debug, Serialize)]
struct LookupResult<'a> {
    code: &'a str,
    homologated: Option<String>,
}

pub fn cmd_lookup(
    config_path: Option<&Path>,
    overrides: &Overrides,
    codes: &[String],
    json: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path, overrides, true)?;
    let table = load_homologation(&config, &FileSheets).map_err(glosa_err)?;
    let resolver = resolver_for(Some(&table), config.policy());

    let results: Vec<LookupResult> = codes
        .iter()
        .map(|code| LookupResult {
            code: code.as_str(),
            homologated: resolver.lookup(code),
        })
        .collect();

    if json {
        return print_json(&json!({
            "insurer": config.insurer,
            "mode": resolver.mode(),
            "results": results,
        }));
    }

    for r in &results {
        match &r.homologated {
            Some(h) => println!("{}\t{}", r.code, h),
            None => println!("{}\t(no match, kept as is)", r.code),
        }
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

#[derive(Debug, Serialize)]
struct ValidateReport<'a> {
    insurer: String,
    homologation_path: &'a Path,
    output_dir: &'a Path,
    mode: String,
    entries: usize,
    billing_codes: usize,
    ambiguous: Vec<String>,
    detail_required: Vec<String>,
    rejection_required: Vec<String>,
}

pub fn cmd_validate(config_path: Option<&Path>, overrides: &Overrides, json: bool) -> Result<(), CliError> {
    let config = load_config(config_path, overrides, false)?;
    let table = load_homologation(&config, &FileSheets).map_err(glosa_err)?;
    let report = validate_report(&config, &table);

    if json {
        return print_json(&report);
    }

    eprintln!("config OK: {} ({} homologation)", report.insurer, report.mode);
    eprintln!(
        "  homologation: {} ({} entries, {} billing codes)",
        report.homologation_path.display(),
        report.entries,
        report.billing_codes
    );
    eprintln!("  output dir:   {}", report.output_dir.display());
    eprintln!("  detail columns:    {}", report.detail_required.join(", "));
    eprintln!("  rejection columns: {}", report.rejection_required.join(", "));
    for a in &report.ambiguous {
        eprintln!("warning: {a}");
    }
    Ok(())
}

fn validate_report<'a>(config: &'a RunConfig, table: &HomologationTable) -> ValidateReport<'a> {
    ValidateReport {
        insurer: config.insurer.to_string(),
        homologation_path: &config.homologation_path,
        output_dir: &config.output_dir,
        mode: resolver_for(Some(table), config.policy()).mode().to_string(),
        entries: table.len(),
        billing_codes: table.billing_universe().map(|u| u.len()).unwrap_or(0),
        ambiguous: table.ambiguity_errors().iter().map(|e| e.to_string()).collect(),
        detail_required: config.detail_required(),
        rejection_required: config.rejection_required(),
    }
}

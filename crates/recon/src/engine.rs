use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Insurer, RunConfig};
use crate::consolidate::{consolidate_pair, Accumulator};
use crate::error::{Diagnostic, GlosaError};
use crate::homologation::{resolver_for, CodeResolver, HomologationMode, HomologationTable};
use crate::model::{InvoicePair, RunStats, Table};
use crate::normalize::{normalize_sheet, SheetSource};
use crate::pairing::pair_files;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub insurer: Insurer,
    pub engine_version: String,
    pub run_at: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomologationSummary {
    pub mode: HomologationMode,
    pub path: PathBuf,
    pub entries: usize,
    pub billing_codes: usize,
    pub ambiguous_codes: usize,
}

/// Everything the artifact writer needs, plus the diagnostics list.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub meta: RunMeta,
    pub homologation: HomologationSummary,
    pub pairs: Vec<InvoicePair>,
    pub consolidated: Table,
    pub objections: Table,
    pub stats: RunStats,
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchOutput {
    /// The run fails only when no pair was consolidated.
    pub fn ensure_non_empty(&self) -> Result<(), GlosaError> {
        if self.stats.pairs_processed == 0 {
            return Err(GlosaError::EmptyBatch {
                failed: self.stats.failed_pairs,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Homologation load
// ---------------------------------------------------------------------------

/// Load and index the configured homologation workbook.
pub fn load_homologation(config: &RunConfig, source: &dyn SheetSource) -> Result<HomologationTable, GlosaError> {
    let path = &config.homologation_path;
    if !source.exists(path) {
        return Err(GlosaError::HomologationUnavailable { path: path.clone() });
    }
    let table = source.read_first_sheet(path)?;
    HomologationTable::from_table(&table, &config.homologation_columns, config.policy())
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Pair `files`, load the homologation table and consolidate every pair.
///
/// A homologation load failure downgrades the run to "no homologation"; the
/// caller decides what to do with an empty batch (see [`BatchOutput::ensure_non_empty`]).
pub fn run<P: AsRef<Path>>(config: &RunConfig, files: &[P], source: &dyn SheetSource) -> BatchOutput {
    let run_at = Local::now();
    let mut diagnostics = Vec::new();

    let table = match load_homologation(config, source) {
        Ok(table) => {
            info!(
                entries = table.len(),
                billing_codes = table.billing_universe().map_or(0, |b| b.len()),
                "homologation table loaded"
            );
            for err in table.ambiguity_errors() {
                warn!("{err}");
                diagnostics.push(Diagnostic::warning(&err));
            }
            Some(table)
        }
        Err(err) => {
            warn!("{err}; continuing without homologation");
            diagnostics.push(Diagnostic::error(&err));
            None
        }
    };
    let resolver = resolver_for(table.as_ref(), config.policy());

    let pairing = pair_files(files);
    for err in &pairing.warnings {
        warn!("{err}");
        diagnostics.push(Diagnostic::warning(err));
    }
    info!(files = files.len(), pairs = pairing.pairs.len(), "input files paired");

    let (acc, pair_diagnostics) = consolidate_pairs(config, &pairing.pairs, source, resolver.as_ref());
    diagnostics.extend(pair_diagnostics);
    let (consolidated, objections, stats) = acc.finish();

    info!(
        pairs = stats.pairs_processed,
        failed = stats.failed_pairs,
        rows = stats.consolidated_rows,
        homologated = stats.homologated,
        "consolidation finished"
    );

    BatchOutput {
        meta: RunMeta {
            insurer: config.insurer,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at,
        },
        homologation: HomologationSummary {
            mode: resolver.mode(),
            path: config.homologation_path.clone(),
            entries: table.as_ref().map_or(0, HomologationTable::len),
            billing_codes: table
                .as_ref()
                .and_then(HomologationTable::billing_universe)
                .map_or(0, |b| b.len()),
            ambiguous_codes: table.as_ref().map_or(0, |t| t.ambiguous_codes().len()),
        },
        pairs: pairing.pairs,
        consolidated,
        objections,
        stats,
        diagnostics,
    }
}

/// Consolidate already-paired files. Per-pair failures are recorded and the
/// pair skipped; the rest of the batch continues.
pub fn consolidate_pairs(
    config: &RunConfig,
    pairs: &[InvoicePair],
    source: &dyn SheetSource,
    resolver: &dyn CodeResolver,
) -> (Accumulator, Vec<Diagnostic>) {
    let mut acc = Accumulator::new();
    let mut diagnostics = Vec::new();

    let detail_required = config.detail_required();
    let rejection_required = config.rejection_required();
    let detail_text = [
        config.detail_columns.service_code.as_str(),
        config.detail_columns.position_key.as_str(),
    ];
    let rejection_text = [config.rejection_columns.position_key.as_str()];

    for pair in pairs {
        let result = normalize_sheet(source, &pair.detail, &detail_required[..], &detail_text)
            .and_then(|detail| {
                let rejections =
                    normalize_sheet(source, &pair.rejection, &rejection_required[..], &rejection_text)?;
                Ok((detail, rejections))
            })
            .and_then(|(detail, rejections)| {
                consolidate_pair(
                    pair,
                    &detail,
                    &rejections,
                    &config.detail_columns,
                    &config.rejection_columns,
                    resolver,
                )
            });

        match result {
            Ok(mut tables) => {
                for err in tables.header_warnings.drain(..) {
                    warn!(invoice = %pair.invoice_id, "{err}");
                    diagnostics.push(Diagnostic::warning(&err).for_invoice(&pair.invoice_id));
                }
                for key in &tables.orphan_keys {
                    let err = GlosaError::OrphanRejection {
                        invoice: pair.invoice_id.clone(),
                        position_key: key.clone(),
                    };
                    warn!("{err}");
                    diagnostics.push(Diagnostic::warning(&err));
                }
                acc.push(tables);
            }
            Err(err) => {
                warn!(invoice = %pair.invoice_id, "{err}; pair skipped");
                diagnostics.push(Diagnostic::error(&err).for_invoice(&pair.invoice_id));
                acc.record_failure();
            }
        }
    }

    (acc, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticCode;
    use crate::model::Cell;
    use crate::normalize::InMemorySheets;

    fn homologation_sheet() -> Table {
        let mut t = Table::new(["CODIGO_SERVICIO", "CODIGO_PRODUCTO", "CODIGO_FACTURACION"]);
        t.push_row(vec![Cell::text("1"), Cell::text("A"), Cell::text("A")]);
        t.push_row(vec![Cell::text("1"), Cell::text("B"), Cell::text("B")]);
        t
    }

    #[test]
    fn missing_homologation_downgrades() {
        let config = RunConfig::new(Insurer::Mutualser, "/nowhere/h.xlsx", "/out");
        let out = run::<&str>(&config, &[], &InMemorySheets::new());
        assert_eq!(out.homologation.mode, HomologationMode::Disabled);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, DiagnosticCode::HomologationUnavailable);
        assert!(matches!(out.ensure_non_empty(), Err(GlosaError::EmptyBatch { failed: 0 })));
    }

    #[test]
    fn ambiguous_codes_are_reported() {
        let mut sheets = InMemorySheets::new();
        sheets.insert("/h.xlsx", homologation_sheet());
        let config = RunConfig::new(Insurer::Coosalud, "/h.xlsx", "/out");
        let out = run::<&str>(&config, &[], &sheets);
        assert_eq!(out.homologation.mode, HomologationMode::Direct);
        assert_eq!(out.homologation.entries, 2);
        assert_eq!(out.homologation.ambiguous_codes, 1);
        assert_eq!(out.diagnostics[0].code, DiagnosticCode::AmbiguousHomologation);
    }

    #[test]
    fn validated_mode_counts_billing_codes() {
        let mut sheets = InMemorySheets::new();
        sheets.insert("/h.xlsx", homologation_sheet());
        let config = RunConfig::new(Insurer::Mutualser, "/h.xlsx", "/out");
        let out = run::<&str>(&config, &[], &sheets);
        assert_eq!(out.homologation.mode, HomologationMode::Validated);
        assert_eq!(out.homologation.billing_codes, 2);
    }

    #[test]
    fn renamed_headers_are_reported_per_invoice() {
        let mut headers = crate::config::DetailColumns::default().all();
        headers.extend(["VALOR".to_string(), "VALOR".to_string()]);
        let mut detail = Table::new(&headers);
        detail.push_row(
            ["FC1", "2026-01-10", "C1", "1", "0", "1", "", "1", "a", "b"]
                .map(Cell::text)
                .to_vec(),
        );
        let mut rejections = Table::new(crate::config::RejectionColumns::default().all());
        rejections.push_row(vec![Cell::text("1"), Cell::text("G1"), Cell::text("j")]);

        let mut sheets = InMemorySheets::new();
        sheets.insert("/h.xlsx", homologation_sheet());
        sheets.insert("/in/DETALLE FC1.xlsx", detail);
        sheets.insert("/in/GLOSAS FC1.xlsx", rejections);
        let config = RunConfig::new(Insurer::Coosalud, "/h.xlsx", "/out");
        let out = run(&config, &sheets.paths(), &sheets);

        let renamed: Vec<&Diagnostic> = out
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::RenamedColumns)
            .collect();
        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed[0].invoice.as_deref(), Some("FC1"));
        assert_eq!(renamed[0].path.as_deref(), Some(Path::new("/in/DETALLE FC1.xlsx")));
        assert_eq!(out.stats.pairs_processed, 1);
        assert_eq!(out.consolidated.get(0, "VALOR_2"), Some(&Cell::text("b")));
    }
}

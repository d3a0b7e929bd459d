use serde::Serialize;

use crate::engine::BatchOutput;

/// One RESUMEN row value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Count(usize),
    Text(String),
}

impl std::fmt::Display for SummaryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Statistic name → value rows for the RESUMEN sheet, in a fixed order.
pub fn summary_rows(output: &BatchOutput) -> Vec<(&'static str, SummaryValue)> {
    use SummaryValue::{Count, Text};

    let s = &output.stats;
    let h = &output.homologation;
    vec![
        ("insurer", Text(output.meta.insurer.to_string())),
        ("run_at", Text(output.meta.run_at.format("%Y-%m-%d %H:%M:%S").to_string())),
        ("engine_version", Text(output.meta.engine_version.clone())),
        ("homologation_mode", Text(h.mode.to_string())),
        ("homologation_path", Text(h.path.display().to_string())),
        ("homologation_entries", Count(h.entries)),
        ("billing_universe_size", Count(h.billing_codes)),
        ("files_processed", Count(s.files_processed)),
        ("pairs_processed", Count(s.pairs_processed)),
        ("failed_pairs", Count(s.failed_pairs)),
        ("detail_rows", Count(s.detail_rows)),
        ("rejection_rows", Count(s.rejection_rows)),
        ("consolidated_rows", Count(s.consolidated_rows)),
        ("homologated", Count(s.homologated)),
        ("orphan_rejections", Count(s.orphan_rejections)),
        ("diagnostics", Count(output.diagnostics.len())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Insurer, RunConfig};
    use crate::engine::run;
    use crate::normalize::InMemorySheets;

    #[test]
    fn rows_cover_every_counter() {
        let config = RunConfig::new(Insurer::Coosalud, "/missing.xlsx", "/out");
        let out = run::<&str>(&config, &[], &InMemorySheets::new());
        let rows = summary_rows(&out);

        let names: Vec<&str> = rows.iter().map(|(n, _)| *n).collect();
        for expected in [
            "detail_rows",
            "rejection_rows",
            "consolidated_rows",
            "homologated",
            "files_processed",
            "failed_pairs",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert_eq!(rows[0].1, SummaryValue::Text("COOSALUD".into()));
        let mode = rows.iter().find(|(n, _)| *n == "homologation_mode").unwrap();
        assert_eq!(mode.1.to_string(), "disabled");
    }
}

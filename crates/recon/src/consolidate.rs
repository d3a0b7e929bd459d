//! Join & consolidate: homologate detail rows and left-outer-join their
//! rejections on the position key.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, trace};

use crate::config::{DetailColumns, RejectionColumns};
use crate::error::GlosaError;
use crate::homologation::CodeResolver;
use crate::model::{Cell, InvoicePair, RunStats, Table};

/// Invoice identifier attached to every consolidated and objection row.
pub const INVOICE_ID_COLUMN: &str = "FACTURA_ID";
/// Service code as read from the detail file, before homologation.
pub const ORIGINAL_CODE_COLUMN: &str = "CODIGO_SERVICIO_ORIGINAL";
/// `SI` when the service code was homologated, `NO` otherwise.
pub const HOMOLOGATED_COLUMN: &str = "HOMOLOGADO";
/// Appended to rejection headers that collide with consolidated headers.
pub const REJECTION_SUFFIX: &str = "_GLOSA";

/// One pair's contribution to the run.
#[derive(Debug, Clone)]
pub struct PairTables {
    pub invoice_id: String,
    pub consolidated: Table,
    pub objections: Table,
    pub detail_rows: usize,
    pub rejection_rows: usize,
    pub homologated: usize,
    /// Position keys of rejections with no detail row, in file order.
    pub orphan_keys: Vec<String>,
    /// One [`GlosaError::RenamedColumns`] per file whose headers were renamed.
    pub header_warnings: Vec<GlosaError>,
}

fn column(table: &Table, name: &str, path: &Path) -> Result<usize, GlosaError> {
    table.column_index(name).ok_or_else(|| GlosaError::MissingRequiredColumns {
        path: path.to_path_buf(),
        columns: vec![name.trim().to_string()],
    })
}

/// Claim a name for the header in column `position` (0-based) of its file.
///
/// A blank header becomes `COLUMNA_<n>`; a name already taken gets `_2`,
/// `_3`, ... appended.
fn unique_header(name: &str, position: usize, taken: &mut HashSet<String>) -> String {
    let base = if name.is_empty() {
        format!("COLUMNA_{}", position + 1)
    } else {
        name.to_string()
    };
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn rename_note(original: &str, position: usize, renamed: &str) -> String {
    if original.is_empty() {
        format!("(blank column {}) -> {renamed}", position + 1)
    } else {
        format!("{original} -> {renamed}")
    }
}

fn key_at(row: &[Cell], col: usize) -> String {
    row.get(col).map(Cell::as_key).unwrap_or_default()
}

/// Consolidate one (detail, rejection) pair.
///
/// The output rows are ordered by position key, then rejection code with
/// blanks last; ties keep file order.
pub fn consolidate_pair(
    pair: &InvoicePair,
    detail: &Table,
    rejections: &Table,
    detail_cols: &DetailColumns,
    rejection_cols: &RejectionColumns,
    resolver: &dyn CodeResolver,
) -> Result<PairTables, GlosaError> {
    let invoice_id = pair.invoice_id.as_str();
    let d_key = column(detail, &detail_cols.position_key, &pair.detail)?;
    let d_code = column(detail, &detail_cols.service_code, &pair.detail)?;
    let r_key = column(rejections, &rejection_cols.position_key, &pair.rejection)?;
    let r_reason = column(rejections, &rejection_cols.reason_code, &pair.rejection)?;

    // Consolidated header: invoice id, detail columns, provenance, rejection
    // columns. Every name is unique so no column shadows another downstream.
    let mut taken: HashSet<String> = [INVOICE_ID_COLUMN, ORIGINAL_CODE_COLUMN, HOMOLOGATED_COLUMN]
        .into_iter()
        .map(String::from)
        .collect();
    let mut detail_renamed = Vec::new();
    let mut headers: Vec<String> = vec![INVOICE_ID_COLUMN.to_string()];
    for (i, h) in detail.headers().iter().enumerate() {
        let name = unique_header(h, i, &mut taken);
        if name != *h {
            detail_renamed.push(rename_note(h, i, &name));
        }
        headers.push(name);
    }
    headers.push(ORIGINAL_CODE_COLUMN.to_string());
    headers.push(HOMOLOGATED_COLUMN.to_string());

    let mut rejection_renamed = Vec::new();
    let rejection_cols_kept: Vec<usize> = (0..rejections.headers().len()).filter(|&i| i != r_key).collect();
    let mut reason_out = None;
    for &i in &rejection_cols_kept {
        let original = &rejections.headers()[i];
        let mut wanted = original.clone();
        if taken.contains(&wanted) {
            wanted.push_str(REJECTION_SUFFIX);
        }
        let name = unique_header(&wanted, i, &mut taken);
        if name != wanted {
            rejection_renamed.push(rename_note(original, i, &name));
        }
        if i == r_reason {
            reason_out = Some(headers.len());
        }
        headers.push(name);
    }

    let mut objection_taken: HashSet<String> = HashSet::from([INVOICE_ID_COLUMN.to_string()]);
    let mut objection_headers: Vec<String> = vec![INVOICE_ID_COLUMN.to_string()];
    for (i, h) in rejections.headers().iter().enumerate() {
        let name = unique_header(h, i, &mut objection_taken);
        if name != *h {
            let note = rename_note(h, i, &name);
            if !rejection_renamed.contains(&note) {
                rejection_renamed.push(note);
            }
        }
        objection_headers.push(name);
    }

    let mut header_warnings = Vec::new();
    for (path, renamed) in [(&pair.detail, detail_renamed), (&pair.rejection, rejection_renamed)] {
        if !renamed.is_empty() {
            header_warnings.push(GlosaError::RenamedColumns {
                path: path.clone(),
                renamed,
            });
        }
    }

    // Rejections grouped by position key, in file order.
    let detail_keys: HashSet<String> = detail
        .rows()
        .iter()
        .map(|row| key_at(row, d_key))
        .filter(|k| !k.is_empty())
        .collect();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    let mut objections = Table::new(&objection_headers);
    let mut orphan_keys = Vec::new();
    for (i, row) in rejections.rows().iter().enumerate() {
        let key = key_at(row, r_key);
        if key.is_empty() || !detail_keys.contains(&key) {
            orphan_keys.push(key);
            continue;
        }
        groups.entry(key).or_default().push(i);
        let mut cells = Vec::with_capacity(row.len() + 1);
        cells.push(Cell::text(invoice_id));
        cells.extend(row.iter().cloned());
        objections.push_row(cells);
    }

    let mut consolidated = Table::new(&headers);
    let mut homologated = 0;
    for row in detail.rows() {
        let original = key_at(row, d_code);
        let canonical = resolver.lookup(&original);
        trace!(invoice = invoice_id, code = %original, canonical = ?canonical, "lookup");

        let mut base = Vec::with_capacity(headers.len());
        base.push(Cell::text(invoice_id));
        base.extend(row.iter().cloned());
        let flag = match canonical {
            Some(code) => {
                homologated += 1;
                base[d_code + 1] = Cell::Text(code);
                "SI"
            }
            None => "NO",
        };
        base.push(if original.is_empty() { Cell::Empty } else { Cell::Text(original) });
        base.push(Cell::text(flag));

        let key = key_at(row, d_key);
        match groups.get(&key) {
            Some(indices) => {
                for &ri in indices {
                    let rej = &rejections.rows()[ri];
                    let mut cells = base.clone();
                    cells.extend(rejection_cols_kept.iter().map(|&c| rej[c].clone()));
                    consolidated.push_row(cells);
                }
            }
            None => consolidated.push_row(base),
        }
    }

    let key_out = d_key + 1;
    consolidated.sort_rows_by(|a, b| {
        a[key_out]
            .as_key()
            .cmp(&b[key_out].as_key())
            .then_with(|| match reason_out {
                Some(c) => cmp_nulls_last(&a[c], &b[c]),
                None => Ordering::Equal,
            })
    });
    let obj_key = r_key + 1;
    objections.sort_rows_by(|a, b| a[obj_key].as_key().cmp(&b[obj_key].as_key()));

    debug!(
        invoice = invoice_id,
        details = detail.len(),
        rejections = rejections.len(),
        consolidated = consolidated.len(),
        homologated,
        orphans = orphan_keys.len(),
        "pair consolidated"
    );

    Ok(PairTables {
        invoice_id: invoice_id.to_string(),
        consolidated,
        objections,
        detail_rows: detail.len(),
        rejection_rows: rejections.len(),
        homologated,
        orphan_keys,
        header_warnings,
    })
}

/// Ascending by stripped string, blank cells after every value.
fn cmp_nulls_last(a: &Cell, b: &Cell) -> Ordering {
    let (a, b) = (a.as_key(), b.as_key());
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(&b),
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Append-only run accumulator; tables are combined once in [`Accumulator::finish`].
#[derive(Debug, Default)]
pub struct Accumulator {
    pairs: Vec<PairTables>,
    failed_pairs: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pair: PairTables) {
        self.pairs.push(pair);
    }

    pub fn record_failure(&mut self) {
        self.failed_pairs += 1;
    }

    pub fn succeeded(&self) -> usize {
        self.pairs.len()
    }

    pub fn failed(&self) -> usize {
        self.failed_pairs
    }

    /// Concatenate in invoice order and compute the run statistics.
    pub fn finish(mut self) -> (Table, Table, RunStats) {
        self.pairs.sort_by(|a, b| a.invoice_id.cmp(&b.invoice_id));

        let mut stats = RunStats {
            failed_pairs: self.failed_pairs,
            pairs_processed: self.pairs.len(),
            files_processed: self.pairs.len() * 2,
            ..RunStats::default()
        };
        for p in &self.pairs {
            stats.detail_rows += p.detail_rows;
            stats.rejection_rows += p.rejection_rows;
            stats.consolidated_rows += p.consolidated.len();
            stats.homologated += p.homologated;
            stats.orphan_rejections += p.orphan_keys.len();
        }

        let (consolidated, objections): (Vec<Table>, Vec<Table>) = self
            .pairs
            .into_iter()
            .map(|p| (p.consolidated, p.objections))
            .unzip();
        (Table::concat(consolidated), Table::concat(objections), stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homologation::{HomologationEntry, HomologationTable, NoHomologation, resolver_for};
    use crate::config::HomologationPolicy;

    fn detail(rows: &[(&str, &str)]) -> Table {
        let mut t = Table::new(DetailColumns::default().all());
        for (key, code) in rows {
            t.push_row(vec![
                Cell::text("FC100"),
                Cell::text("2026-01-10"),
                Cell::text("C1"),
                Cell::Number(1000.0),
                Cell::Number(500.0),
                Cell::text(*code),
                Cell::text("obs"),
                Cell::text(*key),
            ]);
        }
        t
    }

    fn rejections(rows: &[(&str, &str)]) -> Table {
        let mut t = Table::new(RejectionColumns::default().all());
        for (key, reason) in rows {
            t.push_row(vec![Cell::text(*key), Cell::text(*reason), Cell::text("just")]);
        }
        t
    }

    fn pair(id: &str) -> InvoicePair {
        InvoicePair {
            invoice_id: id.into(),
            detail: format!("DETALLE {id}.xlsx").into(),
            rejection: format!("GLOSAS {id}.xlsx").into(),
        }
    }

    fn table() -> HomologationTable {
        HomologationTable::from_entries(
            vec![HomologationEntry {
                source_code: "890201".into(),
                canonical_code: "CUPS001".into(),
                billing_code: String::new(),
            }],
            None,
        )
    }

    #[test]
    fn multiplies_details_by_rejections() {
        let t = table();
        let resolver = resolver_for(Some(&t), HomologationPolicy::default());
        let out = consolidate_pair(
            &pair("FC100"),
            &detail(&[("1", "890201"), ("2", "999999")]),
            &rejections(&[("1", "G2"), ("1", "G1")]),
            &DetailColumns::default(),
            &RejectionColumns::default(),
            resolver.as_ref(),
        )
        .unwrap();

        assert_eq!(out.consolidated.len(), 3);
        assert_eq!(out.objections.len(), 2);
        assert_eq!(out.homologated, 1);
        assert!(out.orphan_keys.is_empty());

        let c = &out.consolidated;
        // ordered by key, then rejection code
        assert_eq!(c.get(0, "CODIGO_GLOSA"), Some(&Cell::text("G1")));
        assert_eq!(c.get(1, "CODIGO_GLOSA"), Some(&Cell::text("G2")));
        assert_eq!(c.get(2, "CODIGO_GLOSA"), Some(&Cell::Empty));
        assert_eq!(c.get(0, "CODIGO_SERVICIO"), Some(&Cell::text("CUPS001")));
        assert_eq!(c.get(0, ORIGINAL_CODE_COLUMN), Some(&Cell::text("890201")));
        assert_eq!(c.get(0, HOMOLOGATED_COLUMN), Some(&Cell::text("SI")));
        assert_eq!(c.get(2, "CODIGO_SERVICIO"), Some(&Cell::text("999999")));
        assert_eq!(c.get(2, HOMOLOGATED_COLUMN), Some(&Cell::text("NO")));
        assert_eq!(c.get(2, INVOICE_ID_COLUMN), Some(&Cell::text("FC100")));
    }

    #[test]
    fn orphan_rejections_are_excluded() {
        let out = consolidate_pair(
            &pair("FC1"),
            &detail(&[("1", "x")]),
            &rejections(&[("9", "G1"), ("", "G2"), ("1", "G3")]),
            &DetailColumns::default(),
            &RejectionColumns::default(),
            &NoHomologation,
        )
        .unwrap();
        assert_eq!(out.orphan_keys, vec!["9".to_string(), String::new()]);
        assert_eq!(out.objections.len(), 1);
        assert_eq!(out.consolidated.len(), 1);
        assert_eq!(out.rejection_rows, 3);
    }

    #[test]
    fn blank_detail_keys_never_join() {
        let out = consolidate_pair(
            &pair("FC1"),
            &detail(&[("", "x"), ("", "y")]),
            &rejections(&[("", "G1")]),
            &DetailColumns::default(),
            &RejectionColumns::default(),
            &NoHomologation,
        )
        .unwrap();
        assert_eq!(out.consolidated.len(), 2);
        assert_eq!(out.objections.len(), 0);
        assert_eq!(out.orphan_keys.len(), 1);
    }

    #[test]
    fn colliding_rejection_headers_get_suffix() {
        let mut r = Table::new(["CONSECUTIVO", "CODIGO_GLOSA", "JUSTIFICACION", "OBSERVACIONES"]);
        r.push_row(vec![Cell::text("1"), Cell::text("G1"), Cell::text("j"), Cell::text("rej obs")]);
        let out = consolidate_pair(
            &pair("FC1"),
            &detail(&[("1", "x")]),
            &r,
            &DetailColumns::default(),
            &RejectionColumns::default(),
            &NoHomologation,
        )
        .unwrap();
        assert_eq!(out.consolidated.get(0, "OBSERVACIONES"), Some(&Cell::text("obs")));
        assert_eq!(out.consolidated.get(0, "OBSERVACIONES_GLOSA"), Some(&Cell::text("rej obs")));
        // the join key appears once
        let keys = out.consolidated.headers().iter().filter(|h| h.as_str() == "CONSECUTIVO").count();
        assert_eq!(keys, 1);
        assert!(out.header_warnings.is_empty());
    }

    #[test]
    fn repeated_and_blank_detail_headers_survive_consolidation() {
        let mut headers = DetailColumns::default().all();
        headers.extend(["VALOR", "VALOR", INVOICE_ID_COLUMN, ""].map(String::from));
        let mut d = Table::new(&headers);
        d.push_row(vec![
            Cell::text("FC100"),
            Cell::text("2026-01-10"),
            Cell::text("C1"),
            Cell::Number(1000.0),
            Cell::Number(500.0),
            Cell::text("890201"),
            Cell::text("obs"),
            Cell::text("1"),
            Cell::text("first"),
            Cell::text("second"),
            Cell::text("ERP-77"),
            Cell::text("unnamed"),
        ]);

        let out = consolidate_pair(
            &pair("FC100"),
            &d,
            &rejections(&[("1", "G1")]),
            &DetailColumns::default(),
            &RejectionColumns::default(),
            &NoHomologation,
        )
        .unwrap();

        let c = &out.consolidated;
        assert_eq!(c.get(0, "VALOR"), Some(&Cell::text("first")));
        assert_eq!(c.get(0, "VALOR_2"), Some(&Cell::text("second")));
        assert_eq!(c.get(0, INVOICE_ID_COLUMN), Some(&Cell::text("FC100")));
        assert_eq!(c.get(0, "FACTURA_ID_2"), Some(&Cell::text("ERP-77")));
        assert_eq!(c.get(0, "COLUMNA_12"), Some(&Cell::text("unnamed")));

        assert_eq!(out.header_warnings.len(), 1);
        match &out.header_warnings[0] {
            GlosaError::RenamedColumns { path, renamed } => {
                assert_eq!(path, &pair("FC100").detail);
                assert_eq!(
                    renamed,
                    &vec![
                        "VALOR -> VALOR_2".to_string(),
                        "FACTURA_ID -> FACTURA_ID_2".to_string(),
                        "(blank column 12) -> COLUMNA_12".to_string(),
                    ]
                );
            }
            other => panic!("unexpected warning {other:?}"),
        }

        let mut acc = Accumulator::new();
        acc.push(out);
        let (consolidated, _, _) = acc.finish();
        assert_eq!(consolidated.get(0, "VALOR_2"), Some(&Cell::text("second")));
        assert_eq!(consolidated.get(0, "FACTURA_ID_2"), Some(&Cell::text("ERP-77")));
        assert_eq!(consolidated.get(0, "CODIGO_GLOSA"), Some(&Cell::text("G1")));
    }

    #[test]
    fn repeated_rejection_headers_survive_in_objections() {
        let mut r = Table::new(["CONSECUTIVO", "CODIGO_GLOSA", "JUSTIFICACION", "JUSTIFICACION"]);
        r.push_row(vec![Cell::text("1"), Cell::text("G1"), Cell::text("a"), Cell::text("b")]);
        let out = consolidate_pair(
            &pair("FC1"),
            &detail(&[("1", "x")]),
            &r,
            &DetailColumns::default(),
            &RejectionColumns::default(),
            &NoHomologation,
        )
        .unwrap();

        assert_eq!(out.consolidated.get(0, "JUSTIFICACION_GLOSA"), Some(&Cell::text("b")));
        assert_eq!(out.objections.get(0, "JUSTIFICACION"), Some(&Cell::text("a")));
        assert_eq!(out.objections.get(0, "JUSTIFICACION_2"), Some(&Cell::text("b")));
        assert_eq!(out.header_warnings.len(), 1);
        assert!(matches!(
            &out.header_warnings[0],
            GlosaError::RenamedColumns { renamed, .. } if renamed == &vec!["JUSTIFICACION -> JUSTIFICACION_2".to_string()]
        ));
    }

    #[test]
    fn accumulator_orders_by_invoice_and_sums() {
        let mut acc = Accumulator::new();
        for id in ["FC300", "FC100"] {
            acc.push(consolidate_pair(
                &pair(id),
                &detail(&[("1", "x")]),
                &rejections(&[("1", "G1"), ("1", "G2")]),
                &DetailColumns::default(),
                &RejectionColumns::default(),
                &NoHomologation,
            )
            .unwrap());
        }
        acc.record_failure();
        let (consolidated, objections, stats) = acc.finish();

        assert_eq!(consolidated.len(), 4);
        assert_eq!(objections.len(), 4);
        assert_eq!(consolidated.get(0, INVOICE_ID_COLUMN), Some(&Cell::text("FC100")));
        assert_eq!(consolidated.get(3, INVOICE_ID_COLUMN), Some(&Cell::text("FC300")));
        assert_eq!(
            stats,
            RunStats {
                detail_rows: 2,
                rejection_rows: 4,
                consolidated_rows: 4,
                homologated: 0,
                files_processed: 4,
                pairs_processed: 2,
                failed_pairs: 1,
                orphan_rejections: 0,
            }
        );
    }

    #[test]
    fn nulls_sort_last() {
        assert_eq!(cmp_nulls_last(&Cell::Empty, &Cell::text("A")), Ordering::Greater);
        assert_eq!(cmp_nulls_last(&Cell::text("A"), &Cell::text(" ")), Ordering::Less);
        assert_eq!(cmp_nulls_last(&Cell::text("B"), &Cell::text("A")), Ordering::Greater);
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::GlosaError;
use crate::model::Table;

/// Reads the first sheet of a workbook into a [`Table`] with stripped headers.
///
/// Implementations release their file handles before returning, on success
/// and on failure.
pub trait SheetSource {
    fn read_first_sheet(&self, path: &Path) -> Result<Table, GlosaError>;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Read `path`, check the required columns, and coerce `text_columns` to
/// their stripped string form. Rows are never dropped.
pub fn normalize_sheet<S: AsRef<str>>(
    source: &dyn SheetSource,
    path: &Path,
    required: &[S],
    text_columns: &[&str],
) -> Result<Table, GlosaError> {
    let mut table = source.read_first_sheet(path)?;

    let missing = table.missing_columns(required);
    if !missing.is_empty() {
        return Err(GlosaError::MissingRequiredColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    for column in text_columns {
        if !table.coerce_text(column) {
            return Err(GlosaError::MissingRequiredColumns {
                path: path.to_path_buf(),
                columns: vec![column.trim().to_string()],
            });
        }
    }

    Ok(table)
}

/// Sheets held in memory, keyed by path. Used where no filesystem is involved.
#[derive(Debug, Default, Clone)]
pub struct InMemorySheets {
    sheets: HashMap<PathBuf, Table>,
}

impl InMemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, table: Table) {
        self.sheets.insert(path.into(), table);
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.sheets.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl SheetSource for InMemorySheets {
    fn read_first_sheet(&self, path: &Path) -> Result<Table, GlosaError> {
        self.sheets.get(path).cloned().ok_or_else(|| GlosaError::WorkbookReadError {
            path: path.to_path_buf(),
            reason: "no such sheet".into(),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.sheets.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;

    fn source() -> InMemorySheets {
        let mut t = Table::new([" CONSECUTIVO", "CODIGO_SERVICIO ", "OBSERVACIONES"]);
        t.push_row(vec![Cell::Number(1.0), Cell::text(" 890201 "), Cell::text("  texto  ")]);
        t.push_row(vec![Cell::Empty, Cell::Empty, Cell::Empty]);
        let mut s = InMemorySheets::new();
        s.insert("DETALLE FC1.xlsx", t);
        s
    }

    #[test]
    fn coerces_keys_and_keeps_rows() {
        let table = normalize_sheet(
            &source(),
            Path::new("DETALLE FC1.xlsx"),
            &["CONSECUTIVO", "OBSERVACIONES"],
            &["CONSECUTIVO", "CODIGO_SERVICIO"],
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "CONSECUTIVO"), Some(&Cell::text("1")));
        assert_eq!(table.get(0, "CODIGO_SERVICIO"), Some(&Cell::text("890201")));
        // free text is left untouched
        assert_eq!(table.get(0, "OBSERVACIONES"), Some(&Cell::text("  texto  ")));
    }

    #[test]
    fn reports_every_missing_column() {
        let err = normalize_sheet(
            &source(),
            Path::new("DETALLE FC1.xlsx"),
            &["OBSERVACIONES", "FECHA_FACTURA", "NUMERO_FACTURA"],
            &[],
        )
        .unwrap_err();
        match err {
            GlosaError::MissingRequiredColumns { columns, .. } => {
                assert_eq!(columns, vec!["FECHA_FACTURA", "NUMERO_FACTURA"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_path_is_a_read_error() {
        let err = normalize_sheet::<&str>(&source(), Path::new("nope.xlsx"), &[], &[]).unwrap_err();
        assert!(matches!(err, GlosaError::WorkbookReadError { .. }));
    }
}

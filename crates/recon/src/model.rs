use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// One spreadsheet cell as read from a detail, rejection or homologation file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Stripped string form used for every key and code comparison.
    ///
    /// Integral numbers print without a fractional part so `890201.0` and
    /// `"890201"` compare equal.
    pub fn as_key(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => format_number(*n),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Row-of-record table keyed by a header → column-index map.
///
/// Headers are stripped on construction. When a header repeats, lookups by
/// name resolve to its first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = headers.into_iter().map(|h| h.as_ref().trim().to_string()).collect();
        let mut index = HashMap::with_capacity(headers.len());
        for (i, h) in headers.iter().enumerate() {
            index.entry(h.clone()).or_insert(i);
        }
        Self {
            headers,
            index,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name.trim()).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at (row, column name); `None` when the column does not exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Required names absent from the header row, in the order given.
    pub fn missing_columns<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for name in required {
            let name = name.as_ref().trim();
            if !self.has_column(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        missing
    }

    /// Rewrite every cell of `column` into its stripped text form.
    /// Returns false when the column does not exist.
    pub fn coerce_text(&mut self, column: &str) -> bool {
        let Some(col) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            let key = row[col].as_key();
            row[col] = if key.is_empty() { Cell::Empty } else { Cell::Text(key) };
        }
        true
    }

    /// Stack tables vertically, consuming them.
    ///
    /// Columns line up by (name, occurrence): the second `VALOR` of one table
    /// lands under the second `VALOR` of another, so repeated headers never
    /// overwrite each other. The header set is the union in first-seen order;
    /// cells for columns a table lacks are empty.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut slots: HashMap<(String, usize), usize> = HashMap::new();
        let mut headers: Vec<String> = Vec::new();
        let mut mappings: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
        for t in &tables {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            let mapping = t
                .headers
                .iter()
                .map(|h| {
                    let occurrence = seen.entry(h.as_str()).or_insert(0);
                    let slot = (h.clone(), *occurrence);
                    *occurrence += 1;
                    *slots.entry(slot).or_insert_with(|| {
                        headers.push(h.clone());
                        headers.len() - 1
                    })
                })
                .collect();
            mappings.push(mapping);
        }

        let mut out = Table::new(&headers);
        let width = headers.len();
        for (t, mapping) in tables.into_iter().zip(mappings) {
            for row in t.rows {
                let mut cells = vec![Cell::Empty; width];
                for (cell, &dst) in row.into_iter().zip(&mapping) {
                    cells[dst] = cell;
                }
                out.rows.push(cells);
            }
        }
        out
    }

    /// Stable sort of the rows by an arbitrary comparator.
    pub fn sort_rows_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Vec<Cell>, &Vec<Cell>) -> std::cmp::Ordering,
    {
        self.rows.sort_by(compare);
    }
}

// ---------------------------------------------------------------------------
// Pairing
// ---------------------------------------------------------------------------

/// A (detail, rejection) file pair sharing one invoice identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct InvoicePair {
    pub invoice_id: String,
    pub detail: PathBuf,
    pub rejection: PathBuf,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub detail_rows: usize,
    pub rejection_rows: usize,
    pub consolidated_rows: usize,
    pub homologated: usize,
    pub files_processed: usize,
    pub pairs_processed: usize,
    pub failed_pairs: usize,
    pub orphan_rejections: usize,
}

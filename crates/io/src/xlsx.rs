// Excel workbook import (xlsx, xlsm, xls, xlsb, ods)
//
// Only the first sheet is read. Its first row is the header row; every
// following row becomes one table row. Fully blank rows are skipped.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::Timelike;
use glosas_recon::error::GlosaError;
use glosas_recon::model::{Cell, Table};

fn read_error(path: &Path, reason: impl Into<String>) -> GlosaError {
    GlosaError::WorkbookReadError {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read the first worksheet of `path` into a [`Table`].
///
/// The workbook handle is dropped before returning on every path.
pub fn read_first_sheet(path: &Path) -> Result<Table, GlosaError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| read_error(path, format!("failed to open: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| read_error(path, "workbook contains no sheets"))?
        .map_err(|e| read_error(path, format!("failed to read first sheet: {e}")))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };
    let headers: Vec<String> = header_row.iter().map(|c| data_to_cell(c).to_string()).collect();

    let mut table = Table::new(headers);
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
        if cells.iter().all(Cell::is_blank) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

/// Convert one calamine cell. Numbers stay numeric so the key coercion can
/// print integral values without a fractional part.
pub fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => {
            if s.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::text(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.num_seconds_from_midnight() == 0 => Cell::Text(ts.format("%Y-%m-%d").to_string()),
            Some(ts) => Cell::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

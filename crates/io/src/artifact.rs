// Consolidated workbook export (xlsx only)
//
// One workbook per run: CONSOLIDADO, OBJECIONES and RESUMEN, in that order.
// This is the only step of a run that writes to the filesystem.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use glosas_recon::config::Insurer;
use glosas_recon::engine::BatchOutput;
use glosas_recon::error::GlosaError;
use glosas_recon::evidence::{summary_rows, SummaryValue};
use glosas_recon::model::{Cell, Table};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::info;

pub const CONSOLIDATED_SHEET: &str = "CONSOLIDADO";
pub const OBJECTIONS_SHEET: &str = "OBJECIONES";
pub const SUMMARY_SHEET: &str = "RESUMEN";

const SUMMARY_HEADERS: [&str; 2] = ["ESTADISTICA", "VALOR"];

const MIN_COLUMN_WIDTH: usize = 8;
const MAX_COLUMN_WIDTH: usize = 60;

/// `<INSURER>_GLOSAS_<YYYYMMDD_HHMMSS>.xlsx`
pub fn artifact_file_name(insurer: Insurer, at: &DateTime<Local>) -> String {
    format!("{}_GLOSAS_{}.xlsx", insurer, at.format("%Y%m%d_%H%M%S"))
}

/// Write the run artifact into `output_dir`, creating the directory if needed.
///
/// Returns the path of the written workbook.
pub fn write_artifact(output: &BatchOutput, output_dir: &Path) -> Result<PathBuf, GlosaError> {
    std::fs::create_dir_all(output_dir).map_err(|e| GlosaError::OutputUnwritable {
        path: output_dir.to_path_buf(),
        reason: format!("cannot create directory: {e}"),
    })?;

    let path = output_dir.join(artifact_file_name(output.meta.insurer, &output.meta.run_at));
    let unwritable = |e: XlsxError| GlosaError::OutputUnwritable {
        path: path.clone(),
        reason: e.to_string(),
    };

    let header = Format::new().set_bold();
    let mut workbook = Workbook::new();

    let ws = workbook.add_worksheet().set_name(CONSOLIDATED_SHEET).map_err(unwritable)?;
    write_table(ws, &output.consolidated, &header).map_err(unwritable)?;

    let ws = workbook.add_worksheet().set_name(OBJECTIONS_SHEET).map_err(unwritable)?;
    write_table(ws, &output.objections, &header).map_err(unwritable)?;

    let ws = workbook.add_worksheet().set_name(SUMMARY_SHEET).map_err(unwritable)?;
    write_summary(ws, output, &header).map_err(unwritable)?;

    workbook.save(&path).map_err(unwritable)?;

    info!(
        path = %path.display(),
        consolidated = output.consolidated.len(),
        objections = output.objections.len(),
        "artifact written"
    );
    Ok(path)
}

fn write_table(ws: &mut Worksheet, table: &Table, header: &Format) -> Result<(), XlsxError> {
    let headers = table.headers();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for (col, name) in headers.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, name, header)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let excel_row = r as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    ws.write_string(excel_row, col as u16, s)?;
                }
                Cell::Number(n) => {
                    ws.write_number(excel_row, col as u16, *n)?;
                }
            }
            let len = cell.to_string().chars().count();
            if len > widths[col] {
                widths[col] = len;
            }
        }
    }

    apply_layout(ws, &widths, table.len() as u32)
}

fn write_summary(ws: &mut Worksheet, output: &BatchOutput, header: &Format) -> Result<(), XlsxError> {
    let rows = summary_rows(output);
    let mut widths: Vec<usize> = SUMMARY_HEADERS.iter().map(|h| h.len()).collect();

    for (col, name) in SUMMARY_HEADERS.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, *name, header)?;
    }
    for (r, (name, value)) in rows.iter().enumerate() {
        let excel_row = r as u32 + 1;
        ws.write_string(excel_row, 0, *name)?;
        match value {
            SummaryValue::Count(n) => {
                ws.write_number(excel_row, 1, *n as f64)?;
            }
            SummaryValue::Text(s) => {
                ws.write_string(excel_row, 1, s)?;
            }
        }
        widths[0] = widths[0].max(name.len());
        widths[1] = widths[1].max(value.to_string().chars().count());
    }

    apply_layout(ws, &widths, rows.len() as u32)
}

/// Frozen header row, autofilter over the data and fitted column widths.
fn apply_layout(ws: &mut Worksheet, widths: &[usize], data_rows: u32) -> Result<(), XlsxError> {
    if widths.is_empty() {
        return Ok(());
    }
    ws.set_freeze_panes(1, 0)?;
    ws.autofilter(0, 0, data_rows, (widths.len() - 1) as u16)?;
    for (col, width) in widths.iter().enumerate() {
        let width = (*width).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH) + 2;
        ws.set_column_width(col as u16, width as f64)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};
    use chrono::TimeZone;
    use glosas_recon::config::RunConfig;
    use glosas_recon::engine::run;
    use glosas_recon::normalize::InMemorySheets;

    fn output() -> BatchOutput {
        let mut detail = Table::new([
            "NUMERO_FACTURA",
            "FECHA_FACTURA",
            "CONCEPTO_GENERAL",
            "VALOR_GLOSA_NEGOCIADO",
            "VALOR_GLOSA_PRESTADOR",
            "CODIGO_SERVICIO",
            "OBSERVACIONES",
            "CONSECUTIVO",
        ]);
        detail.push_row(vec![
            Cell::text("FC100"),
            Cell::text("2026-03-01"),
            Cell::text("CG"),
            Cell::Number(1500.5),
            Cell::Number(700.0),
            Cell::text("890201"),
            Cell::Empty,
            Cell::text("1"),
        ]);
        let mut rejections = Table::new(["CONSECUTIVO", "CODIGO_GLOSA", "JUSTIFICACION"]);
        rejections.push_row(vec![Cell::text("1"), Cell::text("G1"), Cell::text("sin soporte")]);

        let mut sheets = InMemorySheets::new();
        sheets.insert("DETALLE FC100.xlsx", detail);
        sheets.insert("GLOSAS FC100.xlsx", rejections);
        let config = RunConfig::new(Insurer::Coosalud, "missing.xlsx", "out");
        let mut out = run(&config, &sheets.paths(), &sheets);
        out.meta.run_at = Local.with_ymd_and_hms(2026, 10, 19, 8, 5, 9).unwrap();
        out
    }

    #[test]
    fn file_name_uses_insurer_and_timestamp() {
        let at = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(artifact_file_name(Insurer::Mutualser, &at), "MUTUALSER_GLOSAS_20260102_030405.xlsx");
    }

    #[test]
    fn writes_three_sheets_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested").join("salida");
        let path = write_artifact(&output(), &out_dir).unwrap();

        assert_eq!(path, out_dir.join("COOSALUD_GLOSAS_20261019_080509.xlsx"));
        let mut wb = open_workbook_auto(&path).unwrap();
        assert_eq!(wb.sheet_names(), vec![CONSOLIDATED_SHEET, OBJECTIONS_SHEET, SUMMARY_SHEET]);

        let consolidated = wb.worksheet_range(CONSOLIDATED_SHEET).unwrap();
        assert_eq!(consolidated.get((0, 0)), Some(&Data::String("FACTURA_ID".into())));
        assert_eq!(consolidated.get((1, 0)), Some(&Data::String("FC100".into())));
        assert_eq!(consolidated.get((1, 4)), Some(&Data::Float(1500.5)));
        assert_eq!(consolidated.height(), 2);

        let objections = wb.worksheet_range(OBJECTIONS_SHEET).unwrap();
        assert_eq!(objections.height(), 2);

        let summary = wb.worksheet_range(SUMMARY_SHEET).unwrap();
        let rows: Vec<(String, String)> = summary
            .rows()
            .map(|r| (r[0].to_string(), r[1].to_string()))
            .collect();
        assert_eq!(rows[0], ("ESTADISTICA".to_string(), "VALOR".to_string()));
        assert!(rows.contains(&("consolidated_rows".to_string(), "1".to_string())));
        assert!(rows.contains(&("insurer".to_string(), "COOSALUD".to_string())));
    }

    #[test]
    fn unwritable_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let err = write_artifact(&output(), &blocker.join("out")).unwrap_err();
        assert!(matches!(err, GlosaError::OutputUnwritable { .. }));
        assert!(err.is_fatal());
    }
}

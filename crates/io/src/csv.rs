// CSV/TSV import
//
// Same shape as the workbook reader: first record is the header row, every
// cell is text, fully blank records are skipped.

use std::io::Read;
use std::path::Path;

use glosas_recon::error::GlosaError;
use glosas_recon::model::{Cell, Table};

fn read_error(path: &Path, reason: impl Into<String>) -> GlosaError {
    GlosaError::WorkbookReadError {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

pub fn read_table(path: &Path) -> Result<Table, GlosaError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    parse_table(&content, delimiter).map_err(|e| read_error(path, e))
}

const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];
const SNIFF_LINES: usize = 10;

/// Pick the delimiter whose header width the most sample records agree with.
///
/// Candidates that leave the header as a single field are skipped; wider
/// headers win ties.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: String = content.lines().take(SNIFF_LINES).collect::<Vec<_>>().join("\n");

    DELIMITERS
        .iter()
        .filter_map(|&delim| {
            let widths: Vec<usize> = csv::ReaderBuilder::new()
                .delimiter(delim)
                .has_headers(false)
                .flexible(true)
                .from_reader(sample.as_bytes())
                .records()
                .filter_map(Result::ok)
                .map(|r| r.len())
                .collect();
            let header = *widths.first()?;
            if header <= 1 {
                return None;
            }
            let agreeing = widths.iter().filter(|&&w| w == header).count();
            Some(((agreeing * header, header), delim))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, delim)| delim)
        .unwrap_or(b',')
}

/// Read file and convert to UTF-8 if needed (Excel exports are often Windows-1252).
fn read_file_as_utf8(path: &Path) -> Result<String, GlosaError> {
    let mut file = std::fs::File::open(path).map_err(|e| read_error(path, e.to_string()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| read_error(path, e.to_string()))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn parse_table(content: &str, delimiter: u8) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers = match records.next() {
        Some(record) => record.map_err(|e| e.to_string())?,
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(headers.iter());
    for result in records {
        let record = result.map_err(|e| e.to_string())?;
        let cells: Vec<Cell> = record
            .iter()
            .map(|field| if field.is_empty() { Cell::Empty } else { Cell::text(field) })
            .collect();
        if cells.iter().all(Cell::is_blank) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "CONSECUTIVO;CODIGO_GLOSA;JUSTIFICACION\n1;G1;x\n2;G2;y\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "CONSECUTIVO,CODIGO_GLOSA,JUSTIFICACION\n1,G1,x\n2,G2,y\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "CONSECUTIVO;JUSTIFICACION;CODIGO_GLOSA\n1;\"falta soporte, ver anexo\";G1\n2;\"ok\";G2\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_semicolon_csv_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("GLOSAS FC1.csv");
        fs::write(&path, "\u{feff}CONSECUTIVO ;CODIGO_GLOSA;JUSTIFICACION\n1;G1;x\n;;\n2;;y\n").unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers(), &["CONSECUTIVO", "CODIGO_GLOSA", "JUSTIFICACION"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "CONSECUTIVO"), Some(&Cell::text("2")));
        assert_eq!(table.get(1, "CODIGO_GLOSA"), Some(&Cell::Empty));
    }

    #[test]
    fn test_windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("DETALLE FC1.csv");
        // "OBSERVACIONES,CONSECUTIVO\nrevisión,1" with 0xF3 for 'ó'
        let mut bytes = b"OBSERVACIONES,CONSECUTIVO\nrevisi".to_vec();
        bytes.push(0xF3);
        bytes.extend_from_slice(b"n,1\n");
        fs::write(&path, bytes).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.get(0, "OBSERVACIONES"), Some(&Cell::text("revisión")));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = read_table(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, GlosaError::WorkbookReadError { .. }));
    }
}

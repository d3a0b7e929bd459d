// Input discovery: expand CLI inputs (files or directories) into the file
// set handed to the pairer.

use std::path::{Path, PathBuf};

use glosas_recon::error::GlosaError;
use tracing::debug;

/// Extensions picked up when scanning a directory (compared case-insensitively).
pub const INPUT_EXTENSIONS: [&str; 6] = ["xlsx", "xlsm", "xls", "xlsb", "ods", "csv"];

/// Spreadsheet files, excluding Office lock files (`~$name.xlsx`).
pub fn is_input_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with("~$") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INPUT_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Expand `inputs` into a sorted, de-duplicated file list.
///
/// Directories are scanned one level deep. Explicit files are kept as given,
/// whatever their extension. A path that does not exist is an error.
pub fn discover_inputs<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>, GlosaError> {
    let mut files = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let entries = std::fs::read_dir(input)
                .map_err(|e| GlosaError::Io(format!("{}: {e}", input.display())))?;
            for entry in entries {
                let path = entry.map_err(|e| GlosaError::Io(format!("{}: {e}", input.display())))?.path();
                if path.is_file() && is_input_file(&path) {
                    files.push(path);
                } else {
                    debug!(path = %path.display(), "ignoring non-spreadsheet entry");
                }
            }
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            return Err(GlosaError::Io(format!("{}: no such file or directory", input.display())));
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scans_directories_and_skips_lock_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["DETALLE FC1.xlsx", "GLOSAS FC1.XLSX", "~$DETALLE FC1.xlsx", "notas.txt", "glosa_fc2.csv"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("DETALLE FC9.xlsx"), b"").unwrap();

        let files = discover_inputs(&[dir.path()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["DETALLE FC1.xlsx", "GLOSAS FC1.XLSX", "glosa_fc2.csv"]);
    }

    #[test]
    fn explicit_files_are_kept_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("DETALLE FC1.xlsx");
        fs::write(&file, b"").unwrap();

        let files = discover_inputs(&[file.clone(), file.clone(), dir.path().to_path_buf()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn missing_input_is_an_error() {
        let err = discover_inputs(&["/no/such/input"]).unwrap_err();
        assert!(matches!(err, GlosaError::Io(_)));
    }
}

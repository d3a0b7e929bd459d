use std::path::Path;

use glosas_recon::error::GlosaError;
use glosas_recon::model::Table;
use glosas_recon::normalize::SheetSource;

/// Filesystem [`SheetSource`]: `.csv` files go through the CSV reader,
/// everything else through calamine.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSheets;

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

impl SheetSource for FileSheets {
    fn read_first_sheet(&self, path: &Path) -> Result<Table, GlosaError> {
        if is_csv(path) {
            crate::csv::read_table(path)
        } else {
            crate::xlsx::read_first_sheet(path)
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

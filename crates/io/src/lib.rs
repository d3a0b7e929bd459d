// File I/O: workbook and CSV readers, input discovery, artifact export and
// the batch orchestrator built on glosas-recon.

pub mod artifact;
pub mod batch;
pub mod csv;
pub mod discover;
pub mod source;
pub mod xlsx;

pub use artifact::{artifact_file_name, write_artifact};
pub use batch::{run_batch, RunReport};
pub use discover::discover_inputs;
pub use source::FileSheets;

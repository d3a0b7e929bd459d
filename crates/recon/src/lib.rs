//! `glosas-recon`: glosa homologation and consolidation engine.
//!
//! Pure engine crate: workbooks are read through [`SheetSource`], results are
//! returned as in-memory tables plus statistics and diagnostics. No calamine
//! or xlsx writer dependencies.

pub mod config;
pub mod consolidate;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod homologation;
pub mod model;
pub mod normalize;
pub mod pairing;

pub use config::{Insurer, RunConfig};
pub use engine::{run, BatchOutput};
pub use error::{Diagnostic, GlosaError};
pub use homologation::{CodeResolver, HomologationTable};
pub use model::{Cell, InvoicePair, RunStats, Table};
pub use normalize::SheetSource;

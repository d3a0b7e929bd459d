//! Filename-driven pairing of detail and rejection files per invoice.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{FileRole, GlosaError};
use crate::model::InvoicePair;

fn invoice_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[a-z]{1,4}\d+$").expect("static invoice pattern"))
}

/// Lowercased tokens of the file stem, split on whitespace and punctuation.
fn tokens(path: &Path) -> Vec<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    stem.split(|c: char| c.is_whitespace() || (c.is_ascii_punctuation()))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedFile {
    pub role: FileRole,
    pub invoice_id: String,
    pub path: PathBuf,
}

/// Classify one file by its basename.
///
/// A stem carrying both a `detalle*` and a `glosa*` token is a detail file.
pub fn classify(path: &Path) -> Result<ClassifiedFile, GlosaError> {
    let tokens = tokens(path);

    let role_token = tokens
        .iter()
        .position(|t| t.starts_with("detalle"))
        .map(|i| (FileRole::Detail, i))
        .or_else(|| {
            tokens
                .iter()
                .position(|t| t.starts_with("glosa"))
                .map(|i| (FileRole::Rejection, i))
        });

    let Some((role, role_idx)) = role_token else {
        return Err(GlosaError::UnclassifiableFile {
            path: path.to_path_buf(),
            reason: "no DETALLE or GLOSA token in filename".into(),
        });
    };

    let invoice_id = tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != role_idx)
        .map(|(_, t)| t)
        .find(|t| invoice_pattern().is_match(t))
        .map(|t| t.to_ascii_uppercase())
        .ok_or_else(|| GlosaError::UnclassifiableFile {
            path: path.to_path_buf(),
            reason: "no invoice identifier in filename".into(),
        })?;

    Ok(ClassifiedFile {
        role,
        invoice_id,
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Pairing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
pub struct PairingOutput {
    /// Triples in ascending invoice-identifier order.
    pub pairs: Vec<InvoicePair>,
    /// Unclassifiable, unpaired and duplicate files.
    #[serde(skip)]
    pub warnings: Vec<GlosaError>,
}

#[derive(Default)]
struct Slots {
    detail: Option<PathBuf>,
    rejection: Option<PathBuf>,
}

/// Group an unordered file set into per-invoice (detail, rejection) triples.
///
/// Paths are sorted first, so the result and the warnings do not depend on
/// the input order; on duplicates the lexicographically first path is kept.
pub fn pair_files<P: AsRef<Path>>(paths: &[P]) -> PairingOutput {
    let mut sorted: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    sorted.sort();
    sorted.dedup();

    let mut out = PairingOutput::default();
    let mut by_invoice: BTreeMap<String, Slots> = BTreeMap::new();

    for path in sorted {
        let file = match classify(&path) {
            Ok(f) => f,
            Err(e) => {
                debug!(path = %path.display(), "skipping unclassifiable file");
                out.warnings.push(e);
                continue;
            }
        };

        let slots = by_invoice.entry(file.invoice_id.clone()).or_default();
        let slot = match file.role {
            FileRole::Detail => &mut slots.detail,
            FileRole::Rejection => &mut slots.rejection,
        };
        match slot {
            Some(kept) => out.warnings.push(GlosaError::DuplicateInvoice {
                invoice: file.invoice_id,
                role: file.role,
                kept: kept.clone(),
                dropped: file.path,
            }),
            None => *slot = Some(file.path),
        }
    }

    for (invoice_id, slots) in by_invoice {
        match (slots.detail, slots.rejection) {
            (Some(detail), Some(rejection)) => out.pairs.push(InvoicePair {
                invoice_id,
                detail,
                rejection,
            }),
            (Some(path), None) => out.warnings.push(GlosaError::UnpairedFile {
                invoice: invoice_id,
                path,
                missing: FileRole::Rejection,
            }),
            (None, Some(path)) => out.warnings.push(GlosaError::UnpairedFile {
                invoice: invoice_id,
                path,
                missing: FileRole::Detail,
            }),
            (None, None) => {}
        }
    }

    debug!(pairs = out.pairs.len(), warnings = out.warnings.len(), "pairing done");
    out
}

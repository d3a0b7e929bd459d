use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GlosaError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty path, unknown column override, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Homologation workbook path does not exist.
    #[error("homologation table not found: {}", path.display())]
    HomologationUnavailable { path: PathBuf },
    /// Homologation workbook lacks one or more semantic columns.
    #[error("homologation table is missing column(s): {}", columns.join(", "))]
    MissingHomologationColumns { columns: Vec<String> },
    /// Detail or rejection sheet lacks required columns.
    #[error("{}: missing required column(s): {}", path.display(), columns.join(", "))]
    MissingRequiredColumns { path: PathBuf, columns: Vec<String> },
    /// Filename carries neither a DETALLE nor a GLOSA token, or no invoice id.
    #[error("{}: cannot classify file ({reason})", path.display())]
    UnclassifiableFile { path: PathBuf, reason: String },
    /// Only one side of an invoice pair is present.
    #[error("invoice {invoice}: {} has no matching {missing} file", path.display())]
    UnpairedFile { invoice: String, path: PathBuf, missing: FileRole },
    /// Two files claim the same side of one invoice; the first is kept.
    #[error("invoice {invoice}: duplicate {role} file {} (keeping {})", dropped.display(), kept.display())]
    DuplicateInvoice {
        invoice: String,
        role: FileRole,
        kept: PathBuf,
        dropped: PathBuf,
    },
    /// A source code appears on more than one homologation row.
    #[error("source code '{code}' appears on {rows} homologation rows; using the first")]
    AmbiguousHomologation { code: String, rows: usize },
    /// A rejection points at a position key no detail row carries.
    #[error("invoice {invoice}: rejection for position '{position_key}' has no detail row")]
    OrphanRejection { invoice: String, position_key: String },
    /// Headers renamed so every output column name is unique.
    #[error("{}: column header(s) renamed: {}", path.display(), renamed.join(", "))]
    RenamedColumns { path: PathBuf, renamed: Vec<String> },
    /// Workbook could not be opened or parsed.
    #[error("{}: cannot read workbook: {reason}", path.display())]
    WorkbookReadError { path: PathBuf, reason: String },
    /// Artifact directory or file could not be written.
    #[error("cannot write output {}: {reason}", path.display())]
    OutputUnwritable { path: PathBuf, reason: String },
    /// No pair could be consolidated.
    #[error("no invoice pair was consolidated ({failed} failed)")]
    EmptyBatch { failed: usize },
    /// IO error (directory listing, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl GlosaError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::ConfigParse(_) | Self::ConfigValidation(_) => DiagnosticCode::InvalidConfig,
            Self::HomologationUnavailable { .. } => DiagnosticCode::HomologationUnavailable,
            Self::MissingHomologationColumns { .. } => DiagnosticCode::MissingHomologationColumns,
            Self::MissingRequiredColumns { .. } => DiagnosticCode::MissingRequiredColumns,
            Self::UnclassifiableFile { .. } => DiagnosticCode::UnclassifiableFile,
            Self::UnpairedFile { .. } => DiagnosticCode::UnpairedFile,
            Self::DuplicateInvoice { .. } => DiagnosticCode::DuplicateInvoice,
            Self::AmbiguousHomologation { .. } => DiagnosticCode::AmbiguousHomologation,
            Self::OrphanRejection { .. } => DiagnosticCode::OrphanRejection,
            Self::RenamedColumns { .. } => DiagnosticCode::RenamedColumns,
            Self::WorkbookReadError { .. } => DiagnosticCode::WorkbookReadError,
            Self::OutputUnwritable { .. } => DiagnosticCode::OutputUnwritable,
            Self::EmptyBatch { .. } => DiagnosticCode::EmptyBatch,
            Self::Io(_) => DiagnosticCode::Io,
        }
    }

    /// Run-fatal kinds abort emission; everything else is collected.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OutputUnwritable { .. } | Self::EmptyBatch { .. } | Self::ConfigParse(_) | Self::ConfigValidation(_)
        )
    }
}

// ---------------------------------------------------------------------------
// File role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Detail,
    Rejection,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detail => write!(f, "detail"),
            Self::Rejection => write!(f, "rejection"),
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    InvalidConfig,
    HomologationUnavailable,
    MissingHomologationColumns,
    MissingRequiredColumns,
    UnclassifiableFile,
    UnpairedFile,
    DuplicateInvoice,
    AmbiguousHomologation,
    OrphanRejection,
    RenamedColumns,
    WorkbookReadError,
    OutputUnwritable,
    EmptyBatch,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational drift; the affected row or file still flowed or was dropped by rule.
    Warning,
    /// A pair (or the homologation table) was skipped.
    Error,
}

/// Serializable record of a non-fatal error, surfaced alongside the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(err: &GlosaError) -> Self {
        Self::build(err, Severity::Warning)
    }

    pub fn error(err: &GlosaError) -> Self {
        Self::build(err, Severity::Error)
    }

    /// Attach the invoice the failing pair belonged to.
    pub fn for_invoice(mut self, invoice: &str) -> Self {
        self.invoice.get_or_insert_with(|| invoice.to_string());
        self
    }

    fn build(err: &GlosaError, severity: Severity) -> Self {
        let (invoice, path) = match err {
            GlosaError::UnpairedFile { invoice, path, .. } => (Some(invoice.clone()), Some(path.clone())),
            GlosaError::DuplicateInvoice { invoice, dropped, .. } => {
                (Some(invoice.clone()), Some(dropped.clone()))
            }
            GlosaError::OrphanRejection { invoice, .. } => (Some(invoice.clone()), None),
            GlosaError::HomologationUnavailable { path }
            | GlosaError::MissingRequiredColumns { path, .. }
            | GlosaError::UnclassifiableFile { path, .. }
            | GlosaError::RenamedColumns { path, .. }
            | GlosaError::WorkbookReadError { path, .. }
            | GlosaError::OutputUnwritable { path, .. } => (None, Some(path.clone())),
            _ => (None, None),
        };
        Self {
            code: err.code(),
            severity,
            invoice,
            path,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}", self.message)
    }
}

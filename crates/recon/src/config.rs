use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GlosaError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub insurer: Insurer,
    pub homologation_path: PathBuf,
    pub output_dir: PathBuf,
    /// Detail columns that must be present. Defaults to every column of
    /// `detail_columns`; the service-code and position-key columns are
    /// always required.
    #[serde(default)]
    pub required_columns: Option<Vec<String>>,
    #[serde(default)]
    pub detail_columns: DetailColumns,
    #[serde(default)]
    pub rejection_columns: RejectionColumns,
    #[serde(default)]
    pub homologation_columns: HomologationColumns,
}

// ---------------------------------------------------------------------------
// Insurer + policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Insurer {
    Mutualser,
    Coosalud,
}

impl Insurer {
    pub const ALL: [Insurer; 2] = [Insurer::Mutualser, Insurer::Coosalud];

    /// Fixed per-insurer homologation policy.
    pub fn policy(&self) -> HomologationPolicy {
        match self {
            Self::Mutualser => HomologationPolicy {
                validate_against_billing_universe: true,
            },
            Self::Coosalud => HomologationPolicy {
                validate_against_billing_universe: false,
            },
        }
    }
}

impl fmt::Display for Insurer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutualser => write!(f, "MUTUALSER"),
            Self::Coosalud => write!(f, "COOSALUD"),
        }
    }
}

impl FromStr for Insurer {
    type Err = GlosaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MUTUALSER" => Ok(Self::Mutualser),
            "COOSALUD" => Ok(Self::Coosalud),
            other => Err(GlosaError::ConfigValidation(format!(
                "unknown insurer \"{other}\" (expected MUTUALSER or COOSALUD)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HomologationPolicy {
    /// Validate canonical codes against the billing-facing code universe.
    pub validate_against_billing_universe: bool,
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Header names of the semantic detail columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetailColumns {
    pub invoice_number: String,
    pub invoice_date: String,
    pub concept: String,
    pub negotiated_value: String,
    pub provider_value: String,
    pub service_code: String,
    pub observations: String,
    pub position_key: String,
}

impl Default for DetailColumns {
    fn default() -> Self {
        Self {
            invoice_number: "NUMERO_FACTURA".into(),
            invoice_date: "FECHA_FACTURA".into(),
            concept: "CONCEPTO_GENERAL".into(),
            negotiated_value: "VALOR_GLOSA_NEGOCIADO".into(),
            provider_value: "VALOR_GLOSA_PRESTADOR".into(),
            service_code: "CODIGO_SERVICIO".into(),
            observations: "OBSERVACIONES".into(),
            position_key: "CONSECUTIVO".into(),
        }
    }
}

impl DetailColumns {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.invoice_number.clone(),
            self.invoice_date.clone(),
            self.concept.clone(),
            self.negotiated_value.clone(),
            self.provider_value.clone(),
            self.service_code.clone(),
            self.observations.clone(),
            self.position_key.clone(),
        ]
    }
}

/// Header names of the semantic rejection columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RejectionColumns {
    pub position_key: String,
    pub reason_code: String,
    pub justification: String,
}

impl Default for RejectionColumns {
    fn default() -> Self {
        Self {
            position_key: "CONSECUTIVO".into(),
            reason_code: "CODIGO_GLOSA".into(),
            justification: "JUSTIFICACION".into(),
        }
    }
}

impl RejectionColumns {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.position_key.clone(),
            self.reason_code.clone(),
            self.justification.clone(),
        ]
    }
}

/// Header names of the homologation workbook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HomologationColumns {
    pub source_code: String,
    pub canonical_code: String,
    pub billing_code: String,
}

impl Default for HomologationColumns {
    fn default() -> Self {
        Self {
            source_code: "CODIGO_SERVICIO".into(),
            canonical_code: "CODIGO_PRODUCTO".into(),
            billing_code: "CODIGO_FACTURACION".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    /// Config with the insurer's fixed defaults.
    pub fn new(insurer: Insurer, homologation_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            insurer,
            homologation_path: homologation_path.into(),
            output_dir: output_dir.into(),
            required_columns: None,
            detail_columns: DetailColumns::default(),
            rejection_columns: RejectionColumns::default(),
            homologation_columns: HomologationColumns::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, GlosaError> {
        let config: RunConfig = toml::from_str(input).map_err(|e| GlosaError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve relative paths against the directory holding the config file.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if self.homologation_path.is_relative() {
            self.homologation_path = base_dir.join(&self.homologation_path);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base_dir.join(&self.output_dir);
        }
    }

    pub fn policy(&self) -> HomologationPolicy {
        self.insurer.policy()
    }

    /// Detail columns checked by the sheet normalizer.
    pub fn detail_required(&self) -> Vec<String> {
        let mut required = self
            .required_columns
            .clone()
            .unwrap_or_else(|| self.detail_columns.all());
        for key in [&self.detail_columns.service_code, &self.detail_columns.position_key] {
            if !required.iter().any(|c| c.trim() == key.trim()) {
                required.push(key.clone());
            }
        }
        required
    }

    pub fn rejection_required(&self) -> Vec<String> {
        self.rejection_columns.all()
    }

    pub fn validate(&self) -> Result<(), GlosaError> {
        if self.homologation_path.as_os_str().is_empty() {
            return Err(GlosaError::ConfigValidation("homologation_path must not be empty".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(GlosaError::ConfigValidation("output_dir must not be empty".into()));
        }

        if let Some(ref cols) = self.required_columns {
            if cols.is_empty() {
                return Err(GlosaError::ConfigValidation(
                    "required_columns must list at least one column".into(),
                ));
            }
        }

        let named = self
            .detail_required()
            .into_iter()
            .map(|c| ("detail", c))
            .chain(self.rejection_columns.all().into_iter().map(|c| ("rejection", c)))
            .chain([
                ("homologation", self.homologation_columns.source_code.clone()),
                ("homologation", self.homologation_columns.canonical_code.clone()),
                ("homologation", self.homologation_columns.billing_code.clone()),
            ]);
        for (group, column) in named {
            if column.trim().is_empty() {
                return Err(GlosaError::ConfigValidation(format!(
                    "{group} column names must not be empty"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

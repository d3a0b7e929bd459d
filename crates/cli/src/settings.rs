// Run configuration resolution: config file, then command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use glosas_recon::config::{Insurer, RunConfig};
use glosas_recon::error::GlosaError;
use tracing::debug;

use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_USAGE};
use crate::CliError;

/// Values given on the command line; each one replaces the config file's.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub insurer: Option<Insurer>,
    pub homologation: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// `<config_dir>/glosas/glosas.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glosas")
        .join("glosas.toml")
}

/// Build the run config.
///
/// An explicit `--config` must exist; the default location is optional.
/// Relative paths in the file resolve against the file's directory, relative
/// paths on the command line against the working directory. When
/// `output_optional` is set a missing `output_dir` falls back to the working
/// directory (commands that never write an artifact).
pub fn load_config(
    explicit: Option<&Path>,
    overrides: &Overrides,
    output_optional: bool,
) -> Result<RunConfig, CliError> {
    let cwd = std::env::current_dir().map_err(|e| CliError::io(format!("cannot read working directory: {e}")))?;
    let file = match explicit {
        Some(path) => Some(cwd.join(path)),
        None => Some(default_config_path()).filter(|p| p.is_file()),
    };

    let mut doc = match &file {
        Some(path) => read_document(path)?,
        None => toml::Table::new(),
    };
    if let Some(path) = &file {
        debug!(path = %path.display(), "loaded config file");
        resolve_relative(&mut doc, path.parent().unwrap_or_else(|| Path::new(".")));
    }

    if let Some(insurer) = overrides.insurer {
        doc.insert("insurer".into(), toml::Value::String(insurer.to_string()));
    }
    if let Some(path) = &overrides.homologation {
        doc.insert("homologation_path".into(), path_value(&cwd.join(path)));
    }
    if let Some(path) = &overrides.output_dir {
        doc.insert("output_dir".into(), path_value(&cwd.join(path)));
    }
    if output_optional && !doc.contains_key("output_dir") {
        doc.insert("output_dir".into(), path_value(&cwd));
    }

    let missing: Vec<&str> = ["insurer", "homologation_path", "output_dir"]
        .into_iter()
        .filter(|k| !doc.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Err(CliError {
            code: EXIT_USAGE,
            message: format!("missing required setting(s): {}", missing.join(", ")),
            hint: Some(format!(
                "pass --insurer/--homologation/--output-dir or set them in {}",
                file.unwrap_or_else(default_config_path).display()
            )),
        });
    }

    let config: RunConfig = toml::Value::Table(doc)
        .try_into()
        .map_err(|e: toml::de::Error| config_error(GlosaError::ConfigParse(e.to_string())))?;
    config.validate().map_err(config_error)?;
    Ok(config)
}

fn read_document(path: &Path) -> Result<toml::Table, CliError> {
    let text = fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_INVALID_CONFIG,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: Some("check the --config path or GLOSAS_CONFIG".into()),
    })?;
    text.parse::<toml::Table>().map_err(|e| {
        config_error(GlosaError::ConfigParse(format!("{}: {e}", path.display())))
    })
}

/// Anchor the file's relative paths at `base`. Absolute paths are kept.
fn resolve_relative(doc: &mut toml::Table, base: &Path) {
    for key in ["homologation_path", "output_dir"] {
        if let Some(toml::Value::String(s)) = doc.get(key) {
            let path = Path::new(s);
            if path.is_relative() {
                let resolved = path_value(&base.join(path));
                doc.insert(key.into(), resolved);
            }
        }
    }
}

fn path_value(path: &Path) -> toml::Value {
    toml::Value::String(path.to_string_lossy().into_owned())
}

fn config_error(err: GlosaError) -> CliError {
    CliError {
        code: EXIT_INVALID_CONFIG,
        message: err.to_string(),
        hint: None,
    }
}

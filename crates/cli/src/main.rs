// glosas CLI - batch consolidation of insurer glosa workbooks

mod commands;
mod exit_codes;
mod logging;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use glosas_recon::Insurer;

use commands::{cmd_lookup, cmd_pair, cmd_run, cmd_validate, RunOptions};
use exit_codes::{EXIT_INPUT, EXIT_SUCCESS, EXIT_USAGE};
use logging::{init_logging, LogConfig, LogFormat};
use settings::Overrides;

#[derive(Parser)]
#[command(name = "glosas")]
#[command(about = "Pair, homologate and consolidate insurer glosa workbooks")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log line format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Config file (default: <config dir>/glosas/glosas.toml when present)
    #[arg(long, global = true, env = "GLOSAS_CONFIG")]
    config: Option<PathBuf>,
}

/// Settings that override the config file.
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Insurer profile (MUTUALSER or COOSALUD)
    #[arg(long)]
    insurer: Option<Insurer>,

    /// Homologation workbook
    #[arg(long)]
    homologation: Option<PathBuf>,

    /// Directory the consolidated workbook is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl From<ConfigArgs> for Overrides {
    fn from(args: ConfigArgs) -> Self {
        Self {
            insurer: args.insurer,
            homologation: args.homologation,
            output_dir: args.output_dir,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Consolidate a batch of DETALLE/GLOSAS workbooks into one report
    #[command(after_help = "\
Examples:
  glosas run ./bandeja --insurer MUTUALSER --homologation HOMOLOGACION.xlsx --output-dir ./salida
  glosas run DETALLE_FE20.xlsx GLOSAS_FE20.xlsx --config glosas.toml
  glosas run ./bandeja --json > reporte.json
  glosas run ./bandeja --strict --show-diagnostics

Exit codes:
  0  artifact written
  3  invalid config
  4  an input path does not exist
  5  no pair could be consolidated (nothing written)
  6  output directory not writable
  7  --strict and diagnostics were raised")]
    Run {
        /// Input files and/or directories (directories are scanned, not recursed)
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Fail (exit 7) when any diagnostic was raised
        #[arg(long)]
        strict: bool,

        /// List every diagnostic in the human summary
        #[arg(long)]
        show_diagnostics: bool,
    },

    /// Show how input files pair up by invoice, without reading them
    #[command(after_help = "\
Examples:
  glosas pair ./bandeja
  glosas pair ./bandeja --json")]
    Pair {
        /// Input files and/or directories
        inputs: Vec<PathBuf>,

        /// Print pairs and warnings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve service codes through the homologation table
    #[command(after_help = "\
Examples:
  glosas lookup 890201 870001 --insurer MUTUALSER --homologation HOMOLOGACION.xlsx
  glosas lookup 890201 --config glosas.toml --json")]
    Lookup {
        /// Service codes to resolve
        #[arg(required = true)]
        codes: Vec<String>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the config and load the homologation table
    #[command(after_help = "\
Examples:
  glosas validate --config glosas.toml
  glosas validate --insurer COOSALUD --homologation HOMOLOGACION.xlsx --output-dir ./salida

Exit codes:
  0   config and homologation table OK
  2   required settings missing
  3   invalid config
  10  homologation workbook missing or unreadable
  11  homologation workbook lacks required columns")]
    Validate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the resolved config as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  glosas-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  glosas-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(
        &LogConfig::from_verbosity(cli.verbose, cli.quiet)
            .with_format(cli.log_format)
            .with_ansi(atty::is(atty::Stream::Stderr)),
    );
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run {
            inputs,
            config,
            json,
            strict,
            show_diagnostics,
        } => cmd_run(
            config_path,
            &config.into(),
            &inputs,
            RunOptions {
                json,
                strict,
                show_diagnostics,
            },
        ),
        Commands::Pair { inputs, json } => cmd_pair(&inputs, json),
        Commands::Lookup { codes, config, json } => cmd_lookup(config_path, &config.into(), &codes, json),
        Commands::Validate { config, json } => cmd_validate(config_path, &config.into(), json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

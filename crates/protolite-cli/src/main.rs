//! protolite CLI entry point
//!
//! Writes the bundled playback record, dumps encoded files against a schema,
//! and compares schema versions.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use protolite_config::{LogFormat, LogLevel, LoggingConfig, ToolConfig};
use tracing_subscriber::EnvFilter;

mod commands;

/// Reflection-free message codec tooling
#[derive(Parser, Debug)]
#[command(name = "protolite", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the sample playback record, read it back and print it
    Demo {
        /// Output file
        #[arg(long, default_value = "stream.out")]
        out: PathBuf,
    },

    /// Decode a file against a schema and dump its fields
    Inspect {
        /// Encoded message file
        file: PathBuf,

        /// Schema file; repeat to combine several files
        #[arg(long = "schema", value_name = "PATH")]
        schemas: Vec<PathBuf>,

        /// Message to decode the file as
        #[arg(long, value_name = "NAME")]
        message: Option<String>,
    },

    /// Check whether data written with OLD stays readable with NEW
    CheckCompat {
        /// Schema the data was written with
        old: PathBuf,

        /// Schema the data will be read with
        new: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match ToolConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                return ExitCode::from(1);
            }
        },
        None => ToolConfig::default(),
    };

    init_tracing(&config.logging, cli.log_level);
    tracing::debug!(config = ?cli.config, "protolite starting");

    let mut stdout = std::io::stdout().lock();
    let result = match cli.command {
        Commands::Demo { out } => commands::demo(&out, &mut stdout).map(|()| true),
        Commands::Inspect {
            file,
            schemas,
            message,
        } => commands::inspect(&file, &schemas, message.as_deref(), &config, &mut stdout)
            .map(|()| true),
        Commands::CheckCompat { old, new } => commands::check_compat(&old, &new, &mut stdout),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<LogLevel>) {
    let level = level_override.unwrap_or(logging.level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Console => builder.init(),
    }
}

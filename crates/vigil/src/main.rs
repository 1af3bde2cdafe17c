//! Vigil CLI entrypoint.
//!
//! Host demo and operator tooling for the audit core:
//! - `vg keygen` - generate an encryption key
//! - `vg encrypt` / `vg decrypt` - one-shot gateway operations
//! - `vg demo` - scripted end-to-end session against the audit core
//! - `vg verify` - hash-chain verification of an exported audit trail
//! - `vg config` - show the effective configuration

#![forbid(unsafe_code)]

mod config_cmd;
mod crypt;
mod demo;
mod output;
mod verify;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use vigil_core::config::CoreConfig;
use vigil_core::error::format_error_with_remediation;
use vigil_core::logging::{LogConfig, LogFormat, init_logging};

/// Vigil - client-resident compliance and activity audit core.
#[derive(Parser)]
#[command(name = "vg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(long, global = true, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log format (pretty, json)
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new encryption key.
    ///
    /// Prints a base64-encoded 32-byte key to stdout. Store it in the
    /// config file or the VIGIL_ENCRYPTION_KEY environment variable.
    Keygen,

    /// Encrypt a value with the configured key.
    Encrypt(crypt::EncryptArgs),

    /// Decrypt a ciphertext envelope.
    Decrypt(crypt::DecryptArgs),

    /// Run a scripted end-to-end session against the audit core.
    ///
    /// Simulates a login, a debounced typing burst, an encrypted note, an
    /// idle timeout, and a resume, then prints the resulting audit trail.
    /// Simulated time spans minutes; wall time stays under a few seconds.
    Demo(demo::DemoArgs),

    /// Verify the hash chain of an exported audit trail.
    ///
    /// Exit codes: 0 = chain intact, 1 = unreadable input, 2 = chain broken.
    Verify(verify::VerifyArgs),

    /// Show the effective configuration.
    Config(config_cmd::ConfigArgs),
}

/// Effective config path: the explicit flag or `<config dir>/vigil/config.toml`.
pub(crate) fn config_path(cli_path: Option<&Path>) -> PathBuf {
    cli_path.map_or_else(
        || {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("vigil")
                .join("config.toml")
        },
        Path::to_path_buf,
    )
}

/// Load the effective config. An explicit `--config` path must exist; the
/// default location silently falls back to defaults when absent.
pub(crate) fn load_config(cli_path: Option<&Path>) -> Result<CoreConfig, vigil_core::Error> {
    let config = match cli_path {
        Some(path) => CoreConfig::load_from_path(path)?,
        None => CoreConfig::load_or_default(&config_path(None))?,
    };
    config.validate()?;
    Ok(config)
}

fn run_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Keygen => crypt::keygen(),
        Commands::Encrypt(args) => crypt::encrypt(args, &load_config(cli.config.as_deref())?),
        Commands::Decrypt(args) => crypt::decrypt(args, &load_config(cli.config.as_deref())?),
        Commands::Demo(args) => demo::run(args, &load_config(cli.config.as_deref())?),
        Commands::Verify(args) => verify::run(args),
        Commands::Config(args) => config_cmd::run(args, cli.config.as_deref()),
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for command output.
    let log_config = LogConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
        file: None,
    };
    if let Err(err) = init_logging(&log_config) {
        eprintln!("warning: failed to initialize logging: {err}");
    }

    if let Err(err) = run_command(&cli) {
        match err.downcast_ref::<vigil_core::Error>() {
            Some(core_err) => eprintln!("{}", format_error_with_remediation(core_err)),
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}

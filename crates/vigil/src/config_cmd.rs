//! `vg config` - show the effective configuration.
//!
//! Informational command: it renders the config even when validation
//! fails, so a broken file can be inspected. The encryption key is never
//! printed in either format.

use std::path::Path;

use clap::Args;
use serde_json::json;
use vigil_core::config::CoreConfig;

use crate::output::OutputFormat;

/// Arguments for `vg config`.
#[derive(Args)]
pub struct ConfigArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,
}

pub fn run(args: &ConfigArgs, cli_path: Option<&Path>) -> anyhow::Result<()> {
    let path = crate::config_path(cli_path);
    let loaded_from_file = path.exists();
    let config = if loaded_from_file {
        CoreConfig::load_from_path(&path).map_err(vigil_core::Error::from)?
    } else {
        CoreConfig::default()
    };
    let validation = config.validate();

    match args.format {
        OutputFormat::Json => {
            let report = json!({
                "path": path.display().to_string(),
                "loaded_from_file": loaded_from_file,
                "valid": validation.is_ok(),
                "validation_error": validation.as_ref().err().map(ToString::to_string),
                // CoreConfig serialization never includes the key.
                "config": config,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            println!(
                "config file:             {} ({})",
                path.display(),
                if loaded_from_file {
                    "loaded"
                } else {
                    "not found, using defaults"
                }
            );
            println!(
                "session_timeout_minutes: {}",
                config.session_timeout_minutes
            );
            println!("max_audit_entries:       {}", config.max_audit_entries);
            println!("debounce_window_ms:      {}", config.debounce_window_ms);
            println!("tick_interval_secs:      {}", config.tick_interval_secs);
            println!("strict_mode:             {}", config.strict_mode);
            println!("development_mode:        {}", config.development_mode);
            println!(
                "encryption_key:          {}",
                if config.encryption_key.is_some() {
                    "[redacted]"
                } else {
                    "(not set; ephemeral per session)"
                }
            );
            match validation {
                Ok(()) => println!("valid:                   yes"),
                Err(err) => println!("valid:                   NO ({err})"),
            }
        }
    }

    Ok(())
}

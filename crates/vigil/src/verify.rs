//! `vg verify` - hash-chain verification of an exported audit trail.
//!
//! Exit codes: 0 = chain intact, 1 = unreadable input, 2 = chain broken.
//! The broken-chain code is distinct so scripts can tell tampering from
//! I/O problems.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use vigil_core::trail::{AuditEntry, AuditTrailRecorder, GENESIS_HASH};

use crate::output::OutputFormat;

/// Arguments for `vg verify`.
#[derive(Args)]
pub struct VerifyArgs {
    /// Path to an exported audit trail (JSON array of entries)
    pub trail: PathBuf,

    /// Expected previous hash of the first entry. Defaults to the genesis
    /// hash; pass the last evicted entry's hash for a truncated export.
    #[arg(long)]
    pub prev_hash: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,
}

pub fn run(args: &VerifyArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.trail).map_err(vigil_core::Error::from)?;
    let entries: Vec<AuditEntry> = serde_json::from_str(&raw).map_err(vigil_core::Error::from)?;

    let expected_prev = args.prev_hash.as_deref().unwrap_or(GENESIS_HASH);
    let verification = AuditTrailRecorder::verify_chain(&entries, expected_prev);

    match args.format {
        OutputFormat::Json => {
            let report = json!({
                "total_entries": verification.total_entries,
                "chain_intact": verification.chain_intact,
                "first_break_at": verification.first_break_at,
                "missing_ordinals": verification.missing_ordinals,
                "ordinal_range": verification
                    .ordinal_range
                    .map(|(first, last)| json!({"first": first, "last": last})),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            println!("entries:      {}", verification.total_entries);
            if let Some((first, last)) = verification.ordinal_range {
                println!("ordinals:     {first}..={last}");
            }
            if verification.chain_intact {
                println!("chain intact: yes");
            } else {
                println!("chain intact: NO");
                if let Some(ordinal) = verification.first_break_at {
                    println!("first break:  ordinal {ordinal}");
                }
                if !verification.missing_ordinals.is_empty() {
                    println!("missing:      {:?}", verification.missing_ordinals);
                }
            }
        }
    }

    if !verification.chain_intact {
        std::process::exit(2);
    }
    Ok(())
}

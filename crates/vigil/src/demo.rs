//! `vg demo` - scripted end-to-end session against the audit core.
//!
//! Runs the full lifecycle on a manually driven clock: login, a typing
//! burst that debounces into a single activity commit, an encrypted note,
//! a session timeout after simulated idle time, and a resume. Simulated
//! time spans about ninety seconds; wall time stays under a few seconds
//! because only the driver poll intervals run in real time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use vigil_core::announce::{Announcer, NullAnnouncer};
use vigil_core::clock::{Clock, ManualClock, SystemClock};
use vigil_core::config::CoreConfig;
use vigil_core::core::AuditCore;
use vigil_core::identity::{MemoryStore, USER_RECORD_KEY};
use vigil_core::signal::{InteractionSignal, ManualSignalSource};
use vigil_core::timeout::SessionState;
use vigil_core::trail::{AuditEntry, AuditTrailRecorder, GENESIS_HASH};

use crate::output::{OutputFormat, format_timestamp_ms};

/// Arguments for `vg demo`.
#[derive(Args)]
pub struct DemoArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,

    /// Write the resulting audit trail to this file as a JSON array
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Announcer that prints to stdout, standing in for an assistive layer.
struct ConsoleAnnouncer;

impl Announcer for ConsoleAnnouncer {
    fn announce(&self, message: &str) {
        println!("announce: {message}");
    }
}

pub fn run(args: &DemoArgs, base: &CoreConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_script(args, base))
}

async fn run_script(args: &DemoArgs, base: &CoreConfig) -> anyhow::Result<()> {
    let plain = args.format == OutputFormat::Plain;

    let start_ms = SystemClock.epoch_ms().map_err(vigil_core::Error::from)?;
    let clock = Arc::new(ManualClock::new(start_ms));

    let store = Arc::new(MemoryStore::new());
    store.insert(USER_RECORD_KEY, r#"{"id": "demo-user", "name": "Demo User"}"#);

    // Key and policy come from the user's config; timings are compressed so
    // the timeout arrives within the scripted run.
    let config = CoreConfig {
        session_timeout_minutes: 1,
        debounce_window_ms: 200,
        tick_interval_secs: 1,
        max_audit_entries: 100,
        ..base.clone()
    };

    let announcer: Arc<dyn Announcer> = if plain {
        Arc::new(ConsoleAnnouncer)
    } else {
        Arc::new(NullAnnouncer)
    };
    let core = AuditCore::with_collaborators(config, clock.clone(), Some(store), announcer)?;

    if plain {
        println!("Scripted session for principal demo-user (timeout 1m, debounce 200ms)");
        println!();
    }

    core.record(
        "LOGIN_SUCCESS",
        "AUTHENTICATION",
        Some(json!({"role": "guide", "method": "sso"})),
    );
    step(plain, "login recorded");

    let mut source = ManualSignalSource::new();
    let started = core.start(&mut source);

    // A typing burst: many raw signals, one committed activity event.
    for _ in 0..12 {
        source.emit(InteractionSignal::KeyInput);
    }
    source.emit(InteractionSignal::FocusChange);
    clock.advance(Duration::from_millis(400));
    wait_for("activity commit", || core.monitor().commits() >= 1).await?;
    step(plain, "burst of 13 signals committed as one activity event");

    // An encrypted note lands in the session workspace.
    let envelope = core.encrypt("attendee list: 4 names")?;
    core.record(
        "NOTE_SAVED",
        "WORKSPACE",
        Some(json!({"ciphertext_len": envelope.len()})),
    );
    let restored = core.decrypt(&envelope)?;
    step(
        plain,
        &format!(
            "note encrypted to {} chars and decrypted back to {} chars",
            envelope.len(),
            restored.len()
        ),
    );

    // Ninety simulated seconds of silence: the session times out.
    clock.advance(Duration::from_secs(90));
    wait_for("session timeout", || {
        core.session_state() == SessionState::TimedOut
    })
    .await?;
    step(plain, "session timed out after 90s of simulated idle");

    // Fresh activity pulls the session back.
    source.emit(InteractionSignal::PointerInput);
    clock.advance(Duration::from_millis(400));
    wait_for("session resume", || {
        core.session_state() == SessionState::Active
    })
    .await?;
    step(plain, "new activity resumed the session");

    core.record("LOGOUT", "AUTHENTICATION", None);
    started.shutdown(&mut source).await;

    let entries = core.entries();
    match args.format {
        OutputFormat::Plain => render_plain(&entries, &core),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    if let Some(path) = &args.export {
        std::fs::write(path, serde_json::to_string_pretty(&entries)?)
            .map_err(vigil_core::Error::from)?;
        if plain {
            println!("exported {} entries to {}", entries.len(), path.display());
        }
    }

    Ok(())
}

fn step(plain: bool, message: &str) {
    if plain {
        println!("  - {message}");
    }
}

/// Poll `condition` until it holds, up to five seconds of wall time.
async fn wait_for(label: &str, condition: impl Fn() -> bool) -> anyhow::Result<()> {
    for _ in 0..500 {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("demo step `{label}` did not complete in time")
}

fn render_plain(entries: &[AuditEntry], core: &AuditCore) {
    println!();
    println!(
        "Audit trail: {} recorded, {} retained, {} evicted",
        core.trail().total_appended(),
        entries.len(),
        core.trail().total_evicted()
    );
    println!(
        "{:<8} {:<26} {:<18} {:<16} {}",
        "ORDINAL", "TIMESTAMP", "ACTION", "RESOURCE", "PRINCIPAL"
    );
    for entry in entries {
        println!(
            "{:<8} {:<26} {:<18} {:<16} {}",
            entry.ordinal,
            format_timestamp_ms(entry.timestamp_ms),
            entry.action,
            entry.resource,
            entry.user_id.as_deref().unwrap_or("-")
        );
    }

    let verification = AuditTrailRecorder::verify_chain(entries, GENESIS_HASH);
    println!(
        "chain intact: {}",
        if verification.chain_intact { "yes" } else { "NO" }
    );
}

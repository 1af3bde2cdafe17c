//! Top-level facade wiring the audit components together.
//!
//! [`AuditCore`] owns one of each collaborator: the encryption gateway, the
//! audit trail, the activity monitor, and the timeout detector, all built
//! from a single validated [`CoreConfig`]. Hosts construct the core once,
//! [`AuditCore::start`] it against their signal source, and keep the
//! returned [`StartedCore`] until teardown.
//!
//! The facade also escalates gateway failures: a strict gateway error is
//! recorded on the `SECURITY` resource before it propagates, so the trail
//! shows every refused crypto operation. A permissive gateway never reaches
//! that path since its fallback returns the input as an `Ok`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::announce::{Announcer, TracingAnnouncer};
use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::error::Error;
use crate::gateway::{EncryptionGateway, GatewayKey};
use crate::identity::{PrincipalResolver, StoreResolver, UserStore};
use crate::monitor::{ActivityDriverHandle, ActivityMonitor, spawn_activity_driver};
use crate::signal::{InteractionSignal, SignalSource, SubscriptionId};
use crate::timeout::{
    ObserverId, SessionState, SessionTimeoutDetector, TimeoutDriverHandle, TimeoutObserver,
    spawn_timeout_driver,
};
use crate::trail::{
    ACTION_DECRYPTION_FAILURE, ACTION_ENCRYPTION_FAILURE, AuditEntry, AuditTrailRecorder,
    RESOURCE_SECURITY,
};

/// Floor for the activity poll interval, so tiny debounce windows do not
/// turn the driver into a busy loop.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How often the activity driver polls for an elapsed quiet window.
///
/// A quarter of the window keeps commit latency well under one window
/// length without polling more than necessary.
fn activity_poll_interval(window: Duration) -> Duration {
    (window / 4).max(MIN_POLL_INTERVAL)
}

// =============================================================================
// AuditCore
// =============================================================================

/// The assembled audit core.
///
/// Construction validates the config and fails fast on bad values; after
/// that, every operation is infallible or returns a domain error the host
/// can render. All methods take `&self`; the core is `Send + Sync` and is
/// typically shared behind an `Arc`.
pub struct AuditCore {
    config: CoreConfig,
    gateway: EncryptionGateway,
    trail: Arc<AuditTrailRecorder>,
    monitor: Arc<ActivityMonitor>,
    detector: Arc<SessionTimeoutDetector>,
    announcer: Arc<dyn Announcer>,
}

impl AuditCore {
    /// Build a core from `config` with production collaborators: the system
    /// clock, no principal store, and announcements routed to the log.
    ///
    /// # Errors
    /// Returns `Error::Config` when validation rejects the config.
    pub fn new(config: CoreConfig) -> Result<Self, Error> {
        Self::with_collaborators(
            config,
            Arc::new(SystemClock),
            None,
            Arc::new(TracingAnnouncer),
        )
    }

    /// Build a core with explicit collaborators.
    ///
    /// `store` is the host's local key-value store holding the `user`
    /// record; when present, recorded entries carry the resolved principal
    /// id. `announcer` receives the session-timeout announcement.
    ///
    /// # Errors
    /// Returns `Error::Config` when validation rejects the config.
    pub fn with_collaborators(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        store: Option<Arc<dyn UserStore>>,
        announcer: Arc<dyn Announcer>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let key = match config.resolved_key()? {
            Some(key) => key,
            None => {
                warn!("No encryption key configured; generated an ephemeral key for this session");
                GatewayKey::generate()
            }
        };
        let gateway = if config.strict_mode {
            EncryptionGateway::strict(&key)
        } else {
            EncryptionGateway::permissive(&key)
        };

        let resolver =
            store.map(|store| Arc::new(StoreResolver::new(store)) as Arc<dyn PrincipalResolver>);
        let trail = Arc::new(AuditTrailRecorder::with_collaborators(
            config.max_audit_entries,
            Arc::clone(&clock),
            resolver,
        ));

        let monitor = Arc::new(ActivityMonitor::with_collaborators(
            config.debounce_window(),
            !config.development_mode,
            Arc::clone(&clock),
            Arc::clone(&trail),
        ));

        let detector = Arc::new(SessionTimeoutDetector::with_announcer(
            config.session_timeout(),
            Arc::clone(&monitor),
            Arc::clone(&trail),
            Arc::clone(&announcer),
        ));

        info!(
            session_timeout_minutes = config.session_timeout_minutes,
            max_audit_entries = config.max_audit_entries,
            debounce_window_ms = config.debounce_window_ms,
            policy = gateway.policy_name(),
            development_mode = config.development_mode,
            "Audit core initialized"
        );

        Ok(Self {
            config,
            gateway,
            trail,
            monitor,
            detector,
            announcer,
        })
    }

    // ── Encryption ──────────────────────────────────────────────────────

    /// Encrypt a value through the gateway.
    ///
    /// A propagated failure (strict policy) is recorded on the `SECURITY`
    /// resource before this returns the error.
    ///
    /// # Errors
    /// Returns `Error::Encrypt` when the gateway refuses the operation.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        match self.gateway.encrypt(plaintext) {
            Ok(envelope) => Ok(envelope),
            Err(error) => {
                self.trail.record(
                    ACTION_ENCRYPTION_FAILURE,
                    RESOURCE_SECURITY,
                    Some(json!({
                        "error": error.to_string(),
                        "policy": self.gateway.policy_name(),
                    })),
                );
                Err(error.into())
            }
        }
    }

    /// Decrypt an envelope through the gateway.
    ///
    /// # Errors
    /// Returns `Error::Decrypt` when the gateway refuses the operation; the
    /// failure is recorded on the `SECURITY` resource first.
    pub fn decrypt(&self, envelope: &str) -> Result<String, Error> {
        match self.gateway.decrypt(envelope) {
            Ok(plaintext) => Ok(plaintext),
            Err(error) => {
                self.trail.record(
                    ACTION_DECRYPTION_FAILURE,
                    RESOURCE_SECURITY,
                    Some(json!({
                        "error": error.to_string(),
                        "policy": self.gateway.policy_name(),
                    })),
                );
                Err(error.into())
            }
        }
    }

    /// Name of the gateway's failure policy (`strict` or `permissive`).
    #[must_use]
    pub fn policy_name(&self) -> &'static str {
        self.gateway.policy_name()
    }

    // ── Audit trail ─────────────────────────────────────────────────────

    /// Record an audit entry. Never fails.
    pub fn record(
        &self,
        action: impl Into<String>,
        resource: impl Into<String>,
        context: Option<serde_json::Value>,
    ) -> AuditEntry {
        self.trail.record(action, resource, context)
    }

    /// All retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.trail.entries()
    }

    // ── Activity and session ────────────────────────────────────────────

    /// Feed one raw interaction signal into the monitor.
    pub fn notify(&self, signal: InteractionSignal) {
        self.monitor.notify(signal);
    }

    /// Time since the last committed activity. Never negative; reads as
    /// zero while the clock is unavailable.
    #[must_use]
    pub fn time_since_last_activity(&self) -> Duration {
        self.monitor.time_since_last_activity()
    }

    /// Current session liveness.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.detector.session_state()
    }

    /// Register an observer for session-state transitions.
    pub fn subscribe_timeout(&self, observer: Arc<dyn TimeoutObserver>) -> ObserverId {
        self.detector.subscribe(observer)
    }

    /// Remove a transition observer. Returns false if the id was unknown.
    pub fn unsubscribe_timeout(&self, id: ObserverId) -> bool {
        self.detector.unsubscribe(id)
    }

    /// Surface a message through the accessibility announcer.
    pub fn announce(&self, message: &str) {
        self.announcer.announce(message);
    }

    // ── Collaborator access ─────────────────────────────────────────────

    /// The audit trail recorder.
    #[must_use]
    pub fn trail(&self) -> &Arc<AuditTrailRecorder> {
        &self.trail
    }

    /// The activity monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ActivityMonitor> {
        &self.monitor
    }

    /// The timeout detector.
    #[must_use]
    pub fn detector(&self) -> &Arc<SessionTimeoutDetector> {
        &self.detector
    }

    /// The validated config this core was built from.
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Subscribe to `source` and spawn the two driver tasks.
    ///
    /// Each call subscribes and spawns a fresh pair of drivers; hosts call
    /// this once after construction and hold the returned [`StartedCore`]
    /// until [`StartedCore::shutdown`].
    #[must_use]
    pub fn start(&self, source: &mut dyn SignalSource) -> StartedCore {
        let monitor = Arc::clone(&self.monitor);
        let subscription = source.subscribe(Arc::new(move |signal| monitor.notify(signal)));

        let poll_interval = activity_poll_interval(self.config.debounce_window());
        let activity = spawn_activity_driver(Arc::clone(&self.monitor), poll_interval);
        let timeout = spawn_timeout_driver(Arc::clone(&self.detector), self.config.tick_interval());

        info!(
            poll_interval_ms = poll_interval.as_millis() as u64,
            tick_interval_secs = self.config.tick_interval_secs,
            "Audit core started"
        );

        StartedCore {
            subscription,
            activity,
            timeout,
        }
    }
}

impl fmt::Debug for AuditCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditCore")
            .field("policy", &self.gateway.policy_name())
            .field("session_state", &self.detector.session_state())
            .field("trail_len", &self.trail.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// StartedCore
// =============================================================================

/// Running state returned by [`AuditCore::start`]: the signal subscription
/// plus both driver handles.
///
/// Dropping it without calling [`StartedCore::shutdown`] still stops the
/// driver tasks (their shutdown channels close), but leaves the signal
/// subscription registered with the source.
pub struct StartedCore {
    subscription: SubscriptionId,
    activity: ActivityDriverHandle,
    timeout: TimeoutDriverHandle,
}

impl StartedCore {
    /// The subscription registered with the signal source.
    #[must_use]
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Unsubscribe from `source` and stop both driver tasks.
    ///
    /// Both drivers are signalled before either is joined, so teardown
    /// takes one task-switch rather than one tick interval.
    pub async fn shutdown(self, source: &mut dyn SignalSource) {
        source.unsubscribe(self.subscription);
        self.activity.signal_shutdown();
        self.timeout.signal_shutdown();
        self.activity.join().await;
        self.timeout.join().await;
        info!("Audit core stopped");
    }
}

impl fmt::Debug for StartedCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartedCore")
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

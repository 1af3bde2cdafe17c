//! Debounced user-activity monitoring.
//!
//! Interaction signals arrive in bursts (typing, scrolling, pointer moves).
//! Committing every one of them would flood the audit trail, so the monitor
//! buffers a burst and commits it once as a single activity event after a
//! quiet window with no further signals.
//!
//! The debounce is trailing: each new signal refreshes the quiet window, and
//! the pending burst commits only when [`ActivityMonitor::poll_commit`]
//! observes that the window has fully elapsed. A periodic driver task
//! ([`spawn_activity_driver`]) does that polling so buffered bursts always
//! commit eventually.
//!
//! Clock failures never propagate out of this module: a signal that cannot
//! be timestamped is dropped with a WARN, and idle queries degrade to "not
//! idle", which keeps the session on the safe side of any timeout decision.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock, elapsed_ms};
use crate::error::ClockError;
use crate::signal::InteractionSignal;
use crate::trail::{ACTION_USER_ACTIVITY, AuditTrailRecorder, RESOURCE_APPLICATION};

/// Default quiet window before a burst commits.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

/// A burst of signals waiting out the quiet window.
struct PendingBurst {
    /// Timestamp of the first signal in the burst.
    first_signal_ms: u64,
    /// Timestamp of the most recent signal; the quiet window counts from here.
    last_signal_ms: u64,
    /// Number of signals coalesced so far.
    signals: u64,
    /// Most recent signal kind, carried into the audit context.
    kind: InteractionSignal,
}

/// Mutable monitor state (behind Mutex).
struct MonitorState {
    /// Timestamp of the last committed activity; `None` until the clock has
    /// been read successfully at least once.
    last_activity_ms: Option<u64>,
    pending: Option<PendingBurst>,
    commits: u64,
    signals_observed: u64,
}

/// A committed activity burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCommit {
    /// Poll-time timestamp the commit was stamped with.
    pub committed_at_ms: u64,
    /// Timestamp of the first signal in the burst.
    pub first_signal_ms: u64,
    /// Timestamp of the last signal in the burst.
    pub last_signal_ms: u64,
    /// Number of signals coalesced into this commit.
    pub signals_coalesced: u64,
}

/// Trailing-debounce activity monitor.
///
/// Thread-safe via interior `Mutex`; signal delivery and commit polling may
/// race freely across threads.
pub struct ActivityMonitor {
    window_ms: u64,
    record_commits: bool,
    clock: Arc<dyn Clock>,
    trail: Arc<AuditTrailRecorder>,
    state: Mutex<MonitorState>,
}

impl ActivityMonitor {
    /// Create a monitor with the system clock that records every commit.
    #[must_use]
    pub fn new(window: Duration, trail: Arc<AuditTrailRecorder>) -> Self {
        Self::with_collaborators(window, true, Arc::new(SystemClock), trail)
    }

    /// Create a monitor with explicit collaborators.
    ///
    /// `record_commits` is false in development configurations: bursts still
    /// commit and refresh the activity baseline, but no trail entry is
    /// written.
    #[must_use]
    pub fn with_collaborators(
        window: Duration,
        record_commits: bool,
        clock: Arc<dyn Clock>,
        trail: Arc<AuditTrailRecorder>,
    ) -> Self {
        let last_activity_ms = clock.epoch_ms().ok();
        Self {
            window_ms: window.as_millis() as u64,
            record_commits,
            clock,
            trail,
            state: Mutex::new(MonitorState {
                last_activity_ms,
                pending: None,
                commits: 0,
                signals_observed: 0,
            }),
        }
    }

    /// Deliver an interaction signal.
    ///
    /// The signal joins the pending burst (or starts one) and refreshes the
    /// quiet window. Nothing commits here; see [`Self::poll_commit`]. A
    /// clock failure drops the signal with a WARN.
    pub fn notify(&self, signal: InteractionSignal) {
        let now_ms = match self.clock.epoch_ms() {
            Ok(ms) => ms,
            Err(error) => {
                warn!(error = %error, "Clock unavailable; dropping activity signal");
                return;
            }
        };

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.signals_observed += 1;
        match &mut state.pending {
            Some(burst) => {
                burst.last_signal_ms = now_ms;
                burst.signals += 1;
                burst.kind = signal;
            }
            None => {
                state.pending = Some(PendingBurst {
                    first_signal_ms: now_ms,
                    last_signal_ms: now_ms,
                    signals: 1,
                    kind: signal,
                });
            }
        }
    }

    /// Commit the pending burst if its quiet window has elapsed.
    ///
    /// Call this periodically so buffered bursts always commit eventually.
    /// On commit the activity baseline is stamped with the poll-time clock
    /// reading and a `USER_ACTIVITY` entry is recorded (unless commit
    /// recording is disabled). A clock failure leaves the burst pending.
    pub fn poll_commit(&self) -> Option<ActivityCommit> {
        let now_ms = match self.clock.epoch_ms() {
            Ok(ms) => ms,
            Err(error) => {
                warn!(error = %error, "Clock unavailable; leaving activity burst pending");
                return None;
            }
        };

        let burst = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let quiet = state
                .pending
                .as_ref()
                .map(|b| now_ms.saturating_sub(b.last_signal_ms) >= self.window_ms)?;
            if !quiet {
                return None;
            }
            let burst = state.pending.take()?;
            state.last_activity_ms = Some(now_ms);
            state.commits += 1;
            burst
        };

        if self.record_commits {
            self.trail.record(
                ACTION_USER_ACTIVITY,
                RESOURCE_APPLICATION,
                Some(serde_json::json!({
                    "signal": burst.kind.as_str(),
                    "signals_coalesced": burst.signals,
                    "burst_started_ms": burst.first_signal_ms,
                })),
            );
        }
        debug!(
            signals = burst.signals,
            window_ms = self.window_ms,
            "Activity burst committed"
        );

        Some(ActivityCommit {
            committed_at_ms: now_ms,
            first_signal_ms: burst.first_signal_ms,
            last_signal_ms: burst.last_signal_ms,
            signals_coalesced: burst.signals,
        })
    }

    /// Time since the last committed activity.
    ///
    /// Monotonic and never negative: a clock that jumps backwards or fails
    /// outright reads as zero idle time.
    #[must_use]
    pub fn time_since_last_activity(&self) -> Duration {
        self.idle_duration().unwrap_or(Duration::ZERO)
    }

    /// Time since the last committed activity, surfacing clock failures.
    ///
    /// The first successful reading seeds the activity baseline, so a
    /// monitor constructed during a clock outage starts its idle count from
    /// recovery rather than from epoch.
    ///
    /// # Errors
    ///
    /// Returns an error when the clock cannot be read.
    pub fn idle_duration(&self) -> Result<Duration, ClockError> {
        let now_ms = self.clock.epoch_ms()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let baseline = *state.last_activity_ms.get_or_insert(now_ms);
        Ok(elapsed_ms(now_ms, baseline))
    }

    /// Timestamp of the last committed activity, if any reading succeeded.
    #[must_use]
    pub fn last_activity_ms(&self) -> Option<u64> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_activity_ms
    }

    /// Whether a burst is currently waiting out its quiet window.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .is_some()
    }

    /// Number of committed bursts.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).commits
    }

    /// Number of signals accepted (timestamped) since construction.
    #[must_use]
    pub fn signals_observed(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .signals_observed
    }

    /// Configured quiet window.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl std::fmt::Debug for ActivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("ActivityMonitor")
            .field("window_ms", &self.window_ms)
            .field("record_commits", &self.record_commits)
            .field("commits", &state.commits)
            .field("pending", &state.pending.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Driver task
// =============================================================================

/// Handle returned by [`spawn_activity_driver`] to control the poll task.
///
/// Dropping the handle also stops the task: the driver exits as soon as its
/// shutdown channel closes.
pub struct ActivityDriverHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ActivityDriverHandle {
    /// Signal the driver to stop.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the driver task to finish.
    pub async fn join(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the periodic poll task that commits quiet bursts.
///
/// # Arguments
/// * `monitor` – shared monitor receiving signals from the host.
/// * `poll_interval` – how often to check for an elapsed quiet window.
#[must_use]
pub fn spawn_activity_driver(
    monitor: Arc<ActivityMonitor>,
    poll_interval: Duration,
) -> ActivityDriverHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let _ = monitor.poll_commit();
                }
                _ = shutdown_rx.changed() => {
                    info!("Activity driver: shutdown signal received");
                    break;
                }
            }
        }
    });

    ActivityDriverHandle {
        task,
        shutdown: shutdown_tx,
    }
}

// =============================================================================
// Tests
// =============================================================================

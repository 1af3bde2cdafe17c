//! Session idle-timeout detection.
//!
//! A two-state machine driven by periodic ticks: `Active` sessions become
//! `TimedOut` once idle time reaches the configured threshold, and a
//! `TimedOut` session becomes `Active` again when committed activity pulls
//! idle time back under it.
//!
//! Transitions are edge-triggered. Crossing into `TimedOut` records exactly
//! one `SESSION_TIMEOUT` entry, announces the event for assistive
//! technology, and notifies subscribed observers; staying timed out across
//! further ticks does nothing. Resuming notifies observers and logs, but
//! writes no trail entry of its own (the committed activity that caused the
//! resume already did).
//!
//! A tick that cannot read the clock changes nothing: the session keeps its
//! current state until time can be measured again.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::announce::{Announcer, NullAnnouncer};
use crate::monitor::ActivityMonitor;
use crate::trail::{ACTION_SESSION_TIMEOUT, AuditTrailRecorder, RESOURCE_APPLICATION};

/// Default idle threshold before a session times out.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default interval between timeout checks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Announcement spoken when a session times out.
pub const TIMEOUT_ANNOUNCEMENT: &str = "Session timed out due to inactivity";

/// Session liveness as seen by the timeout detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Activity has been seen within the timeout threshold.
    Active,
    /// Idle time reached the threshold; waiting for new activity.
    TimedOut,
}

impl SessionState {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTransition {
    /// State before the tick.
    pub from: SessionState,
    /// State after the tick.
    pub to: SessionState,
    /// Idle duration observed at the tick.
    pub idle: Duration,
}

/// Host callback for session state transitions.
///
/// Called outside the detector's lock; implementations may call back into
/// the detector.
pub trait TimeoutObserver: Send + Sync {
    /// Invoked once per state transition.
    fn on_transition(&self, transition: SessionTransition);
}

/// Identifies a registered observer for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Mutable detector state (behind Mutex).
struct DetectorState {
    session: SessionState,
    observers: Vec<(ObserverId, Arc<dyn TimeoutObserver>)>,
    next_observer_id: u64,
    timeouts_detected: u64,
    resumes_detected: u64,
}

/// Edge-triggered idle-timeout detector.
pub struct SessionTimeoutDetector {
    timeout: Duration,
    monitor: Arc<ActivityMonitor>,
    trail: Arc<AuditTrailRecorder>,
    announcer: Arc<dyn Announcer>,
    state: Mutex<DetectorState>,
}

impl SessionTimeoutDetector {
    /// Create a detector with no announcements.
    #[must_use]
    pub fn new(
        timeout: Duration,
        monitor: Arc<ActivityMonitor>,
        trail: Arc<AuditTrailRecorder>,
    ) -> Self {
        Self::with_announcer(timeout, monitor, trail, Arc::new(NullAnnouncer))
    }

    /// Create a detector that announces timeouts through the given announcer.
    #[must_use]
    pub fn with_announcer(
        timeout: Duration,
        monitor: Arc<ActivityMonitor>,
        trail: Arc<AuditTrailRecorder>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        Self {
            timeout,
            monitor,
            trail,
            announcer,
            state: Mutex::new(DetectorState {
                session: SessionState::Active,
                observers: Vec::new(),
                next_observer_id: 0,
                timeouts_detected: 0,
                resumes_detected: 0,
            }),
        }
    }

    /// Evaluate idle time and advance the state machine one step.
    ///
    /// Returns the transition taken, if any. A clock failure is a no-op:
    /// the session keeps its current state.
    pub fn tick(&self) -> Option<SessionTransition> {
        let idle = match self.monitor.idle_duration() {
            Ok(idle) => idle,
            Err(error) => {
                warn!(error = %error, "Clock unavailable; session state unchanged");
                return None;
            }
        };

        let transition = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match state.session {
                SessionState::Active if idle >= self.timeout => {
                    state.session = SessionState::TimedOut;
                    state.timeouts_detected += 1;
                    Some(SessionTransition {
                        from: SessionState::Active,
                        to: SessionState::TimedOut,
                        idle,
                    })
                }
                SessionState::TimedOut if idle < self.timeout => {
                    state.session = SessionState::Active;
                    state.resumes_detected += 1;
                    Some(SessionTransition {
                        from: SessionState::TimedOut,
                        to: SessionState::Active,
                        idle,
                    })
                }
                _ => None,
            }
        };

        if let Some(transition) = transition {
            self.publish(transition);
        }
        transition
    }

    /// Record, announce, and fan a transition out to observers.
    fn publish(&self, transition: SessionTransition) {
        match transition.to {
            SessionState::TimedOut => {
                warn!(
                    idle_ms = transition.idle.as_millis() as u64,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Session timed out after inactivity"
                );
                self.trail.record(
                    ACTION_SESSION_TIMEOUT,
                    RESOURCE_APPLICATION,
                    Some(serde_json::json!({
                        "idle_ms": transition.idle.as_millis() as u64,
                        "timeout_ms": self.timeout.as_millis() as u64,
                    })),
                );
                self.announcer.announce(TIMEOUT_ANNOUNCEMENT);
            }
            SessionState::Active => {
                info!(
                    idle_ms = transition.idle.as_millis() as u64,
                    "Session resumed after new activity"
                );
            }
        }

        let observers: Vec<Arc<dyn TimeoutObserver>> = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
        };
        for observer in observers {
            observer.on_transition(transition);
        }
    }

    /// Register an observer for state transitions.
    pub fn subscribe(&self, observer: Arc<dyn TimeoutObserver>) -> ObserverId {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let id = ObserverId(state.next_observer_id);
        state.next_observer_id += 1;
        state.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns false when the id is unknown.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let before = state.observers.len();
        state.observers.retain(|(oid, _)| *oid != id);
        state.observers.len() < before
    }

    /// Current session state.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).session
    }

    /// Number of Active to TimedOut transitions taken.
    #[must_use]
    pub fn timeouts_detected(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .timeouts_detected
    }

    /// Number of TimedOut to Active transitions taken.
    #[must_use]
    pub fn resumes_detected(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .resumes_detected
    }

    /// Configured idle threshold.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for SessionTimeoutDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("SessionTimeoutDetector")
            .field("timeout", &self.timeout)
            .field("session", &state.session)
            .field("observers", &state.observers.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Driver task
// =============================================================================

/// Handle returned by [`spawn_timeout_driver`] to control the tick task.
///
/// Dropping the handle also stops the task: the driver exits as soon as its
/// shutdown channel closes.
pub struct TimeoutDriverHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl TimeoutDriverHandle {
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

/// Spawn the periodic tick task that drives the timeout state machine.
///
/// # Arguments
/// * `detector` – shared detector evaluated on each tick.
/// * `tick_interval` – time between evaluations.
#[must_use]
pub fn spawn_timeout_driver(
    detector: Arc<SessionTimeoutDetector>,
    tick_interval: Duration,
) -> TimeoutDriverHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let _ = detector.tick();
                }
                _ = shutdown_rx.changed() => {
                    info!("Timeout driver: shutdown signal received");
                    break;
                }
            }
        }
    });

    TimeoutDriverHandle {
        task,
        shutdown: shutdown_tx,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::signal::InteractionSignal;
    use crate::trail::ACTION_USER_ACTIVITY;

    struct MockAnnouncer {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl Announcer for MockAnnouncer {
        fn announce(&self, message: &str) {
            self.messages
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(message.to_string());
        }
    }

    struct MockObserver {
        transitions: Arc<Mutex<Vec<SessionTransition>>>,
    }

    impl TimeoutObserver for MockObserver {
        fn on_transition(&self, transition: SessionTransition) {
            self.transitions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(transition);
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        trail: Arc<AuditTrailRecorder>,
        monitor: Arc<ActivityMonitor>,
        detector: Arc<SessionTimeoutDetector>,
        announcements: Arc<Mutex<Vec<String>>>,
    }

    /// Timeout 10s, debounce window 100ms, manual clock at t=100000ms.
    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(100_000));
        let trail = Arc::new(AuditTrailRecorder::with_collaborators(
            100,
            clock.clone(),
            None,
        ));
        let monitor = Arc::new(ActivityMonitor::with_collaborators(
            Duration::from_millis(100),
            true,
            clock.clone(),
            trail.clone(),
        ));
        let announcements = Arc::new(Mutex::new(Vec::new()));
        let detector = Arc::new(SessionTimeoutDetector::with_announcer(
            Duration::from_secs(10),
            monitor.clone(),
            trail.clone(),
            Arc::new(MockAnnouncer {
                messages: announcements.clone(),
            }),
        ));
        Fixture {
            clock,
            trail,
            monitor,
            detector,
            announcements,
        }
    }

    /// Commit one activity burst at the fixture's current manual time.
    fn commit_activity(fx: &Fixture) {
        fx.monitor.notify(InteractionSignal::KeyInput);
        fx.clock.advance_ms(150);
        fx.monitor.poll_commit().expect("burst should commit");
    }

    // ── Timeout edge ────────────────────────────────────────────────────

    #[test]
    fn session_starts_active() {
        let fx = fixture();
        assert_eq!(fx.detector.session_state(), SessionState::Active);
        assert_eq!(fx.detector.tick(), None);
    }

    #[test]
    fn no_timeout_before_threshold() {
        let fx = fixture();
        fx.clock.advance_ms(9_999);
        assert_eq!(fx.detector.tick(), None);
        assert_eq!(fx.detector.session_state(), SessionState::Active);
        assert!(fx.trail.is_empty());
    }

    #[test]
    fn exact_threshold_times_out() {
        let fx = fixture();
        fx.clock.advance_ms(10_000);
        let transition = fx.detector.tick().expect("threshold reached");
        assert_eq!(transition.from, SessionState::Active);
        assert_eq!(transition.to, SessionState::TimedOut);
        assert_eq!(transition.idle, Duration::from_secs(10));
    }

    #[test]
    fn timeout_records_exactly_one_entry() {
        let fx = fixture();
        fx.clock.advance_ms(60_000);
        assert!(fx.detector.tick().is_some());

        // Further ticks while timed out change nothing.
        fx.clock.advance_ms(60_000);
        assert_eq!(fx.detector.tick(), None);
        assert_eq!(fx.detector.tick(), None);

        let entries = fx.trail.entries_by_action(ACTION_SESSION_TIMEOUT);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resource, RESOURCE_APPLICATION);
        assert_eq!(fx.detector.timeouts_detected(), 1);
    }

    #[test]
    fn timeout_entry_context_carries_idle_and_threshold() {
        let fx = fixture();
        fx.clock.advance_ms(25_000);
        fx.detector.tick().expect("timeout");

        let entries = fx.trail.entries_by_action(ACTION_SESSION_TIMEOUT);
        let context = entries[0].context.as_ref().expect("context");
        assert_eq!(context["idle_ms"], 25_000);
        assert_eq!(context["timeout_ms"], 10_000);
    }

    #[test]
    fn announcer_speaks_once_per_timeout() {
        let fx = fixture();
        fx.clock.advance_ms(15_000);
        fx.detector.tick().expect("timeout");
        fx.clock.advance_ms(15_000);
        fx.detector.tick();

        let spoken = fx.announcements.lock().unwrap();
        assert_eq!(spoken.as_slice(), [TIMEOUT_ANNOUNCEMENT]);
    }

    // ── Resume edge ─────────────────────────────────────────────────────

    #[test]
    fn committed_activity_resumes_session() {
        let fx = fixture();
        fx.clock.advance_ms(15_000);
        fx.detector.tick().expect("timeout");
        assert_eq!(fx.detector.session_state(), SessionState::TimedOut);

        commit_activity(&fx);
        let transition = fx.detector.tick().expect("resume");
        assert_eq!(transition.from, SessionState::TimedOut);
        assert_eq!(transition.to, SessionState::Active);
        assert_eq!(fx.detector.resumes_detected(), 1);
    }

    #[test]
    fn resume_writes_no_timeout_entry() {
        let fx = fixture();
        fx.clock.advance_ms(15_000);
        fx.detector.tick().expect("timeout");
        commit_activity(&fx);
        fx.detector.tick().expect("resume");

        assert_eq!(fx.trail.entries_by_action(ACTION_SESSION_TIMEOUT).len(), 1);
        assert_eq!(fx.trail.entries_by_action(ACTION_USER_ACTIVITY).len(), 1);
    }

    #[test]
    fn full_timeout_resume_timeout_cycle() {
        let fx = fixture();
        fx.clock.advance_ms(15_000);
        assert!(fx.detector.tick().is_some());
        commit_activity(&fx);
        assert!(fx.detector.tick().is_some());

        fx.clock.advance_ms(15_000);
        assert!(fx.detector.tick().is_some());
        assert_eq!(fx.detector.timeouts_detected(), 2);
        assert_eq!(fx.detector.resumes_detected(), 1);
        assert_eq!(fx.trail.entries_by_action(ACTION_SESSION_TIMEOUT).len(), 2);
    }

    #[test]
    fn pending_uncommitted_burst_does_not_resume() {
        let fx = fixture();
        fx.clock.advance_ms(15_000);
        fx.detector.tick().expect("timeout");

        // A signal alone is not committed activity.
        fx.monitor.notify(InteractionSignal::KeyInput);
        assert_eq!(fx.detector.tick(), None);
        assert_eq!(fx.detector.session_state(), SessionState::TimedOut);
    }

    // ── Clock degradation ───────────────────────────────────────────────

    #[test]
    fn clock_failure_keeps_active_session_active() {
        let fx = fixture();
        fx.clock.advance_ms(60_000);
        fx.clock.fail();

        assert_eq!(fx.detector.tick(), None);
        assert_eq!(fx.detector.session_state(), SessionState::Active);
        assert!(fx.trail.is_empty());
    }

    #[test]
    fn clock_failure_keeps_timed_out_session_timed_out() {
        let fx = fixture();
        fx.clock.advance_ms(15_000);
        fx.detector.tick().expect("timeout");
        fx.clock.fail();

        assert_eq!(fx.detector.tick(), None);
        assert_eq!(fx.detector.session_state(), SessionState::TimedOut);
    }

    #[test]
    fn detection_resumes_after_clock_recovery() {
        let fx = fixture();
        fx.clock.advance_ms(60_000);
        fx.clock.fail();
        assert_eq!(fx.detector.tick(), None);

        fx.clock.recover();
        assert!(fx.detector.tick().is_some());
        assert_eq!(fx.detector.session_state(), SessionState::TimedOut);
    }

    // ── Observers ───────────────────────────────────────────────────────

    #[test]
    fn observers_see_both_edges() {
        let fx = fixture();
        let transitions = Arc::new(Mutex::new(Vec::new()));
        fx.detector.subscribe(Arc::new(MockObserver {
            transitions: transitions.clone(),
        }));

        fx.clock.advance_ms(15_000);
        fx.detector.tick();
        commit_activity(&fx);
        fx.detector.tick();

        let seen = transitions.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].to, SessionState::TimedOut);
        assert_eq!(seen[1].to, SessionState::Active);
    }

    #[test]
    fn unsubscribed_observer_stops_receiving() {
        let fx = fixture();
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let id = fx.detector.subscribe(Arc::new(MockObserver {
            transitions: transitions.clone(),
        }));

        assert!(fx.detector.unsubscribe(id));
        fx.clock.advance_ms(15_000);
        fx.detector.tick().expect("timeout");

        assert!(transitions.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_unknown_id_returns_false() {
        let fx = fixture();
        let id = fx.detector.subscribe(Arc::new(MockObserver {
            transitions: Arc::new(Mutex::new(Vec::new())),
        }));
        assert!(fx.detector.unsubscribe(id));
        assert!(!fx.detector.unsubscribe(id));
    }

    #[test]
    fn session_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionState::TimedOut).unwrap(),
            "\"timed_out\""
        );
        assert_eq!(SessionState::Active.to_string(), "active");
    }

    // ── Driver task ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn driver_detects_timeout() {
        let fx = fixture();
        let handle = spawn_timeout_driver(Arc::clone(&fx.detector), Duration::from_millis(10));

        fx.clock.advance_ms(60_000);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.detector.session_state(), SessionState::TimedOut);

        handle.join().await;
    }

    #[tokio::test]
    async fn driver_stops_on_signal() {
        let fx = fixture();
        let handle = spawn_timeout_driver(fx.detector, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.signal_shutdown();
        handle.join().await;
    }
}

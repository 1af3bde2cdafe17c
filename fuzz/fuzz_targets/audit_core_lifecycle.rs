#![no_main]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use vigil_core::clock::ManualClock;
use vigil_core::monitor::ActivityMonitor;
use vigil_core::signal::InteractionSignal;
use vigil_core::timeout::{SessionTimeoutDetector, SessionTransition, TimeoutObserver};
use vigil_core::trail::{
    ACTION_SESSION_TIMEOUT, AuditTrailRecorder, GENESIS_HASH, RESOURCE_APPLICATION,
    RESOURCE_AUTHENTICATION, RESOURCE_SECURITY,
};

const CAPACITY: usize = 8;
const WINDOW_MS: u64 = 50;
const TIMEOUT: Duration = Duration::from_secs(60);

struct TransitionLog(Mutex<Vec<SessionTransition>>);

impl TimeoutObserver for TransitionLog {
    fn on_transition(&self, transition: SessionTransition) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(transition);
    }
}

fn signal_for(tag: u8) -> InteractionSignal {
    match tag % 5 {
        0 => InteractionSignal::PointerInput,
        1 => InteractionSignal::KeyInput,
        2 => InteractionSignal::FocusChange,
        3 => InteractionSignal::Navigation,
        _ => InteractionSignal::Custom {
            name: format!("fuzz-{tag}"),
        },
    }
}

fn action_for(tag: u8) -> &'static str {
    match tag % 6 {
        0 => "LOGIN_SUCCESS",
        1 => "NOTE_SAVED",
        2 => "LOGOUT",
        3 => "büro-änderung",
        4 => "操作",
        // Empty strings must record verbatim, never panic.
        _ => "",
    }
}

fn resource_for(tag: u8) -> &'static str {
    match tag % 4 {
        0 => RESOURCE_APPLICATION,
        1 => RESOURCE_AUTHENTICATION,
        2 => RESOURCE_SECURITY,
        _ => "",
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() > 65_536 {
        return;
    }

    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let trail = Arc::new(AuditTrailRecorder::with_collaborators(
        CAPACITY,
        clock.clone(),
        None,
    ));
    let monitor = Arc::new(ActivityMonitor::with_collaborators(
        Duration::from_millis(WINDOW_MS),
        true,
        clock.clone(),
        trail.clone(),
    ));
    let detector = SessionTimeoutDetector::new(TIMEOUT, monitor.clone(), trail.clone());

    let log = Arc::new(TransitionLog(Mutex::new(Vec::new())));
    let observer_id = detector.subscribe(log.clone());

    let mut clock_down = false;

    for chunk in data.chunks(3) {
        let [op_tag, a, b] = match chunk {
            [x, y, z] => [*x, *y, *z],
            _ => break,
        };

        match op_tag % 8 {
            0 => {
                let context = if b & 1 == 0 {
                    None
                } else {
                    Some(serde_json::json!({"seq": b, "tag": a}))
                };
                let _ = trail.record(action_for(a), resource_for(b), context);
            }
            1 => monitor.notify(signal_for(a)),
            2 => clock.advance_ms(u64::from(a) * 256 + u64::from(b)),
            3 => {
                let _ = monitor.poll_commit();
            }
            4 => {
                let _ = detector.tick();
            }
            5 => {
                if clock_down {
                    clock.recover();
                } else {
                    clock.fail();
                }
                clock_down = !clock_down;
            }
            6 => {
                let _ = trail.entries();
                let _ = monitor.time_since_last_activity();
                let _ = detector.session_state();
            }
            _ => {
                let _ = monitor.poll_commit();
                let _ = detector.tick();
            }
        }
    }

    // Settle: a healthy clock, the pending burst flushed, one final tick.
    clock.recover();
    clock.advance_ms(WINDOW_MS + 1);
    let _ = monitor.poll_commit();
    let _ = detector.tick();

    let entries = trail.entries();
    assert!(
        entries.len() <= CAPACITY,
        "retained entries exceed capacity: {} > {CAPACITY}",
        entries.len()
    );
    assert_eq!(
        trail.total_appended(),
        trail.total_evicted() + entries.len() as u64,
        "append/evict counters out of balance"
    );

    // The retained window always chains: each entry links to its
    // predecessor and ordinals are contiguous.
    if let Some(first) = entries.first() {
        let verification = AuditTrailRecorder::verify_chain(&entries, &first.prev_entry_hash);
        assert!(
            verification.chain_intact,
            "hash chain broke under fuzz input: {verification:?}"
        );
        assert!(
            verification.missing_ordinals.is_empty(),
            "ordinal gap under fuzz input: {verification:?}"
        );
    }
    if trail.total_evicted() == 0 {
        let verification = AuditTrailRecorder::verify_chain(&entries, GENESIS_HASH);
        assert!(
            verification.chain_intact,
            "unwrapped trail should anchor at genesis: {verification:?}"
        );
    }

    // Edge triggering: transitions alternate, and every edge incremented
    // exactly one detector counter.
    let transitions = log.0.lock().unwrap_or_else(|e| e.into_inner());
    for pair in transitions.windows(2) {
        assert_eq!(
            pair[1].from, pair[0].to,
            "state machine skipped an edge: {transitions:?}"
        );
        assert_ne!(
            pair[1].to, pair[0].to,
            "state machine repeated an edge: {transitions:?}"
        );
    }
    assert_eq!(
        detector.timeouts_detected() + detector.resumes_detected(),
        transitions.len() as u64,
        "transition counters disagree with observed edges"
    );
    assert!(
        trail.entries_by_action(ACTION_SESSION_TIMEOUT).len() as u64
            <= detector.timeouts_detected(),
        "more timeout entries retained than timeouts detected"
    );

    drop(transitions);
    let _ = detector.unsubscribe(observer_id);
});

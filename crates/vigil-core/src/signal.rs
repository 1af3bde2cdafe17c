//! Interaction signals and the source they arrive from.
//!
//! The monitor consumes coarse-grained signals (pointer, key, focus) and
//! does not care which environment produced them. Hosts adapt their event
//! system to [`SignalSource`]; the in-process [`ManualSignalSource`] backs
//! tests and the scripted demo.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One raw user-interaction event, before debouncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionSignal {
    /// Mouse/touch/pen input.
    PointerInput,
    /// Keyboard input.
    KeyInput,
    /// Focus moved between UI elements or windows.
    FocusChange,
    /// In-app navigation (route/view change).
    Navigation,
    /// Host-defined signal kind.
    Custom { name: String },
}

impl InteractionSignal {
    /// Stable lowercase tag for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointerInput => "pointer_input",
            Self::KeyInput => "key_input",
            Self::FocusChange => "focus_change",
            Self::Navigation => "navigation",
            Self::Custom { .. } => "custom",
        }
    }
}

/// Callback invoked for every raw signal.
pub type SignalSubscriber = Arc<dyn Fn(InteractionSignal) + Send + Sync>;

/// Identifier for one subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Environment-agnostic source of interaction signals.
///
/// Hosts implement this over their native event system (DOM listeners,
/// terminal input loop, window events). Subscribers must be released via
/// `unsubscribe` at teardown so no callback outlives the core.
pub trait SignalSource {
    /// Register a subscriber; it receives every subsequent signal.
    fn subscribe(&mut self, subscriber: SignalSubscriber) -> SubscriptionId;

    /// Remove a subscriber. Returns false if the id was unknown.
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

/// In-process signal source with explicit `emit`.
#[derive(Default)]
pub struct ManualSignalSource {
    subscribers: Vec<(SubscriptionId, SignalSubscriber)>,
    next_id: u64,
}

impl ManualSignalSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `signal` to every current subscriber.
    pub fn emit(&self, signal: InteractionSignal) {
        for (_, subscriber) in &self.subscribers {
            subscriber(signal.clone());
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl SignalSource for ManualSignalSource {
    fn subscribe(&mut self, subscriber: SignalSubscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn signal_serializes_snake_case() {
        let json = serde_json::to_string(&InteractionSignal::PointerInput).unwrap();
        assert_eq!(json, r#"{"type":"pointer_input"}"#);

        let json = serde_json::to_string(&InteractionSignal::Custom {
            name: "scroll".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"custom","name":"scroll"}"#);
    }

    #[test]
    fn signal_as_str_tags() {
        assert_eq!(InteractionSignal::KeyInput.as_str(), "key_input");
        assert_eq!(
            InteractionSignal::Custom {
                name: "anything".to_string()
            }
            .as_str(),
            "custom"
        );
    }

    #[test]
    fn manual_source_fans_out_to_all_subscribers() {
        let mut source = ManualSignalSource::new();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));

        let sink_a = Arc::clone(&seen_a);
        source.subscribe(Arc::new(move |signal| {
            sink_a.lock().unwrap().push(signal);
        }));
        let sink_b = Arc::clone(&seen_b);
        source.subscribe(Arc::new(move |signal| {
            sink_b.lock().unwrap().push(signal);
        }));

        source.emit(InteractionSignal::KeyInput);

        assert_eq!(seen_a.lock().unwrap().len(), 1);
        assert_eq!(seen_b.lock().unwrap().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut source = ManualSignalSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = source.subscribe(Arc::new(move |signal| {
            sink.lock().unwrap().push(signal);
        }));

        source.emit(InteractionSignal::Navigation);
        assert!(source.unsubscribe(id));
        source.emit(InteractionSignal::Navigation);

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_unknown_id_returns_false() {
        let mut source = ManualSignalSource::new();
        let id = source.subscribe(Arc::new(|_| {}));
        assert!(source.unsubscribe(id));
        assert!(!source.unsubscribe(id));
    }
}

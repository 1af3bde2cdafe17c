//! Accessibility announce capability.
//!
//! The accessibility layer injects an announcer; the core calls it on
//! high-severity events (session timeout) and knows nothing about how the
//! announcement is rendered (screen reader, toast, terminal bell).

use tracing::info;

/// Capability to surface a short message to the user's assistive layer.
pub trait Announcer: Send + Sync {
    /// Announce `message`. Must not block or fail.
    fn announce(&self, message: &str);
}

/// Announcer that drops every message. Default when no accessibility
/// collaborator is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAnnouncer;

impl Announcer for NullAnnouncer {
    fn announce(&self, _message: &str) {}
}

/// Announcer that logs at info level. Used by the CLI host, where the log
/// stream is the closest thing to an assistive channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnnouncer;

impl Announcer for TracingAnnouncer {
    fn announce(&self, message: &str) {
        info!(text = %message, "accessibility announcement");
    }
}

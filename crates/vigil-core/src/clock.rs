//! Clock seam for everything that reads wall-clock time.
//!
//! Components never call `SystemTime::now()` directly; they hold a
//! `Clock` so tests and the demo can drive time explicitly, and so a
//! clock read failure is a value the caller can absorb instead of a
//! crash.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ClockError;

/// Source of "now" in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    ///
    /// # Errors
    /// Returns `ClockError::Unavailable` when the time source cannot be
    /// read. Callers with fail-safe contracts treat this as a no-op.
    fn epoch_ms(&self) -> Result<u64, ClockError>;
}

/// Wall-clock implementation backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> Result<u64, ClockError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .map_err(|_| ClockError::Unavailable)
    }
}

/// Manually driven clock for tests and scripted demos.
///
/// Starts at a fixed epoch-ms value and only moves when told to. Can be
/// switched into a failing mode where every read returns
/// `ClockError::Unavailable`, which is how fail-safe paths are exercised.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
    failing: AtomicBool,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
            failing: AtomicBool::new(false),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.advance_ms(by.as_millis() as u64);
    }

    /// Move time forward by raw milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Make every subsequent read fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Restore normal reads.
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn epoch_ms(&self) -> Result<u64, ClockError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClockError::Unavailable);
        }
        Ok(self.now_ms.load(Ordering::SeqCst))
    }
}

/// Saturating elapsed time between two epoch-ms readings.
///
/// A `then` in the future (clock skew, races around manual `set`) yields
/// zero rather than wrapping.
#[must_use]
pub fn elapsed_ms(now_ms: u64, then_ms: u64) -> Duration {
    Duration::from_millis(now_ms.saturating_sub(then_ms))
}

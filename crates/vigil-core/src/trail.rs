//! Bounded audit trail with tamper-evident hash chain.
//!
//! Every compliance-relevant operation lands here as a structured
//! [`AuditEntry`]:
//!
//! - Append-only within a bounded window; oldest entries are evicted
//!   first once the trail reaches capacity
//! - SHA-256 hash chain (`prev_entry_hash`) for tamper evidence
//! - Monotonic ordinals for gap detection across eviction
//! - Principal identity attached from a [`PrincipalResolver`] when one
//!   is configured
//!
//! # Hash Chain
//!
//! Each entry carries the SHA-256 hash of the previous entry's canonical
//! JSON. An exported trail can be verified offline by replaying the chain
//! from genesis (or from the hash of the last evicted entry). Insertion,
//! deletion, and modification all break the chain.
//!
//! # Recording Never Fails
//!
//! [`AuditTrailRecorder::record`] has no error path. A failing clock
//! degrades to a zero timestamp, an absent resolver leaves the principal
//! unset, and empty action or resource strings are recorded verbatim.
//! Each degradation is logged at WARN.
//!
//! # Thread Safety
//!
//! `AuditTrailRecorder` is `Send + Sync` via interior `Mutex`. Writes are
//! serialized to maintain hash chain ordering; audit writes are
//! low-frequency so the single lock is not a bottleneck.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::identity::PrincipalResolver;

// =============================================================================
// Constants
// =============================================================================

/// Hash of the genesis entry (all zeros).
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Default maximum number of retained entries.
pub const DEFAULT_MAX_AUDIT_ENTRIES: usize = 1000;

/// Action recorded when debounced user activity is committed.
pub const ACTION_USER_ACTIVITY: &str = "USER_ACTIVITY";

/// Action recorded when a session crosses the idle timeout.
pub const ACTION_SESSION_TIMEOUT: &str = "SESSION_TIMEOUT";

/// Action recorded when a strict-mode encryption failure is escalated.
pub const ACTION_ENCRYPTION_FAILURE: &str = "ENCRYPTION_FAILURE";

/// Action recorded when a strict-mode decryption failure is escalated.
pub const ACTION_DECRYPTION_FAILURE: &str = "DECRYPTION_FAILURE";

/// Resource for application-level lifecycle events.
pub const RESOURCE_APPLICATION: &str = "APPLICATION";

/// Resource for sign-in and sign-out events.
pub const RESOURCE_AUTHENTICATION: &str = "AUTHENTICATION";

/// Resource for cryptographic failure escalations.
pub const RESOURCE_SECURITY: &str = "SECURITY";

// =============================================================================
// Audit Entry
// =============================================================================

/// A single entry in the audit trail.
///
/// Each entry includes the SHA-256 hash of the previous entry's canonical
/// JSON for tamper evidence (hash chain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Time-ordered unique identifier (`audit-{timestamp}-{random}`).
    pub id: String,
    /// Monotonically increasing ordinal for gap detection.
    pub ordinal: u64,
    /// Timestamp (ms since epoch); zero when the clock was unavailable.
    pub timestamp_ms: u64,
    /// What happened (e.g. `LOGIN_SUCCESS`).
    pub action: String,
    /// What it happened to (e.g. `AUTHENTICATION`).
    pub resource: String,
    /// Principal identity at record time, when resolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Caller-supplied structured context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// SHA-256 hash of the previous entry's canonical JSON.
    pub prev_entry_hash: String,
}

impl AuditEntry {
    /// Compute the SHA-256 hash of this entry's canonical JSON.
    #[must_use]
    pub fn hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(json.as_bytes());
        hex::encode(digest)
    }
}

/// Generate a time-ordered entry ID (UUID v7-like: timestamp prefix + random).
fn generate_entry_id(timestamp_ms: u64) -> String {
    let rand: u64 = rand::random();
    format!("audit-{timestamp_ms:013x}-{rand:016x}")
}

// =============================================================================
// Chain Verification Result
// =============================================================================

/// Result of verifying the audit hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    /// Total entries verified.
    pub total_entries: u64,
    /// Whether the chain is intact.
    pub chain_intact: bool,
    /// First broken entry ordinal (if any).
    pub first_break_at: Option<u64>,
    /// Missing ordinals (gap detection).
    pub missing_ordinals: Vec<u64>,
    /// Observed ordinal range (first, last).
    pub ordinal_range: Option<(u64, u64)>,
}

// =============================================================================
// Trail Statistics
// =============================================================================

/// Summary statistics over the retained entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrailStats {
    /// Retained entry count.
    pub total_entries: u64,
    /// Entries by action.
    pub by_action: std::collections::HashMap<String, u64>,
    /// Entries by resource.
    pub by_resource: std::collections::HashMap<String, u64>,
    /// Entries that carry a principal identity.
    pub with_principal: u64,
    /// Ordinal range (first, last) of retained entries.
    pub ordinal_range: Option<(u64, u64)>,
}

// =============================================================================
// Audit Trail Recorder
// =============================================================================

/// In-memory trail state (behind Mutex).
struct TrailInner {
    /// Entries in insertion order; front is oldest.
    entries: VecDeque<AuditEntry>,
    /// Next ordinal to assign.
    next_ordinal: u64,
    /// Hash of the most recently appended entry.
    last_hash: String,
    /// Retention capacity.
    capacity: usize,
    /// Total entries ever appended (including evicted).
    total_appended: u64,
    /// Total entries evicted to stay within capacity.
    total_evicted: u64,
}

/// Bounded audit trail recorder with tamper-evident hash chain.
///
/// Thread-safe via interior `Mutex`; eviction and append happen under one
/// lock so concurrent writers can never push the trail past capacity.
///
/// # Example
///
/// ```ignore
/// use vigil_core::trail::AuditTrailRecorder;
///
/// let trail = AuditTrailRecorder::new(1000);
/// let entry = trail.record(
///     "LOGIN_SUCCESS",
///     "AUTHENTICATION",
///     Some(serde_json::json!({ "role": "guide" })),
/// );
/// assert_eq!(entry.ordinal, 0);
/// ```
pub struct AuditTrailRecorder {
    inner: Mutex<TrailInner>,
    clock: Arc<dyn Clock>,
    resolver: Option<Arc<dyn PrincipalResolver>>,
}

impl AuditTrailRecorder {
    /// Create a recorder with the system clock and no principal resolver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_collaborators(capacity, Arc::new(SystemClock), None)
    }

    /// Create a recorder with explicit clock and principal resolver.
    ///
    /// A zero capacity is clamped to one: the trail always retains the most
    /// recent entry.
    #[must_use]
    pub fn with_collaborators(
        capacity: usize,
        clock: Arc<dyn Clock>,
        resolver: Option<Arc<dyn PrincipalResolver>>,
    ) -> Self {
        Self {
            inner: Mutex::new(TrailInner {
                entries: VecDeque::new(),
                next_ordinal: 0,
                last_hash: GENESIS_HASH.to_string(),
                capacity: capacity.max(1),
                total_appended: 0,
                total_evicted: 0,
            }),
            clock,
            resolver,
        }
    }

    /// Append a new audit entry. Returns the finalized entry with ordinal
    /// and hash chain fields populated.
    ///
    /// This never fails: clock problems degrade to a zero timestamp and an
    /// unresolvable principal is simply omitted. Empty `action` or
    /// `resource` strings are recorded verbatim and logged at WARN.
    pub fn record(
        &self,
        action: impl Into<String>,
        resource: impl Into<String>,
        context: Option<serde_json::Value>,
    ) -> AuditEntry {
        let action = action.into();
        let resource = resource.into();
        if action.is_empty() || resource.is_empty() {
            warn!(
                action_empty = action.is_empty(),
                resource_empty = resource.is_empty(),
                "Recording audit entry with empty action or resource"
            );
        }

        let timestamp_ms = match self.clock.epoch_ms() {
            Ok(ms) => ms,
            Err(error) => {
                warn!(error = %error, "Clock unavailable; recording with zero timestamp");
                0
            }
        };

        let user_id = self.resolver.as_ref().and_then(|r| r.current_principal());

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let entry = AuditEntry {
            id: generate_entry_id(timestamp_ms),
            ordinal: inner.next_ordinal,
            timestamp_ms,
            action,
            resource,
            user_id,
            context,
            prev_entry_hash: inner.last_hash.clone(),
        };

        inner.last_hash = entry.hash();
        inner.next_ordinal += 1;
        inner.total_appended += 1;

        // Oldest-first eviction keeps the trail within capacity.
        if inner.entries.len() >= inner.capacity {
            inner.entries.pop_front();
            inner.total_evicted += 1;
        }

        inner.entries.push_back(entry.clone());

        entry
    }

    /// Snapshot of all retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.iter().cloned().collect()
    }

    /// Retained entries matching the given action.
    #[must_use]
    pub fn entries_by_action(&self, action: &str) -> Vec<AuditEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    /// Retained entries in a timestamp range (inclusive).
    #[must_use]
    pub fn entries_in_range(&self, start_ms: u64, end_ms: u64) -> Vec<AuditEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .iter()
            .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms <= end_ms)
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    /// Whether the trail has no retained entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .is_empty()
    }

    /// Retention capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).capacity
    }

    /// Total entries ever appended (including those evicted).
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .total_appended
    }

    /// Total entries evicted to stay within capacity.
    #[must_use]
    pub fn total_evicted(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .total_evicted
    }

    /// The next ordinal that will be assigned.
    #[must_use]
    pub fn next_ordinal(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_ordinal
    }

    /// Hash of the most recently appended entry.
    #[must_use]
    pub fn last_hash(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_hash
            .clone()
    }

    /// Compute summary statistics over the retained entries.
    #[must_use]
    pub fn stats(&self) -> TrailStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut stats = TrailStats {
            total_entries: inner.entries.len() as u64,
            ..TrailStats::default()
        };

        if let (Some(first), Some(last)) = (inner.entries.front(), inner.entries.back()) {
            stats.ordinal_range = Some((first.ordinal, last.ordinal));
        }

        for entry in &inner.entries {
            *stats.by_action.entry(entry.action.clone()).or_default() += 1;
            *stats.by_resource.entry(entry.resource.clone()).or_default() += 1;
            if entry.user_id.is_some() {
                stats.with_principal += 1;
            }
        }

        stats
    }

    /// Verify the hash chain of the given entries.
    ///
    /// The entries must be in ordinal order. `expected_prev_hash` is what
    /// the first entry's `prev_entry_hash` should match: [`GENESIS_HASH`]
    /// for a trail verified from the beginning, or the hash of the last
    /// evicted entry when verifying a trail that has already wrapped.
    #[must_use]
    pub fn verify_chain(entries: &[AuditEntry], expected_prev_hash: &str) -> ChainVerification {
        if entries.is_empty() {
            return ChainVerification {
                total_entries: 0,
                chain_intact: true,
                first_break_at: None,
                missing_ordinals: Vec::new(),
                ordinal_range: None,
            };
        }

        let mut chain_intact = true;
        let mut first_break_at = None;
        let mut missing_ordinals = Vec::new();

        let first_ordinal = entries[0].ordinal;
        let last_ordinal = entries[entries.len() - 1].ordinal;

        if entries[0].prev_entry_hash != expected_prev_hash {
            chain_intact = false;
            first_break_at = Some(entries[0].ordinal);
        }

        let mut prev_hash = entries[0].hash();

        for i in 1..entries.len() {
            let entry = &entries[i];

            // Gap detection: check ordinal continuity.
            let expected_ordinal = entries[i - 1].ordinal + 1;
            if entry.ordinal != expected_ordinal {
                for missing in expected_ordinal..entry.ordinal {
                    missing_ordinals.push(missing);
                }
            }

            // Hash chain verification.
            if entry.prev_entry_hash != prev_hash && first_break_at.is_none() {
                chain_intact = false;
                first_break_at = Some(entry.ordinal);
            }

            prev_hash = entry.hash();
        }

        ChainVerification {
            total_entries: entries.len() as u64,
            chain_intact,
            first_break_at,
            missing_ordinals,
            ordinal_range: Some((first_ordinal, last_ordinal)),
        }
    }
}

impl std::fmt::Debug for AuditTrailRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("AuditTrailRecorder")
            .field("len", &inner.entries.len())
            .field("capacity", &inner.capacity)
            .field("next_ordinal", &inner.next_ordinal)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

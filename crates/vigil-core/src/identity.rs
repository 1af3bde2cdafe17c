//! Principal identity resolution.
//!
//! The audit trail stamps entries with the acting principal when one is
//! known. Identity lives in a local key-value store owned by the
//! authentication collaborator; this module only reads its `user` record
//! and extracts an id, best-effort. Resolution failures never surface to
//! the caller; an entry without a principal is still an entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Store key holding the authenticated user record.
pub const USER_RECORD_KEY: &str = "user";

/// Read access to the external local key-value store.
pub trait UserStore: Send + Sync {
    /// Fetch the raw value for `key`, if present.
    fn get(&self, key: &str) -> Option<String>;
}

/// Best-effort lookup of the acting principal's id.
pub trait PrincipalResolver: Send + Sync {
    /// The current principal id, or `None` when nobody is known.
    fn current_principal(&self) -> Option<String>;
}

/// Resolver that reads the `user` record from a [`UserStore`].
///
/// The record is expected to be a JSON object with an `id` field (string
/// or number). Anything else resolves to `None` with a debug log.
pub struct StoreResolver {
    store: Arc<dyn UserStore>,
}

impl StoreResolver {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

impl PrincipalResolver for StoreResolver {
    fn current_principal(&self) -> Option<String> {
        let raw = self.store.get(USER_RECORD_KEY)?;
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => {
                let id = value.get("id").and_then(|id| match id {
                    serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
                if id.is_none() {
                    debug!("User record has no usable id field");
                }
                id
            }
            Err(err) => {
                debug!(error = %err, "User record is not valid JSON");
                None
            }
        }
    }
}

/// In-memory [`UserStore`] for tests and the demo host.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(key.into(), value.into());
    }

    /// Remove a record.
    pub fn remove(&self, key: &str) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.remove(key);
    }
}

impl UserStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(record: Option<&str>) -> StoreResolver {
        let store = MemoryStore::new();
        if let Some(raw) = record {
            store.insert(USER_RECORD_KEY, raw);
        }
        StoreResolver::new(Arc::new(store))
    }

    #[test]
    fn resolves_string_id() {
        let resolver = resolver_with(Some(r#"{"id": "u-184", "name": "Kim"}"#));
        assert_eq!(resolver.current_principal().as_deref(), Some("u-184"));
    }

    #[test]
    fn resolves_numeric_id() {
        let resolver = resolver_with(Some(r#"{"id": 184}"#));
        assert_eq!(resolver.current_principal().as_deref(), Some("184"));
    }

    #[test]
    fn absent_record_resolves_to_none() {
        let resolver = resolver_with(None);
        assert_eq!(resolver.current_principal(), None);
    }

    #[test]
    fn malformed_record_resolves_to_none() {
        let resolver = resolver_with(Some("not json {{"));
        assert_eq!(resolver.current_principal(), None);
    }

    #[test]
    fn record_without_id_resolves_to_none() {
        let resolver = resolver_with(Some(r#"{"name": "Kim"}"#));
        assert_eq!(resolver.current_principal(), None);
    }

    #[test]
    fn empty_string_id_resolves_to_none() {
        let resolver = resolver_with(Some(r#"{"id": ""}"#));
        assert_eq!(resolver.current_principal(), None);
    }

    #[test]
    fn store_insert_and_remove() {
        let store = MemoryStore::new();
        store.insert("user", r#"{"id": "u-1"}"#);
        assert!(store.get("user").is_some());

        store.remove("user");
        assert_eq!(store.get("user"), None);
    }
}

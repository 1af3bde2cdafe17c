//! Configuration for the audit core.
//!
//! Handles loading and validation of vigil.toml configuration files. All
//! fields have documented defaults, so an empty file (or no file at all)
//! yields a working configuration.
//!
//! The encryption key is the one sensitive field: it is accepted from the
//! file as standard base64, never serialized back out, and redacted from
//! `Debug` output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, KeyError};
use crate::gateway::GatewayKey;

/// Main configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Idle minutes before a session times out.
    #[serde(default = "default_session_timeout_minutes")]
    pub session_timeout_minutes: u64,

    /// Maximum retained audit entries before oldest-first eviction.
    #[serde(default = "default_max_audit_entries")]
    pub max_audit_entries: usize,

    /// Symmetric key as standard base64 (32 bytes decoded). Never written
    /// back out when the config is serialized.
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,

    /// Fail closed on encryption errors instead of passing input through.
    #[serde(default = "default_true")]
    pub strict_mode: bool,

    /// Quiet window in milliseconds before an activity burst commits.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,

    /// Development mode: activity commits skip the audit trail.
    #[serde(default)]
    pub development_mode: bool,

    /// Seconds between timeout checks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: default_session_timeout_minutes(),
            max_audit_entries: default_max_audit_entries(),
            encryption_key: None,
            strict_mode: true,
            debounce_window_ms: default_debounce_window_ms(),
            development_mode: false,
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

fn default_session_timeout_minutes() -> u64 {
    30
}

fn default_max_audit_entries() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_debounce_window_ms() -> u64 {
    1000
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl CoreConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error when the TOML cannot be parsed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing, unreadable, or not valid
    /// TOML.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file is unreadable or malformed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check every field for usable values.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "session_timeout_minutes".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_audit_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_audit_entries".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.debounce_window_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "debounce_window_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(encoded) = &self.encryption_key {
            if let Err(error) = GatewayKey::from_base64(encoded) {
                return Err(ConfigError::Invalid {
                    field: "encryption_key".to_string(),
                    reason: error.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Decode the configured encryption key, if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured value is not a valid key.
    pub fn resolved_key(&self) -> Result<Option<GatewayKey>, KeyError> {
        self.encryption_key
            .as_deref()
            .map(GatewayKey::from_base64)
            .transpose()
    }

    /// Idle threshold as a `Duration`.
    #[must_use]
    pub const fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes * 60)
    }

    /// Debounce quiet window as a `Duration`.
    #[must_use]
    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    /// Timeout check cadence as a `Duration`.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("session_timeout_minutes", &self.session_timeout_minutes)
            .field("max_audit_entries", &self.max_audit_entries)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[redacted]"),
            )
            .field("strict_mode", &self.strict_mode)
            .field("debounce_window_ms", &self.debounce_window_ms)
            .field("development_mode", &self.development_mode)
            .field("tick_interval_secs", &self.tick_interval_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let config = CoreConfig::default();
        assert_eq!(config.session_timeout_minutes, 30);
        assert_eq!(config.max_audit_entries, 1000);
        assert_eq!(config.encryption_key, None);
        assert!(config.strict_mode);
        assert_eq!(config.debounce_window_ms, 1000);
        assert!(!config.development_mode);
        assert_eq!(config.tick_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config.session_timeout_minutes, 30);
        assert!(config.strict_mode);
    }

    #[test]
    fn partial_toml_overrides_named_fields_only() {
        let config = CoreConfig::from_toml_str(
            r#"
            session_timeout_minutes = 5
            strict_mode = false
            "#,
        )
        .unwrap();
        assert_eq!(config.session_timeout_minutes, 5);
        assert!(!config.strict_mode);
        assert_eq!(config.max_audit_entries, 1000);
        assert_eq!(config.debounce_window_ms, 1000);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = CoreConfig::from_toml_str("session_timeout_minutes = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(&path, "max_audit_entries = 50\ndevelopment_mode = true\n").unwrap();

        let config = CoreConfig::load_from_path(&path).unwrap();
        assert_eq!(config.max_audit_entries, 50);
        assert!(config.development_mode);
    }

    #[test]
    fn load_from_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = CoreConfig::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_audit_entries, 1000);
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = CoreConfig {
            session_timeout_minutes: 0,
            ..CoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field, .. } if field == "session_timeout_minutes"
        ));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let config = CoreConfig {
            max_audit_entries: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_debounce_window() {
        let config = CoreConfig {
            debounce_window_ms: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_tick_interval() {
        let config = CoreConfig {
            tick_interval_secs: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_undecodable_key() {
        let config = CoreConfig {
            encryption_key: Some("short".to_string()),
            ..CoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field, .. } if field == "encryption_key"
        ));
    }

    #[test]
    fn validate_accepts_generated_key() {
        let config = CoreConfig {
            encryption_key: Some(GatewayKey::generate().to_base64()),
            ..CoreConfig::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.resolved_key().unwrap().is_some());
    }

    #[test]
    fn resolved_key_is_none_without_configuration() {
        assert!(CoreConfig::default().resolved_key().unwrap().is_none());
    }

    #[test]
    fn debug_redacts_encryption_key() {
        let key_b64 = GatewayKey::generate().to_base64();
        let config = CoreConfig {
            encryption_key: Some(key_b64.clone()),
            ..CoreConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains(&key_b64));
    }

    #[test]
    fn serialization_never_emits_key() {
        let config = CoreConfig {
            encryption_key: Some(GatewayKey::generate().to_base64()),
            ..CoreConfig::default()
        };
        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("encryption_key"));
        assert!(toml.contains("session_timeout_minutes = 30"));
    }

    #[test]
    fn duration_helpers_convert_units() {
        let config = CoreConfig {
            session_timeout_minutes: 2,
            debounce_window_ms: 250,
            tick_interval_secs: 5,
            ..CoreConfig::default()
        };
        assert_eq!(config.session_timeout(), Duration::from_secs(120));
        assert_eq!(config.debounce_window(), Duration::from_millis(250));
        assert_eq!(config.tick_interval(), Duration::from_secs(5));
    }
}

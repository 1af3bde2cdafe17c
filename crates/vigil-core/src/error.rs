//! Error types for vigil-core

use std::fmt::Write;
use thiserror::Error;

/// Remediation command for resolving an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemediationCommand {
    /// Short label describing the command purpose
    pub label: String,
    /// Command to run
    pub command: String,
}

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Suggested commands to resolve or diagnose the issue
    pub commands: Vec<RemediationCommand>,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// Add a suggested command
    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(RemediationCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.commands.is_empty() {
            let _ = writeln!(output, "  Commands:");
            for cmd in &self.commands {
                let _ = writeln!(output, "    - {}: {}", cmd.label, cmd.command);
            }
        }

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vigil-core
#[derive(Error, Debug)]
pub enum Error {
    /// Encryption failures
    #[error("Encryption error: {0}")]
    Encrypt(#[from] EncryptError),

    /// Decryption failures
    #[error("Decryption error: {0}")]
    Decrypt(#[from] DecryptError),

    /// Key material errors
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Clock read failures (absorbed by callers that must stay fail-safe)
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Encrypt(err) => Some(err.remediation()),
            Self::Decrypt(err) => Some(err.remediation()),
            Self::Key(err) => Some(err.remediation()),
            Self::Clock(_) => Some(
                Remediation::new("Check the system clock and time synchronization.")
                    .command("Show clock", "date -u")
                    .alternative("Inactivity checks stay in their current state until the clock recovers."),
            ),
            Self::Config(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("Check filesystem permissions and paths, then retry.")
                    .command("Show config", "vg config")
                    .alternative("Verify the config directory exists and is readable."),
            ),
            Self::Json(_) => Some(
                Remediation::new("Validate the JSON input and retry.")
                    .command("Validate JSON", "python -m json.tool < input.json")
                    .alternative("Check for trailing commas or invalid UTF-8."),
            ),
        }
    }
}

/// Encryption gateway errors (encrypt direction)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptError {
    /// Input rejected before the cipher ran
    #[error("Refusing to encrypt an empty plaintext")]
    EmptyPlaintext,

    #[error("Cipher operation failed")]
    CipherFailed,

    #[error("Cipher produced an empty ciphertext")]
    EmptyCiphertextOutput,
}

impl EncryptError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::EmptyPlaintext => {
                Remediation::new("Provide a non-empty value to encrypt.")
                    .command("Encrypt", "vg encrypt \"value\"")
                    .alternative("Empty values are rejected so nothing unprotected slips through.")
            }
            Self::CipherFailed | Self::EmptyCiphertextOutput => {
                Remediation::new("Verify the encryption key, then retry.")
                    .command("Generate a key", "vg keygen")
                    .command("Show config", "vg config")
                    .alternative("Set VIGIL_ENCRYPTION_KEY or encryption_key in the config file.")
            }
        }
    }
}

/// Encryption gateway errors (decrypt direction)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("Refusing to decrypt an empty ciphertext")]
    EmptyCiphertext,

    /// Envelope was not valid base64
    #[error("Ciphertext envelope is not valid base64: {0}")]
    InvalidEnvelope(String),

    /// Envelope decoded but is too short to hold nonce + tag
    #[error("Ciphertext envelope too short: {actual} bytes (minimum {min})")]
    TruncatedEnvelope { min: usize, actual: usize },

    /// Authentication tag mismatch: wrong key or tampered data
    #[error("Ciphertext failed authentication")]
    AuthenticationFailed,

    #[error("Decrypted plaintext is not valid UTF-8")]
    InvalidUtf8Plaintext,

    #[error("Decryption produced an empty plaintext")]
    EmptyPlaintextOutput,
}

impl DecryptError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::EmptyCiphertext => Remediation::new("Provide a non-empty ciphertext to decrypt.")
                .command("Decrypt", "vg decrypt \"<ciphertext>\""),
            Self::InvalidEnvelope(_) | Self::TruncatedEnvelope { .. } => {
                Remediation::new("The value is not a ciphertext produced by this gateway.")
                    .command("Encrypt first", "vg encrypt \"value\"")
                    .alternative("Check that the full ciphertext string was copied.")
            }
            Self::AuthenticationFailed => {
                Remediation::new("Decryption key does not match the key used to encrypt.")
                    .command("Show config", "vg config")
                    .alternative("Ciphertext may have been modified; treat it as untrusted.")
            }
            Self::InvalidUtf8Plaintext | Self::EmptyPlaintextOutput => {
                Remediation::new("The ciphertext decrypted to unusable data.")
                    .command("Show config", "vg config")
                    .alternative("Re-encrypt the original value and replace the stored ciphertext.")
            }
        }
    }
}

/// Key material errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Key is not valid base64: {0}")]
    InvalidEncoding(String),

    /// No key was supplied by flag, environment, or config file
    #[error("No encryption key configured")]
    Missing,
}

impl KeyError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        Remediation::new("Provide a base64-encoded 32-byte key.")
            .command("Generate a key", "vg keygen")
            .alternative("Set VIGIL_ENCRYPTION_KEY or encryption_key in the config file.")
    }
}

/// Clock read errors. Internal: components that must never lock a user out
/// absorb this and treat the operation as a no-op.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("System clock is unavailable")]
    Unavailable,
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::FileNotFound(path) => Remediation::new(format!(
                "Config file not found: {path}. Verify the path and retry."
            ))
            .command("Check path", format!("ls -l \"{path}\""))
            .alternative("Pass --config with the correct path."),
            Self::ReadFailed(path, _) => Remediation::new(format!(
                "Failed to read config file: {path}. Check permissions."
            ))
            .command("Check permissions", format!("ls -l \"{path}\""))
            .alternative("Ensure the file is readable by the current user."),
            Self::ParseFailed(_) => Remediation::new("Config parse failed. Fix the syntax and retry.")
                .command("Show effective config", "vg config")
                .alternative("Validate the TOML file format."),
            Self::Invalid { field, .. } => Remediation::new(format!(
                "Config validation failed for `{field}`. Fix the value and retry."
            ))
            .command("Show effective config", "vg config")
            .alternative("Remove the field to fall back to the default."),
        }
    }
}

/// Format an error with remediation guidance for display.
#[must_use]
pub fn format_error_with_remediation(error: &Error) -> String {
    let mut output = format!("Error: {error}");
    if let Some(remediation) = error.remediation() {
        output.push('\n');
        output.push('\n');
        output.push_str(&remediation.render_plain());
    }
    output
}

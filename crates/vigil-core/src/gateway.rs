//! Symmetric encryption gateway for locally held sensitive strings.
//!
//! Payloads are sealed with XChaCha20-Poly1305 under a random 192-bit nonce
//! and carried as a base64 envelope of `nonce || ciphertext || tag`. The
//! extended nonce makes random generation safe for the message volumes a
//! client-resident audit core will ever see.
//!
//! Failure handling is delegated to a [`FailurePolicy`] chosen at
//! construction time. [`StrictPolicy`] fails closed: every error is
//! propagated and no partial or fallback output escapes. [`PermissivePolicy`]
//! returns the input unchanged so a host that opted out of strictness keeps
//! functioning in a degraded, observable way.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use tracing::warn;
use zeroize::ZeroizeOnDrop;

use crate::error::{DecryptError, EncryptError, KeyError};

/// Size of the symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the XChaCha20-Poly1305 nonce in bytes (192 bits).
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Smallest decodable envelope: a nonce plus the tag of an empty message.
pub const MIN_ENVELOPE_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// A 256-bit symmetric key.
///
/// Key material is zeroized on drop and never printed by `Debug`.
#[derive(Clone, ZeroizeOnDrop)]
pub struct GatewayKey {
    bytes: [u8; KEY_SIZE],
}

impl GatewayKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Generate a random key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            bytes: rand::random::<[u8; KEY_SIZE]>(),
        }
    }

    /// Try to create a key from a slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly [`KEY_SIZE`] bytes.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        if slice.len() != KEY_SIZE {
            return Err(KeyError::InvalidLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self { bytes })
    }

    /// Decode a key from standard base64.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid base64 or decodes to the
    /// wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Self::try_from_slice(&decoded)
    }

    /// Encode the key as standard base64, suitable for config files.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.bytes)
    }

    /// Get the key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for GatewayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayKey").finish_non_exhaustive()
    }
}

/// How the gateway responds when an encrypt or decrypt operation fails.
///
/// Policies never see key material, only the offending input and the error.
pub trait FailurePolicy: Send + Sync {
    /// Short policy name used in logs.
    fn name(&self) -> &'static str;

    /// Resolve a failed encryption: return a fallback output or propagate.
    ///
    /// # Errors
    ///
    /// Returns the original error when the policy propagates failures.
    fn on_encrypt_failure(
        &self,
        plaintext: &str,
        error: EncryptError,
    ) -> Result<String, EncryptError>;

    /// Resolve a failed decryption: return a fallback output or propagate.
    ///
    /// # Errors
    ///
    /// Returns the original error when the policy propagates failures.
    fn on_decrypt_failure(
        &self,
        envelope: &str,
        error: DecryptError,
    ) -> Result<String, DecryptError>;
}

/// Fail-closed policy: every failure is propagated to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPolicy;

impl FailurePolicy for StrictPolicy {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn on_encrypt_failure(
        &self,
        _plaintext: &str,
        error: EncryptError,
    ) -> Result<String, EncryptError> {
        Err(error)
    }

    fn on_decrypt_failure(
        &self,
        _envelope: &str,
        error: DecryptError,
    ) -> Result<String, DecryptError> {
        Err(error)
    }
}

/// Degraded-but-available policy: failures return the input unchanged.
///
/// Every engagement is logged at WARN so the fallback never goes unnoticed.
/// The logs carry the error only, never the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePolicy;

impl FailurePolicy for PermissivePolicy {
    fn name(&self) -> &'static str {
        "permissive"
    }

    fn on_encrypt_failure(
        &self,
        plaintext: &str,
        error: EncryptError,
    ) -> Result<String, EncryptError> {
        warn!(
            policy = self.name(),
            error = %error,
            "Encryption failed; returning input unchanged"
        );
        Ok(plaintext.to_string())
    }

    fn on_decrypt_failure(
        &self,
        envelope: &str,
        error: DecryptError,
    ) -> Result<String, DecryptError> {
        warn!(
            policy = self.name(),
            error = %error,
            "Decryption failed; returning input unchanged"
        );
        Ok(envelope.to_string())
    }
}

/// String-in, string-out encryption front door.
///
/// Construction binds a key and a failure policy for the gateway's lifetime;
/// there is no way to switch policies on a live gateway.
pub struct EncryptionGateway {
    cipher: XChaCha20Poly1305,
    policy: Box<dyn FailurePolicy>,
}

impl EncryptionGateway {
    /// Create a gateway with an explicit failure policy.
    #[must_use]
    pub fn new(key: &GatewayKey, policy: Box<dyn FailurePolicy>) -> Self {
        let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
        Self { cipher, policy }
    }

    /// Create a fail-closed gateway.
    #[must_use]
    pub fn strict(key: &GatewayKey) -> Self {
        Self::new(key, Box::new(StrictPolicy))
    }

    /// Create a gateway that falls back to returning inputs unchanged.
    #[must_use]
    pub fn permissive(key: &GatewayKey) -> Self {
        Self::new(key, Box::new(PermissivePolicy))
    }

    /// Name of the failure policy this gateway was built with.
    #[must_use]
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Encrypt a plaintext string into a base64 envelope.
    ///
    /// Two calls with the same plaintext produce different envelopes; only
    /// the round-trip through [`Self::decrypt`] is stable.
    ///
    /// # Errors
    ///
    /// Under [`StrictPolicy`], returns an error for empty plaintext or a
    /// cipher failure. Under [`PermissivePolicy`] the input comes back
    /// unchanged instead.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptError> {
        match self.encrypt_inner(plaintext) {
            Ok(envelope) => Ok(envelope),
            Err(error) => self.policy.on_encrypt_failure(plaintext, error),
        }
    }

    /// Decrypt a base64 envelope back into the plaintext string.
    ///
    /// # Errors
    ///
    /// Under [`StrictPolicy`], returns an error for an empty, malformed,
    /// truncated, or tampered envelope. Under [`PermissivePolicy`] the input
    /// comes back unchanged instead.
    pub fn decrypt(&self, envelope: &str) -> Result<String, DecryptError> {
        match self.decrypt_inner(envelope) {
            Ok(plaintext) => Ok(plaintext),
            Err(error) => self.policy.on_decrypt_failure(envelope, error),
        }
    }

    fn encrypt_inner(&self, plaintext: &str) -> Result<String, EncryptError> {
        if plaintext.is_empty() {
            return Err(EncryptError::EmptyPlaintext);
        }
        let nonce_bytes: [u8; NONCE_SIZE] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt((&nonce_bytes).into(), plaintext.as_bytes())
            .map_err(|_| EncryptError::CipherFailed)?;
        if ciphertext.is_empty() {
            return Err(EncryptError::EmptyCiphertextOutput);
        }
        let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(envelope))
    }

    fn decrypt_inner(&self, envelope: &str) -> Result<String, DecryptError> {
        if envelope.is_empty() {
            return Err(DecryptError::EmptyCiphertext);
        }
        let decoded = BASE64
            .decode(envelope)
            .map_err(|e| DecryptError::InvalidEnvelope(e.to_string()))?;
        if decoded.len() < MIN_ENVELOPE_SIZE {
            return Err(DecryptError::TruncatedEnvelope {
                min: MIN_ENVELOPE_SIZE,
                actual: decoded.len(),
            });
        }
        let (nonce_bytes, ciphertext) = decoded.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| DecryptError::AuthenticationFailed)?;
        let plaintext =
            String::from_utf8(plaintext).map_err(|_| DecryptError::InvalidUtf8Plaintext)?;
        if plaintext.is_empty() {
            return Err(DecryptError::EmptyPlaintextOutput);
        }
        Ok(plaintext)
    }
}

impl std::fmt::Debug for EncryptionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionGateway")
            .field("policy", &self.policy.name())
            .finish_non_exhaustive()
    }
}

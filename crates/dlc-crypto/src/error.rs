//! Crypto error types.

use thiserror::Error;

/// Errors from envelope cryptography.
///
/// Every variant is a hard failure of one request attempt. A retry builds a
/// fresh session key, so none of these poison later attempts.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Symmetric encryption failed, including a key of the wrong length.
    #[error("payload encryption failed: {0}")]
    Encryption(String),

    /// Symmetric decryption failed: tag mismatch, wrong key, or truncated input.
    #[error("payload decryption failed: {0}")]
    Decryption(String),

    /// Wrapping the session key under the partner's public key failed.
    #[error("session key wrap failed: {0}")]
    KeyWrap(String),

    /// Unwrapping a session key with our private key failed.
    #[error("session key unwrap failed: {0}")]
    KeyUnwrap(String),

    /// Producing a signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Key material could not be read or parsed.
    #[error("cannot load {what}: {reason}")]
    KeyLoad {
        /// Which key was being loaded.
        what: &'static str,
        /// Why it failed.
        reason: String,
    },

    /// The configured public certificate does not belong to the private key.
    #[error("own public key does not match own private key")]
    KeyMismatch,
}

impl CryptoError {
    pub(crate) fn key_load(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::KeyLoad {
            what,
            reason: reason.to_string(),
        }
    }
}

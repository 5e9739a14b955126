//! # Crypto Engine
//!
//! Immutable bundle of key material and wrap policy. Cheap to clone (the
//! keys sit behind an `Arc`) and safe to share across region tasks: every
//! operation is a pure function of its inputs and the loaded keys.

use std::sync::Arc;

use crate::error::CryptoError;
use crate::keys::KeyMaterial;
use crate::session_key::SessionKey;
use crate::signature;
use crate::symmetric::{self, SealedPayload};
use crate::wrap::{self, KeyWrapPolicy};

/// Envelope cryptography bound to one set of keys.
#[derive(Debug, Clone)]
pub struct CryptoEngine {
    keys: Arc<KeyMaterial>,
    wrap_policy: KeyWrapPolicy,
}

impl CryptoEngine {
    pub fn new(keys: KeyMaterial, wrap_policy: KeyWrapPolicy) -> Self {
        Self {
            keys: Arc::new(keys),
            wrap_policy,
        }
    }

    /// Loaded keys.
    pub fn key_material(&self) -> &KeyMaterial {
        &self.keys
    }

    /// Active wrap policy.
    pub fn wrap_policy(&self) -> KeyWrapPolicy {
        self.wrap_policy
    }

    /// Fresh per-request session key.
    pub fn generate_session_key(&self) -> SessionKey {
        SessionKey::generate()
    }

    /// AES-256-GCM seal, IV taken from the key.
    pub fn encrypt_payload(
        &self,
        plaintext: &[u8],
        key: &SessionKey,
    ) -> Result<SealedPayload, CryptoError> {
        symmetric::encrypt_payload(plaintext, key)
    }

    /// AES-256-GCM open of `ciphertext || tag`.
    pub fn decrypt_payload(
        &self,
        ciphertext_with_tag: &[u8],
        key: &SessionKey,
    ) -> Result<Vec<u8>, CryptoError> {
        symmetric::decrypt_payload(ciphertext_with_tag, key)
    }

    /// Wrap a session key for the partner.
    pub fn wrap_session_key(&self, key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
        wrap::wrap_session_key(key, self.keys.partner_public(), &self.wrap_policy)
    }

    /// Unwrap a session key the partner wrapped for us.
    pub fn unwrap_session_key(&self, wrapped: &[u8]) -> Result<SessionKey, CryptoError> {
        wrap::unwrap_session_key(wrapped, self.keys.own_private(), &self.wrap_policy)
    }

    /// Sign plaintext with our private key.
    pub fn sign(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        signature::sign(plaintext, self.keys.own_private())
    }

    /// Verify a partner signature over plaintext.
    pub fn verify(&self, plaintext: &[u8], signature: &[u8]) -> bool {
        signature::verify(plaintext, signature, self.keys.partner_public())
    }

    /// Exercise the own key pair: sign/verify and wrap/unwrap round trips.
    ///
    /// Run at startup so a bad deployment fails before the first request.
    pub fn self_check(&self) -> Result<(), CryptoError> {
        const PROBE: &[u8] = b"{\"self_check\":true}";
        let signature = self.sign(PROBE)?;
        if !signature::verify(PROBE, &signature, self.keys.own_public()) {
            return Err(CryptoError::KeyMismatch);
        }

        let key = self.generate_session_key();
        let wrapped = wrap::wrap_session_key(&key, self.keys.own_public(), &self.wrap_policy)?;
        if self.unwrap_session_key(&wrapped)? != key {
            return Err(CryptoError::KeyMismatch);
        }

        let sealed = self.encrypt_payload(PROBE, &key)?;
        if self.decrypt_payload(sealed.as_bytes(), &key)? != PROBE {
            return Err(CryptoError::Decryption("self-check payload mismatch".into()));
        }
        Ok(())
    }
}

//! # Session Key Wrapping
//!
//! The session key travels out-of-band in the `AccessToken` header,
//! encrypted under the partner's RSA public key. There is no negotiation:
//! a padding/hash mismatch looks exactly like a wrong key to the partner,
//! so the scheme is configuration rather than code.
//!
//! The configured scheme is always tried first. PKCS#1 v1.5 is only a
//! compatibility fallback and can be disabled.

use rand::rngs::OsRng;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;

use crate::error::CryptoError;
use crate::session_key::SessionKey;

/// RSA padding used to wrap session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyWrapScheme {
    /// RSA-OAEP with SHA-256 for both the label hash and MGF1.
    OaepSha256,
    /// RSA-OAEP with SHA-1 for both the label hash and MGF1.
    OaepSha1,
    /// Legacy PKCS#1 v1.5 encryption padding.
    Pkcs1v15,
}

impl KeyWrapScheme {
    /// Configuration name of this scheme.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OaepSha256 => "oaep-sha256",
            Self::OaepSha1 => "oaep-sha1",
            Self::Pkcs1v15 => "pkcs1v15",
        }
    }

    fn encrypt(self, key: &RsaPublicKey, data: &[u8]) -> rsa::Result<Vec<u8>> {
        let mut rng = OsRng;
        match self {
            Self::OaepSha256 => key.encrypt(&mut rng, Oaep::new::<Sha256>(), data),
            Self::OaepSha1 => key.encrypt(&mut rng, Oaep::new::<Sha1>(), data),
            Self::Pkcs1v15 => key.encrypt(&mut rng, Pkcs1v15Encrypt, data),
        }
    }

    fn decrypt(self, key: &RsaPrivateKey, data: &[u8]) -> rsa::Result<Vec<u8>> {
        match self {
            Self::OaepSha256 => key.decrypt(Oaep::new::<Sha256>(), data),
            Self::OaepSha1 => key.decrypt(Oaep::new::<Sha1>(), data),
            Self::Pkcs1v15 => key.decrypt(Pkcs1v15Encrypt, data),
        }
    }
}

impl std::fmt::Display for KeyWrapScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeyWrapScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oaep-sha256" | "oaep_sha256" | "oaep256" => Ok(Self::OaepSha256),
            "oaep-sha1" | "oaep_sha1" | "oaep" => Ok(Self::OaepSha1),
            "pkcs1v15" | "pkcs1-v1_5" | "pkcs1" => Ok(Self::Pkcs1v15),
            other => Err(format!(
                "unknown key wrap scheme {other:?}; expected oaep-sha256, oaep-sha1 or pkcs1v15"
            )),
        }
    }
}

/// Which scheme to use, and whether PKCS#1 v1.5 may stand in for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyWrapPolicy {
    pub scheme: KeyWrapScheme,
    pub allow_legacy_fallback: bool,
}

impl Default for KeyWrapPolicy {
    fn default() -> Self {
        Self {
            scheme: KeyWrapScheme::OaepSha256,
            allow_legacy_fallback: true,
        }
    }
}

impl KeyWrapPolicy {
    fn fallback(&self) -> Option<KeyWrapScheme> {
        (self.allow_legacy_fallback && self.scheme != KeyWrapScheme::Pkcs1v15)
            .then_some(KeyWrapScheme::Pkcs1v15)
    }
}

/// Encrypt the raw session key bytes under the partner's public key.
pub fn wrap_session_key(
    key: &SessionKey,
    partner_public: &RsaPublicKey,
    policy: &KeyWrapPolicy,
) -> Result<Vec<u8>, CryptoError> {
    match policy.scheme.encrypt(partner_public, key.as_bytes()) {
        Ok(wrapped) => Ok(wrapped),
        Err(primary) => {
            let Some(fallback) = policy.fallback() else {
                return Err(CryptoError::KeyWrap(format!("{}: {primary}", policy.scheme)));
            };
            tracing::warn!(
                scheme = %policy.scheme,
                fallback = %fallback,
                "session key wrap failed, using legacy padding: {primary}"
            );
            fallback
                .encrypt(partner_public, key.as_bytes())
                .map_err(|e| CryptoError::KeyWrap(format!("{}: {primary}; {fallback}: {e}", policy.scheme)))
        }
    }
}

/// Recover a session key wrapped under our public key.
pub fn unwrap_session_key(
    wrapped: &[u8],
    own_private: &RsaPrivateKey,
    policy: &KeyWrapPolicy,
) -> Result<SessionKey, CryptoError> {
    match policy.scheme.decrypt(own_private, wrapped) {
        Ok(raw) => Ok(SessionKey::from_bytes(raw)),
        Err(primary) => {
            let Some(fallback) = policy.fallback() else {
                return Err(CryptoError::KeyUnwrap(format!("{}: {primary}", policy.scheme)));
            };
            tracing::debug!(scheme = %policy.scheme, "unwrap failed, trying {fallback}");
            fallback
                .decrypt(own_private, wrapped)
                .map(SessionKey::from_bytes)
                .map_err(|e| {
                    CryptoError::KeyUnwrap(format!("{}: {primary}; {fallback}: {e}", policy.scheme))
                })
        }
    }
}

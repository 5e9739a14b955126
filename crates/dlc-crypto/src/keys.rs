//! # Key Material
//!
//! The partner's public key (wraps our session keys, verifies their
//! signatures) and our own RSA key pair (signs our payloads, unwraps keys on
//! inbound calls). Loaded once at startup, immutable afterwards.
//!
//! ## Accepted Encodings
//!
//! | Key | Formats |
//! |-----|---------|
//! | Public | PEM `CERTIFICATE`, DER X.509 certificate, PEM `PUBLIC KEY`, PEM `RSA PUBLIC KEY` |
//! | Private | PEM `PRIVATE KEY` (PKCS#8), PEM `RSA PRIVATE KEY` (PKCS#1) |
//!
//! Keys below 2048 bits are rejected.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::Certificate;

use crate::error::CryptoError;

/// Minimum accepted modulus size.
pub const MIN_KEY_BITS: usize = 2048;

/// RSA keys used by the envelope.
#[derive(Clone)]
pub struct KeyMaterial {
    partner_public: RsaPublicKey,
    own_private: RsaPrivateKey,
    own_public: RsaPublicKey,
}

impl KeyMaterial {
    /// Assemble key material from parsed keys.
    ///
    /// # Errors
    ///
    /// - `KeyLoad` if any key is smaller than 2048 bits.
    /// - `KeyMismatch` if `own_public` is not the public half of `own_private`.
    pub fn new(
        partner_public: RsaPublicKey,
        own_private: RsaPrivateKey,
        own_public: RsaPublicKey,
    ) -> Result<Self, CryptoError> {
        check_size("partner public key", &partner_public)?;
        check_size("own public key", &own_public)?;
        if own_private.to_public_key() != own_public {
            return Err(CryptoError::KeyMismatch);
        }
        Ok(Self {
            partner_public,
            own_private,
            own_public,
        })
    }

    /// Parse key material from encoded bytes.
    pub fn from_encoded(
        partner_public: &[u8],
        own_private: &[u8],
        own_public: &[u8],
    ) -> Result<Self, CryptoError> {
        Self::new(
            parse_public_key("partner public key", partner_public)?,
            parse_private_key(own_private)?,
            parse_public_key("own public key", own_public)?,
        )
    }

    /// Read and parse key material from files.
    pub fn load(
        partner_public: &Path,
        own_private: &Path,
        own_public: &Path,
    ) -> Result<Self, CryptoError> {
        let read = |what: &'static str, path: &Path| {
            std::fs::read(path)
                .map_err(|e| CryptoError::key_load(what, format!("{}: {e}", path.display())))
        };
        let keys = Self::from_encoded(
            &read("partner public key", partner_public)?,
            &read("own private key", own_private)?,
            &read("own public key", own_public)?,
        )?;
        tracing::info!(
            partner_key_bits = keys.partner_public.size() * 8,
            own_key_bits = keys.own_public.size() * 8,
            "loaded gateway key material"
        );
        Ok(keys)
    }

    /// Partner's public key.
    pub fn partner_public(&self) -> &RsaPublicKey {
        &self.partner_public
    }

    /// Our private key.
    pub fn own_private(&self) -> &RsaPrivateKey {
        &self.own_private
    }

    /// Our public key.
    pub fn own_public(&self) -> &RsaPublicKey {
        &self.own_public
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("partner_public_bits", &(self.partner_public.size() * 8))
            .field("own_private", &"[REDACTED]")
            .field("own_public_bits", &(self.own_public.size() * 8))
            .finish()
    }
}

fn check_size(what: &'static str, key: &RsaPublicKey) -> Result<(), CryptoError> {
    let bits = key.size() * 8;
    if bits < MIN_KEY_BITS {
        return Err(CryptoError::key_load(
            what,
            format!("{bits}-bit modulus is below the {MIN_KEY_BITS}-bit minimum"),
        ));
    }
    Ok(())
}

fn pem_label(text: &str) -> Option<&str> {
    let start = text.find("-----BEGIN ")? + "-----BEGIN ".len();
    let len = text[start..].find("-----")?;
    Some(&text[start..start + len])
}

/// Parse an RSA public key from a certificate or a bare public key.
pub fn parse_public_key(what: &'static str, encoded: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    let text = match std::str::from_utf8(encoded) {
        Ok(text) if text.contains("-----BEGIN ") => text,
        // Binary input: a DER certificate, as `.cer` files often are.
        _ => {
            let cert = Certificate::from_der(encoded).map_err(|e| CryptoError::key_load(what, e))?;
            return public_key_from_certificate(what, &cert);
        }
    };

    match pem_label(text) {
        Some("CERTIFICATE") => {
            let cert = Certificate::from_pem(text.as_bytes()).map_err(|e| CryptoError::key_load(what, e))?;
            public_key_from_certificate(what, &cert)
        }
        Some("PUBLIC KEY") => {
            RsaPublicKey::from_public_key_pem(text).map_err(|e| CryptoError::key_load(what, e))
        }
        Some("RSA PUBLIC KEY") => {
            RsaPublicKey::from_pkcs1_pem(text).map_err(|e| CryptoError::key_load(what, e))
        }
        Some(other) => Err(CryptoError::key_load(
            what,
            format!("unsupported PEM block {other:?}"),
        )),
        None => Err(CryptoError::key_load(what, "malformed PEM header")),
    }
}

fn public_key_from_certificate(
    what: &'static str,
    cert: &Certificate,
) -> Result<RsaPublicKey, CryptoError> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| CryptoError::key_load(what, e))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| CryptoError::key_load(what, e))
}

/// Parse an RSA private key from PKCS#8 or PKCS#1 PEM.
pub fn parse_private_key(encoded: &[u8]) -> Result<RsaPrivateKey, CryptoError> {
    const WHAT: &str = "own private key";
    let text = std::str::from_utf8(encoded).map_err(|_| CryptoError::key_load(WHAT, "not PEM text"))?;
    match pem_label(text) {
        Some("PRIVATE KEY") => {
            RsaPrivateKey::from_pkcs8_pem(text).map_err(|e| CryptoError::key_load(WHAT, e))
        }
        Some("RSA PRIVATE KEY") => {
            RsaPrivateKey::from_pkcs1_pem(text).map_err(|e| CryptoError::key_load(WHAT, e))
        }
        Some("ENCRYPTED PRIVATE KEY") => Err(CryptoError::key_load(
            WHAT,
            "encrypted private keys are not supported; decrypt before deployment",
        )),
        Some(other) => Err(CryptoError::key_load(
            WHAT,
            format!("unsupported PEM block {other:?}"),
        )),
        None => Err(CryptoError::key_load(WHAT, "malformed PEM header")),
    }
}

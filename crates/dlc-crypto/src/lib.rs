//! # dlc-crypto: Gateway Envelope Cryptography
//!
//! Primitives for the partner gateway's request/response envelope. Output
//! must be bit-exact with what the partner expects; nothing here is
//! negotiable at runtime.
//!
//! | Concern | Construction |
//! |---------|--------------|
//! | Session key | 32 keyboard characters, fresh per request |
//! | Payload | AES-256-GCM, IV = first 12 key bytes, 16-byte tag appended |
//! | Key wrap | RSA-2048, OAEP-SHA256 / OAEP-SHA1 / PKCS#1 v1.5 (configured) |
//! | Signature | RSA-SHA256, PKCS#1 v1.5, over the plaintext JSON |
//!
//! ## Crate Policy
//!
//! - Key material is loaded once and never mutated; [`CryptoEngine`] holds it
//!   behind an `Arc` and exposes only pure operations.
//! - Private keys and session keys are never logged. Their `Debug` output is
//!   redacted.
//! - No mocking of cryptographic operations in tests.

pub mod engine;
pub mod error;
pub mod keys;
pub mod session_key;
pub mod signature;
pub mod symmetric;
pub mod wrap;

pub use engine::CryptoEngine;
pub use error::CryptoError;
pub use keys::KeyMaterial;
pub use session_key::SessionKey;
pub use symmetric::SealedPayload;
pub use wrap::{KeyWrapPolicy, KeyWrapScheme};

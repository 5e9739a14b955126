//! # Session Keys
//!
//! One symmetric key per outbound request, never reused, never persisted.
//!
//! ## Partner Constraint
//!
//! The gateway decrypts the wrapped key and uses its bytes as typed
//! characters. Keys must therefore be exactly 32 characters drawn from the
//! keyboard alphabet below. Random bytes, hex digests and KDF output all
//! break decryption on the partner side, so the generator picks characters
//! directly instead of deriving them.

use rand::rngs::OsRng;
use rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a session key in characters (and bytes).
pub const SESSION_KEY_LEN: usize = 32;

/// Characters a generated session key may contain.
pub const SESSION_KEY_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";

/// A symmetric session key.
///
/// Zeroized on drop. `Debug` is redacted and there is no `Display` or
/// `Serialize`: the only way out is [`SessionKey::as_bytes`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    /// Generate a fresh key: 32 characters chosen uniformly from
    /// [`SESSION_KEY_ALPHABET`] with the OS random source.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let bytes = (0..SESSION_KEY_LEN)
            .map(|_| SESSION_KEY_ALPHABET[rng.gen_range(0..SESSION_KEY_ALPHABET.len())])
            .collect();
        Self(bytes)
    }

    /// Wrap raw key bytes without validation.
    ///
    /// Used for keys received from the partner. Length problems surface as
    /// cipher errors when the key is used.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this key satisfies the partner's shape: 32 characters, all
    /// from the session key alphabet.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == SESSION_KEY_LEN && self.0.iter().all(|b| SESSION_KEY_ALPHABET.contains(b))
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey([REDACTED; {}])", self.0.len())
    }
}

//! # Payload Sealing
//!
//! AES-256-GCM with no padding. The IV is not random and not transmitted:
//! it is the first 12 bytes of the session key. The 16-byte tag is appended
//! to the ciphertext, so the wire value is `ciphertext || tag`.
//!
//! Invariant: a session key seals one request and its one response, never
//! anything else.

use aes_gcm::aead::{Aead, AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};

use crate::error::CryptoError;
use crate::session_key::{SessionKey, SESSION_KEY_LEN};

/// IV length in bytes.
pub const IV_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Ciphertext with the authentication tag appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    bytes: Vec<u8>,
}

impl SealedPayload {
    /// Wrap `ciphertext || tag` bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The encrypted payload without the tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[..self.bytes.len().saturating_sub(TAG_LEN)]
    }

    /// The trailing authentication tag.
    pub fn tag(&self) -> &[u8] {
        &self.bytes[self.bytes.len().saturating_sub(TAG_LEN)..]
    }

    /// Wire bytes: `ciphertext || tag`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// The IV used with `key`: its first 12 bytes.
pub fn derive_iv(key: &SessionKey) -> Result<[u8; IV_LEN], CryptoError> {
    let bytes = key.as_bytes();
    if bytes.len() < IV_LEN {
        return Err(CryptoError::Encryption(format!(
            "session key too short to derive IV: {} bytes",
            bytes.len()
        )));
    }
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&bytes[..IV_LEN]);
    Ok(iv)
}

fn cipher_for(key: &SessionKey) -> Result<Aes256Gcm, String> {
    let bytes = key.as_bytes();
    if bytes.len() != SESSION_KEY_LEN {
        return Err(format!(
            "session key must be {SESSION_KEY_LEN} bytes, got {}",
            bytes.len()
        ));
    }
    Aes256Gcm::new_from_slice(bytes).map_err(|e| e.to_string())
}

/// Encrypt `plaintext` under `key`.
///
/// # Errors
///
/// `CryptoError::Encryption` if the key is not exactly 32 bytes.
pub fn encrypt_payload(plaintext: &[u8], key: &SessionKey) -> Result<SealedPayload, CryptoError> {
    let cipher = cipher_for(key).map_err(CryptoError::Encryption)?;
    let iv = derive_iv(key)?;
    let bytes = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok(SealedPayload { bytes })
}

/// Decrypt `ciphertext || tag` under `key`.
///
/// # Errors
///
/// `CryptoError::Decryption` on a wrong key, a tampered ciphertext or tag,
/// or input shorter than the tag.
pub fn decrypt_payload(ciphertext_with_tag: &[u8], key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
    if ciphertext_with_tag.len() < TAG_LEN {
        return Err(CryptoError::Decryption(format!(
            "input of {} bytes is shorter than the {TAG_LEN}-byte tag",
            ciphertext_with_tag.len()
        )));
    }
    let cipher = cipher_for(key).map_err(CryptoError::Decryption)?;
    let iv = derive_iv(key).map_err(|e| CryptoError::Decryption(e.to_string()))?;

    let (ciphertext, tag) = ciphertext_with_tag.split_at(ciphertext_with_tag.len() - TAG_LEN);
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer, Tag::from_slice(tag))
        .map_err(|_| CryptoError::Decryption("authentication tag mismatch".into()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn known_key() -> SessionKey {
        SessionKey::from_bytes(b"ABCDEFGHIJKLmnopqrstuvwxyz012345".to_vec())
    }

    #[test]
    fn iv_is_first_twelve_key_bytes() {
        assert_eq!(&derive_iv(&known_key()).unwrap(), b"ABCDEFGHIJKL");
    }

    #[test]
    fn cipher_uses_the_key_prefix_as_iv() {
        let key = known_key();
        let sealed = encrypt_payload(b"{\"ping\":true}", &key).unwrap();

        // Independent decryption with an explicitly supplied IV.
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).unwrap();
        let opened = cipher
            .decrypt(Nonce::from_slice(b"ABCDEFGHIJKL"), sealed.as_bytes())
            .unwrap();
        assert_eq!(opened, b"{\"ping\":true}");

        let wrong_iv = cipher.decrypt(Nonce::from_slice(b"mnopqrstuvwx"), sealed.as_bytes());
        assert!(wrong_iv.is_err());
    }

    #[test]
    fn tag_is_appended() {
        let sealed = encrypt_payload(b"hello", &known_key()).unwrap();
        assert_eq!(sealed.as_bytes().len(), 5 + TAG_LEN);
        assert_eq!(sealed.ciphertext().len(), 5);
        assert_eq!(sealed.tag().len(), TAG_LEN);
    }

    #[test]
    fn wrong_length_key_is_an_encryption_error() {
        let short = SessionKey::from_bytes(vec![b'a'; 31]);
        assert!(matches!(
            encrypt_payload(b"x", &short),
            Err(CryptoError::Encryption(_))
        ));
        let long = SessionKey::from_bytes(vec![b'a'; 33]);
        assert!(matches!(
            encrypt_payload(b"x", &long),
            Err(CryptoError::Encryption(_))
        ));
    }

    #[test]
    fn tampering_is_detected() {
        let key = known_key();
        let mut bytes = encrypt_payload(b"pension record", &key).unwrap().into_bytes();
        bytes[0] ^= 0x01;
        assert!(matches!(
            decrypt_payload(&bytes, &key),
            Err(CryptoError::Decryption(_))
        ));

        let mut bytes = encrypt_payload(b"pension record", &key).unwrap().into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        assert!(decrypt_payload(&bytes, &key).is_err());
    }

    #[test]
    fn wrong_key_is_detected() {
        let sealed = encrypt_payload(b"pension record", &known_key()).unwrap();
        let other = SessionKey::generate();
        assert!(matches!(
            decrypt_payload(sealed.as_bytes(), &other),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(matches!(
            decrypt_payload(&[0u8; 15], &known_key()),
            Err(CryptoError::Decryption(_))
        ));
    }

    proptest! {
        #[test]
        fn decrypt_inverts_encrypt(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let key = SessionKey::generate();
            let sealed = encrypt_payload(&payload, &key).unwrap();
            prop_assert_eq!(decrypt_payload(sealed.as_bytes(), &key).unwrap(), payload);
        }
    }
}

//! # Payload Signatures
//!
//! RSA with SHA-256 and PKCS#1 v1.5 padding, computed over the plaintext
//! JSON before it is encrypted. Verifying against the ciphertext always
//! fails; callers must sign and verify the same stage.

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::CryptoError;

/// Sign `plaintext` with `private_key`.
pub fn sign(plaintext: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(plaintext)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(signature.to_vec())
}

/// Check `signature` over `plaintext` against `public_key`.
///
/// Returns `false` for any mismatch or malformed signature; never errors.
pub fn verify(plaintext: &[u8], signature: &[u8], public_key: &RsaPublicKey) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(plaintext, &signature)
        .is_ok()
}

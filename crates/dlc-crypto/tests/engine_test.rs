//! Two-party tests for `CryptoEngine`: our engine and a partner engine built
//! from the mirrored key material must interoperate in both directions.

use std::sync::OnceLock;

use dlc_crypto::{CryptoEngine, CryptoError, KeyMaterial, KeyWrapPolicy, KeyWrapScheme, SessionKey};
use rsa::RsaPrivateKey;

fn keys() -> &'static (RsaPrivateKey, RsaPrivateKey) {
    static KEYS: OnceLock<(RsaPrivateKey, RsaPrivateKey)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::rngs::OsRng;
        (
            RsaPrivateKey::new(&mut rng, 2048).unwrap(),
            RsaPrivateKey::new(&mut rng, 2048).unwrap(),
        )
    })
}

fn engines(policy: KeyWrapPolicy) -> (CryptoEngine, CryptoEngine) {
    let (ours, theirs) = keys();
    let integrator = KeyMaterial::new(theirs.to_public_key(), ours.clone(), ours.to_public_key()).unwrap();
    let partner = KeyMaterial::new(ours.to_public_key(), theirs.clone(), theirs.to_public_key()).unwrap();
    (
        CryptoEngine::new(integrator, policy),
        CryptoEngine::new(partner, policy),
    )
}

#[test]
fn partner_recovers_our_session_key_under_every_scheme() {
    for scheme in [
        KeyWrapScheme::OaepSha256,
        KeyWrapScheme::OaepSha1,
        KeyWrapScheme::Pkcs1v15,
    ] {
        let policy = KeyWrapPolicy {
            scheme,
            allow_legacy_fallback: false,
        };
        let (ours, partner) = engines(policy);
        let key = ours.generate_session_key();
        let wrapped = ours.wrap_session_key(&key).unwrap();
        assert_eq!(partner.unwrap_session_key(&wrapped).unwrap(), key, "{scheme}");
    }
}

#[test]
fn we_cannot_unwrap_what_we_wrapped_for_the_partner() {
    let (ours, _) = engines(KeyWrapPolicy::default());
    let wrapped = ours.wrap_session_key(&ours.generate_session_key()).unwrap();
    assert!(matches!(
        ours.unwrap_session_key(&wrapped),
        Err(CryptoError::KeyUnwrap(_))
    ));
}

#[test]
fn full_request_response_cycle() {
    let (ours, partner) = engines(KeyWrapPolicy::default());
    let request = br#"{"TXN_TYPE":"DLC","TXN_SUB_TYPE":"GET_BATCHID"}"#;

    // Outbound: sign plaintext, seal, wrap.
    let key = ours.generate_session_key();
    let signature = ours.sign(request).unwrap();
    let sealed = ours.encrypt_payload(request, &key).unwrap();
    let wrapped = ours.wrap_session_key(&key).unwrap();

    // Partner side.
    let their_key = partner.unwrap_session_key(&wrapped).unwrap();
    let opened = partner.decrypt_payload(sealed.as_bytes(), &their_key).unwrap();
    assert_eq!(opened, request);
    assert!(partner.verify(&opened, &signature));
    assert!(!partner.verify(sealed.as_bytes(), &signature), "signature covers plaintext only");

    // Reply under the same session key.
    let reply = br#"{"BATCH_ID":"7"}"#;
    let reply_signature = partner.sign(reply).unwrap();
    let reply_sealed = partner.encrypt_payload(reply, &their_key).unwrap();
    let reply_opened = ours.decrypt_payload(reply_sealed.as_bytes(), &key).unwrap();
    assert_eq!(reply_opened, reply);
    assert!(ours.verify(&reply_opened, &reply_signature));
}

#[test]
fn our_own_signature_is_not_a_partner_signature() {
    let (ours, _) = engines(KeyWrapPolicy::default());
    let signature = ours.sign(b"{}").unwrap();
    assert!(!ours.verify(b"{}", &signature));
}

#[test]
fn self_check_passes_for_consistent_keys() {
    let (ours, partner) = engines(KeyWrapPolicy::default());
    ours.self_check().unwrap();
    partner.self_check().unwrap();
}

#[test]
fn foreign_session_key_lengths_fail_cleanly() {
    let (ours, _) = engines(KeyWrapPolicy::default());
    let short = SessionKey::from_bytes(b"too-short".to_vec());
    assert!(matches!(
        ours.encrypt_payload(b"{}", &short),
        Err(CryptoError::Encryption(_))
    ));
}

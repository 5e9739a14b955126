//! Shared fixtures: mirrored key pairs and a synthetic partner gateway that
//! really decrypts requests and really seals responses.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dlc_crypto::{CryptoEngine, KeyMaterial, KeyWrapPolicy, SessionKey};
use dlc_gateway_client::{
    Envelope, EnvelopeCodec, GatewayConfig, RetryPolicy, TransactionWorkflow, ACCESS_TOKEN_HEADER,
};
use parking_lot::Mutex;
use rsa::RsaPrivateKey;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

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

/// Our engine.
pub fn integrator_engine() -> CryptoEngine {
    let (ours, theirs) = keys();
    let material =
        KeyMaterial::new(theirs.to_public_key(), ours.clone(), ours.to_public_key()).unwrap();
    CryptoEngine::new(material, KeyWrapPolicy::default())
}

/// The partner's codec, keys mirrored.
pub fn partner_codec() -> EnvelopeCodec {
    let (ours, theirs) = keys();
    let material =
        KeyMaterial::new(ours.to_public_key(), theirs.clone(), theirs.to_public_key()).unwrap();
    EnvelopeCodec::new(
        CryptoEngine::new(material, KeyWrapPolicy::default()),
        "EIS",
        "DLC",
        "EI",
    )
    .unwrap()
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        exponential: true,
    }
}

pub fn workflow_for(server: &MockServer) -> TransactionWorkflow {
    let config = GatewayConfig::for_endpoint(format!("{}/dlc", server.uri()).parse().unwrap());
    TransactionWorkflow::with_engine(&config, integrator_engine()).unwrap()
}

/// What the synthetic partner sends back for one decrypted request.
pub enum PartnerReply {
    /// Signed and encrypted under the request's session key.
    Sealed(Value),
    /// Sealed, but with a corrupted signature.
    BadSignature(Value),
    /// Unencrypted JSON with the given status.
    Plain(u16, Value),
}

/// wiremock responder playing the partner gateway.
pub struct SyntheticGateway<F> {
    codec: EnvelopeCodec,
    handler: F,
    calls: Arc<AtomicU32>,
    session_keys: Arc<Mutex<Vec<SessionKey>>>,
}

impl<F> SyntheticGateway<F>
where
    F: Fn(&Value) -> PartnerReply + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            codec: partner_codec(),
            handler,
            calls: Arc::new(AtomicU32::new(0)),
            session_keys: Arc::default(),
        }
    }

    /// Counter of requests that reached the handler.
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    /// Session keys recovered from each opened request, in arrival order.
    pub fn session_keys(&self) -> Arc<Mutex<Vec<SessionKey>>> {
        self.session_keys.clone()
    }

    /// Mount on `/dlc` as a catch-all POST handler.
    pub async fn mount(self, server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/dlc"))
            .respond_with(self)
            .mount(server)
            .await;
    }
}

impl<F> Respond for SyntheticGateway<F>
where
    F: Fn(&Value) -> PartnerReply + Send + Sync + 'static,
{
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(envelope) = serde_json::from_slice::<Envelope>(&request.body) else {
            return ResponseTemplate::new(400).set_body_string("bad envelope");
        };
        let Some(token) = request
            .headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return ResponseTemplate::new(401).set_body_string("missing AccessToken");
        };
        let (body, key) = match self.codec.open_request(&envelope, token) {
            Ok(opened) => opened,
            Err(e) => return ResponseTemplate::new(400).set_body_string(e.to_string()),
        };
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.session_keys.lock().push(key.clone());

        let reference = Some(envelope.reference.as_str());
        match (self.handler)(&body) {
            PartnerReply::Sealed(reply) => {
                let sealed = self.codec.seal_response(&reply, &key, reference).unwrap();
                ResponseTemplate::new(200).set_body_json(sealed)
            }
            PartnerReply::BadSignature(reply) => {
                let mut sealed = self.codec.seal_response(&reply, &key, reference).unwrap();
                let mut signature = BASE64.decode(&sealed.signature).unwrap();
                signature[0] ^= 0xff;
                sealed.signature = BASE64.encode(signature);
                ResponseTemplate::new(200).set_body_json(sealed)
            }
            PartnerReply::Plain(status, reply) => ResponseTemplate::new(status).set_body_json(reply),
        }
    }
}

/// `TXN_SUB_TYPE` of a decrypted request.
pub fn sub_type(request: &Value) -> &str {
    request["TXN_SUB_TYPE"].as_str().unwrap_or_default()
}

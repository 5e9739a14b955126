//! # Envelope Codec
//!
//! Turns a [`PlainRequest`] into the wire [`Envelope`] and back.
//!
//! ## Outbound
//!
//! 1. Serialize the plain request to compact JSON.
//! 2. Sign those exact bytes (RSA-SHA256).
//! 3. Generate a fresh session key and seal the same bytes (AES-256-GCM).
//! 4. Wrap the session key for the partner; base64 it into the `AccessToken`
//!    header value.
//!
//! The session key is returned with the envelope and must be kept until the
//! response has been parsed. It is never sent again.
//!
//! ## Inbound
//!
//! A response is either an encrypted envelope (`RESPONSE` + `DIGI_SIGN`) or
//! a plain JSON object. The partner's test environment returns the plain
//! shape when a request fails before reaching its encryption stage.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::FixedOffset;
use dlc_core::{BatchId, RegionCode, SyncDate, ValidationError};
use dlc_crypto::{CryptoEngine, SessionKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::default_utc_offset;
use crate::error::GatewayError;
use crate::reference::ReferenceNumber;

/// `TXN_TYPE` for every request this client sends.
pub const TXN_TYPE_DLC: &str = "DLC";

const FIELD_REQUEST: &str = "REQUEST";
const FIELD_RESPONSE: &str = "RESPONSE";
const FIELD_SIGNATURE: &str = "DIGI_SIGN";
const FIELD_REFERENCE: &str = "REQUEST_REFERENCE_NUMBER";

/// Transaction subtype of the two-phase protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnSubType {
    #[serde(rename = "GET_BATCHID")]
    GetBatchId,
    #[serde(rename = "FETCH_RECORDS")]
    FetchRecords,
}

impl std::fmt::Display for TxnSubType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::GetBatchId => "GET_BATCHID",
            Self::FetchRecords => "FETCH_RECORDS",
        })
    }
}

/// The `EIS_PAYLOAD` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EisPayload {
    #[serde(rename = "REQ_REF_NO")]
    pub request_reference: ReferenceNumber,
    #[serde(rename = "REQUEST_TYPE")]
    pub request_type: TxnSubType,
    #[serde(rename = "STATE_CODE")]
    pub region: RegionCode,
    #[serde(rename = "DATE")]
    pub date: SyncDate,
    #[serde(rename = "BATCH_ID", default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
}

/// A request before signing and encryption. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainRequest {
    #[serde(rename = "SOURCE_ID")]
    pub source_id: String,
    #[serde(rename = "EIS_PAYLOAD")]
    pub payload: EisPayload,
    #[serde(rename = "REQUEST_REFERENCE_NUMBER")]
    pub reference: ReferenceNumber,
    #[serde(rename = "DESTINATION")]
    pub destination: String,
    #[serde(rename = "TXN_TYPE")]
    pub txn_type: String,
    #[serde(rename = "TXN_SUB_TYPE")]
    pub txn_sub_type: TxnSubType,
}

impl PlainRequest {
    /// Check required fields and internal consistency.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_id.trim().is_empty() {
            return Err(ValidationError::MissingField("source_id"));
        }
        if self.destination.trim().is_empty() {
            return Err(ValidationError::MissingField("destination"));
        }
        if self.txn_type.trim().is_empty() {
            return Err(ValidationError::MissingField("txn_type"));
        }
        if self.payload.request_type != self.txn_sub_type {
            return Err(ValidationError::Invalid {
                field: "REQUEST_TYPE",
                reason: format!(
                    "{} does not match TXN_SUB_TYPE {}",
                    self.payload.request_type, self.txn_sub_type
                ),
            });
        }
        if self.payload.request_reference != self.reference {
            return Err(ValidationError::Invalid {
                field: "REQ_REF_NO",
                reason: "does not match REQUEST_REFERENCE_NUMBER".into(),
            });
        }
        if self.txn_sub_type == TxnSubType::FetchRecords && self.payload.batch_id.is_none() {
            return Err(ValidationError::MissingField("batch_id"));
        }
        Ok(())
    }
}

/// The outbound wire body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "REQUEST_REFERENCE_NUMBER")]
    pub reference: String,
    /// Base64 `ciphertext || tag`.
    #[serde(rename = "REQUEST")]
    pub request: String,
    /// Base64 signature over the plaintext.
    #[serde(rename = "DIGI_SIGN")]
    pub signature: String,
}

/// The inbound encrypted wire body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "RESPONSE")]
    pub response: String,
    #[serde(rename = "DIGI_SIGN")]
    pub signature: String,
    #[serde(
        rename = "REQUEST_REFERENCE_NUMBER",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<String>,
}

/// An envelope ready to send, plus what is needed to read its response.
#[derive(Debug)]
pub struct SealedRequest {
    pub envelope: Envelope,
    /// Base64 wrapped session key for the `AccessToken` header.
    pub access_token: String,
    pub session_key: SessionKey,
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainResponse {
    pub body: Value,
    /// Whether the body arrived encrypted and signed.
    pub encrypted: bool,
}

/// Builds and parses gateway envelopes for one configured source.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    crypto: CryptoEngine,
    source_id: String,
    destination: String,
    reference_source: String,
    reference_offset: FixedOffset,
}

impl EnvelopeCodec {
    pub fn new(
        crypto: CryptoEngine,
        source_id: impl Into<String>,
        destination: impl Into<String>,
        reference_source: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let codec = Self {
            crypto,
            source_id: source_id.into(),
            destination: destination.into(),
            reference_source: reference_source.into(),
            reference_offset: default_utc_offset(),
        };
        if codec.source_id.trim().is_empty() {
            return Err(ValidationError::MissingField("source_id"));
        }
        if codec.destination.trim().is_empty() {
            return Err(ValidationError::MissingField("destination"));
        }
        // Fails fast on a bad source code instead of on the first request.
        ReferenceNumber::generate(&codec.reference_source, codec.reference_offset)?;
        Ok(codec)
    }

    /// Stamp reference numbers with the wall clock at `offset`.
    pub fn with_reference_offset(mut self, offset: FixedOffset) -> Self {
        self.reference_offset = offset;
        self
    }

    pub fn crypto(&self) -> &CryptoEngine {
        &self.crypto
    }

    /// Build a plain request with a fresh reference number.
    pub fn plain_request(
        &self,
        sub_type: TxnSubType,
        region: &RegionCode,
        date: SyncDate,
        batch_id: Option<&BatchId>,
    ) -> Result<PlainRequest, GatewayError> {
        let reference = ReferenceNumber::generate(&self.reference_source, self.reference_offset)?;
        let request = PlainRequest {
            source_id: self.source_id.clone(),
            payload: EisPayload {
                request_reference: reference.clone(),
                request_type: sub_type,
                region: region.clone(),
                date,
                batch_id: batch_id.cloned(),
            },
            reference,
            destination: self.destination.clone(),
            txn_type: TXN_TYPE_DLC.to_string(),
            txn_sub_type: sub_type,
        };
        request.validate()?;
        Ok(request)
    }

    /// Sign, seal, and wrap a plain request.
    pub fn build_envelope(&self, request: &PlainRequest) -> Result<SealedRequest, GatewayError> {
        request.validate()?;
        let plaintext = serde_json::to_vec(request)?;

        let signature = self.crypto.sign(&plaintext)?;
        let session_key = self.crypto.generate_session_key();
        let sealed = self.crypto.encrypt_payload(&plaintext, &session_key)?;
        let wrapped = self.crypto.wrap_session_key(&session_key)?;

        tracing::debug!(
            reference = %request.reference,
            sub_type = %request.txn_sub_type,
            plaintext_bytes = plaintext.len(),
            "envelope built"
        );

        Ok(SealedRequest {
            envelope: Envelope {
                reference: request.reference.to_string(),
                request: BASE64.encode(sealed.as_bytes()),
                signature: BASE64.encode(signature),
            },
            access_token: BASE64.encode(wrapped),
            session_key,
        })
    }

    /// Decode a response body with the session key its request was sealed under.
    ///
    /// # Errors
    ///
    /// - `MalformedResponse` if the body is not an object or a field is not base64.
    /// - `Crypto` if decryption fails.
    /// - `SignatureInvalid` if the signature does not verify against the partner key.
    pub fn parse_response(
        &self,
        raw: &Value,
        session_key: &SessionKey,
    ) -> Result<PlainResponse, GatewayError> {
        let Some(object) = raw.as_object() else {
            return Err(GatewayError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_type(raw)
            )));
        };

        let ciphertext = [FIELD_RESPONSE, FIELD_REQUEST]
            .iter()
            .find_map(|field| object.get(*field).and_then(Value::as_str));
        let Some(ciphertext) = ciphertext else {
            return Ok(PlainResponse {
                body: raw.clone(),
                encrypted: false,
            });
        };

        let reference = object
            .get(FIELD_REFERENCE)
            .and_then(Value::as_str)
            .unwrap_or("<none>");
        let signature = object
            .get(FIELD_SIGNATURE)
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::SignatureInvalid {
                reference: reference.to_string(),
            })?;

        let body = self.open(ciphertext, signature, reference, session_key)?;
        Ok(PlainResponse {
            body,
            encrypted: true,
        })
    }

    /// Receiving side: recover the request body and its session key.
    pub fn open_request(
        &self,
        envelope: &Envelope,
        access_token: &str,
    ) -> Result<(Value, SessionKey), GatewayError> {
        let wrapped = decode_field("AccessToken", access_token)?;
        let session_key = self.crypto.unwrap_session_key(&wrapped)?;
        let body = self.open(
            &envelope.request,
            &envelope.signature,
            &envelope.reference,
            &session_key,
        )?;

        let inner = body.get(FIELD_REFERENCE).and_then(Value::as_str);
        if inner.is_some_and(|inner| inner != envelope.reference) {
            return Err(ValidationError::Invalid {
                field: "REQUEST_REFERENCE_NUMBER",
                reason: "envelope and payload references differ".into(),
            }
            .into());
        }
        Ok((body, session_key))
    }

    /// Receiving side: sign and seal a response under the request's session key.
    pub fn seal_response(
        &self,
        body: &Value,
        session_key: &SessionKey,
        reference: Option<&str>,
    ) -> Result<ResponseEnvelope, GatewayError> {
        let plaintext = serde_json::to_vec(body)?;
        let signature = self.crypto.sign(&plaintext)?;
        let sealed = self.crypto.encrypt_payload(&plaintext, session_key)?;
        Ok(ResponseEnvelope {
            response: BASE64.encode(sealed.as_bytes()),
            signature: BASE64.encode(signature),
            reference: reference.map(str::to_string),
        })
    }

    fn open(
        &self,
        ciphertext: &str,
        signature: &str,
        reference: &str,
        session_key: &SessionKey,
    ) -> Result<Value, GatewayError> {
        let sealed = decode_field(FIELD_RESPONSE, ciphertext)?;
        let signature = decode_field(FIELD_SIGNATURE, signature)?;

        let plaintext = self.crypto.decrypt_payload(&sealed, session_key)?;
        if !self.crypto.verify(&plaintext, &signature) {
            tracing::warn!(reference, "response signature did not verify");
            return Err(GatewayError::SignatureInvalid {
                reference: reference.to_string(),
            });
        }
        serde_json::from_slice(&plaintext).map_err(|e| {
            GatewayError::MalformedResponse(format!("decrypted body is not JSON: {e}"))
        })
    }
}

fn decode_field(field: &str, encoded: &str) -> Result<Vec<u8>, GatewayError> {
    BASE64
        .decode(encoded.trim())
        .map_err(|e| GatewayError::MalformedResponse(format!("{field} is not base64: {e}")))
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

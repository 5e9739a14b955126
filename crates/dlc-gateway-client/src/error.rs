//! Error types for the gateway client.

use dlc_core::{ErrorKind, ValidationError};
use dlc_crypto::CryptoError;

use crate::config::ConfigError;
use crate::workflow::WorkflowState;

/// Longest response body excerpt carried in an error.
const BODY_EXCERPT_LEN: usize = 512;

/// Errors from gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A request field failed validation before anything was sent.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Encryption, decryption, or key wrapping failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The response signature did not verify against the partner key.
    #[error("response signature invalid for request {reference}")]
    SignatureInvalid { reference: String },

    /// HTTP request failed at the network level, including timeouts.
    #[error("HTTP request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The gateway answered with a server error.
    #[error("gateway {endpoint} returned {status}: {body}")]
    Gateway {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The gateway refused the request with a client error and no
    /// application error body.
    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The response carried an application-level error code.
    #[error("application error {code}: {description}")]
    Application { code: String, description: String },

    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No batch-id extraction strategy matched the response.
    #[error("batch id not found in response (tried: {tried})")]
    BatchIdNotFound { tried: String },

    /// The record payload exceeded the configured ceiling.
    #[error("record payload of {size} bytes exceeds the {limit}-byte ceiling")]
    PayloadTooLarge { size: usize, limit: usize },

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The workflow attempted an illegal state transition.
    #[error("illegal workflow transition {from} -> {to}")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
}

impl GatewayError {
    /// Map onto the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Crypto(_) | Self::SignatureInvalid { .. } => ErrorKind::CryptoFailure,
            Self::Network { .. } | Self::Gateway { .. } => ErrorKind::NetworkOrGateway,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::Rejected { .. }
            | Self::Application { .. }
            | Self::MalformedResponse(_)
            | Self::BatchIdNotFound { .. }
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::InvalidTransition { .. } => ErrorKind::Technical,
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Message recorded in run reports.
    ///
    /// Partner-supplied failures keep their text. Internal technical errors
    /// collapse to a fixed message; the detail goes to the log only.
    pub fn report_message(&self) -> String {
        match self {
            Self::Rejected { .. }
            | Self::Application { .. }
            | Self::MalformedResponse(_)
            | Self::BatchIdNotFound { .. } => self.to_string(),
            _ if self.kind() == ErrorKind::Technical => "internal technical error".to_string(),
            _ => self.to_string(),
        }
    }

    pub(crate) fn gateway(endpoint: &str, status: u16, body: &str) -> Self {
        Self::Gateway {
            endpoint: endpoint.to_string(),
            status,
            body: excerpt(body),
        }
    }

    pub(crate) fn rejected(status: u16, body: &str) -> Self {
        Self::Rejected {
            status,
            body: excerpt(body),
        }
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LEN {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_reported_generically() {
        let err = GatewayError::InvalidTransition {
            from: WorkflowState::Idle,
            to: WorkflowState::Complete,
        };
        assert_eq!(err.report_message(), "internal technical error");

        let err = GatewayError::Application {
            code: "E101".into(),
            description: "Invalid state code".into(),
        };
        assert!(err.report_message().contains("E101"));

        let err = GatewayError::PayloadTooLarge { size: 10, limit: 5 };
        assert_eq!(err.report_message(), err.to_string());
    }

    #[test]
    fn only_crypto_and_gateway_failures_retry() {
        let retryable = [
            GatewayError::Crypto(CryptoError::Decryption("tag".into())),
            GatewayError::SignatureInvalid {
                reference: "SBIDL26292134501123000000".into(),
            },
            GatewayError::gateway("http://gw", 503, "busy"),
        ];
        for err in &retryable {
            assert!(err.is_retryable(), "{err}");
        }

        let terminal = [
            GatewayError::Validation(ValidationError::MissingField("region")),
            GatewayError::rejected(400, "bad"),
            GatewayError::Application {
                code: "E101".into(),
                description: "invalid state".into(),
            },
            GatewayError::MalformedResponse("not json".into()),
            GatewayError::BatchIdNotFound {
                tried: "top_level".into(),
            },
            GatewayError::PayloadTooLarge { size: 5, limit: 4 },
        ];
        for err in &terminal {
            assert!(!err.is_retryable(), "{err}");
        }
    }

    #[test]
    fn payload_too_large_has_its_own_kind() {
        let err = GatewayError::PayloadTooLarge {
            size: 5 * 1024 * 1024,
            limit: 4 * 1024 * 1024,
        };
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
        assert!(err.to_string().contains("5242880"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "é".repeat(600);
        let err = GatewayError::gateway("http://gw", 502, &body);
        let GatewayError::Gateway { body, .. } = err else {
            unreachable!()
        };
        assert!(body.len() <= BODY_EXCERPT_LEN + 3);
        assert!(body.ends_with("..."));
    }
}

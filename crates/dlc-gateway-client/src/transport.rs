//! One HTTP call to the partner gateway.
//!
//! The transport knows nothing about encryption. It posts an [`Envelope`]
//! with the wrapped session key in the `AccessToken` header and classifies
//! what comes back:
//!
//! - no response → [`GatewayError::Network`]
//! - HTTP 5xx → [`GatewayError::Gateway`]
//! - non-JSON body → [`GatewayError::MalformedResponse`] (or `Rejected` on 4xx)
//! - anything else → [`RawResponse`], even when it carries an application error

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use crate::config::GatewayConfig;
use crate::envelope::Envelope;
use crate::error::GatewayError;

/// Header carrying the base64 wrapped session key.
pub const ACCESS_TOKEN_HEADER: &str = "AccessToken";

/// A parsed response body and its HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

/// HTTP transport bound to a single gateway endpoint.
#[derive(Debug, Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl TransportClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if config.tls_verification_relaxed() {
            tracing::warn!(
                endpoint = %config.endpoint,
                "TLS certificate verification disabled for UAT endpoint"
            );
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.tls_verification_relaxed())
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Network {
                endpoint: config.endpoint.to_string(),
                source: e,
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post an envelope. Exactly one HTTP request; retries live above this layer.
    pub async fn send(
        &self,
        envelope: &Envelope,
        access_token: &str,
    ) -> Result<RawResponse, GatewayError> {
        let endpoint = self.endpoint.as_str();
        let resp = self
            .http
            .post(self.endpoint.clone())
            .header(ACCESS_TOKEN_HEADER, access_token)
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::warn!(endpoint, reference = %envelope.reference, "gateway request timed out");
                }
                GatewayError::Network {
                    endpoint: endpoint.to_string(),
                    source: e,
                }
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| GatewayError::Network {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

        tracing::debug!(
            endpoint,
            reference = %envelope.reference,
            status = status.as_u16(),
            bytes = text.len(),
            "gateway responded"
        );

        if status.is_server_error() {
            return Err(GatewayError::gateway(endpoint, status.as_u16(), &text));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(RawResponse {
                status: status.as_u16(),
                body,
            }),
            Err(_) if status.is_client_error() => {
                Err(GatewayError::rejected(status.as_u16(), &text))
            }
            Err(e) => Err(GatewayError::MalformedResponse(format!(
                "HTTP {status} body is not JSON: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlc_core::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope() -> Envelope {
        Envelope {
            reference: "SBIDL26292134501123000000".into(),
            request: "Y2lwaGVy".into(),
            signature: "c2ln".into(),
        }
    }

    async fn client_for(server: &MockServer) -> TransportClient {
        let url = format!("{}/dlc", server.uri()).parse().unwrap();
        TransportClient::new(&GatewayConfig::for_endpoint(url)).unwrap()
    }

    #[tokio::test]
    async fn posts_envelope_with_access_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dlc"))
            .and(header("AccessToken", "d3JhcHBlZA=="))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "REQUEST_REFERENCE_NUMBER": "SBIDL26292134501123000000",
                "REQUEST": "Y2lwaGVy",
                "DIGI_SIGN": "c2ln"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"RESPONSE": "x"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let raw = client.send(&envelope(), "d3JhcHBlZA==").await.unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, json!({"RESPONSE": "x"}));
    }

    #[tokio::test]
    async fn server_error_maps_to_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .send(&envelope(), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Gateway { status: 503, .. }));
        assert_eq!(err.kind(), ErrorKind::NetworkOrGateway);
    }

    #[tokio::test]
    async fn client_error_with_json_is_returned_for_inspection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"ERROR_CODE": "E101", "ERROR_DESC": "bad state"})),
            )
            .mount(&server)
            .await;

        let raw = client_for(&server)
            .await
            .send(&envelope(), "t")
            .await
            .unwrap();
        assert_eq!(raw.status, 400);
        assert_eq!(raw.body["ERROR_CODE"], "E101");
    }

    #[tokio::test]
    async fn client_error_without_json_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .send(&envelope(), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { status: 403, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn non_json_success_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .send(&envelope(), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let mut config = GatewayConfig::for_endpoint("http://127.0.0.1:1/dlc".parse().unwrap());
        config.timeout_secs = 1;
        let err = TransportClient::new(&config)
            .unwrap()
            .send(&envelope(), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Network { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_gateway_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config =
            GatewayConfig::for_endpoint(format!("{}/dlc", server.uri()).parse().unwrap());
        config.timeout_secs = 1;
        let err = TransportClient::new(&config)
            .unwrap()
            .send(&envelope(), "t")
            .await
            .unwrap_err();
        let GatewayError::Network { source, .. } = err else {
            panic!("expected network error, got {err:?}");
        };
        assert!(source.is_timeout());
    }
}

//! Gateway client configuration.
//!
//! Loaded from environment variables once at startup. Key *paths* live
//! here; the key material itself is loaded by [`dlc_crypto::KeyMaterial`]
//! and never appears in this struct.

use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};
use dlc_crypto::{KeyWrapPolicy, KeyWrapScheme};
use url::Url;

/// Partner's record payload ceiling: 4 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default UTC offset in minutes (+05:30).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Which partner environment the endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEnvironment {
    /// Partner test environment. TLS verification may be relaxed.
    Uat,
    /// Live gateway. TLS verification is always on.
    Production,
}

impl std::str::FromStr for GatewayEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uat" | "test" | "sandbox" => Ok(Self::Uat),
            "production" | "prod" | "live" => Ok(Self::Production),
            other => Err(format!("expected uat or production, got {other:?}")),
        }
    }
}

/// Configuration for the partner gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Full URL of the gateway endpoint.
    pub endpoint: Url,
    /// `SOURCE_ID` sent in every request.
    pub source_id: String,
    /// `DESTINATION` sent in every request.
    pub destination: String,
    /// Two-character source code embedded in reference numbers.
    pub reference_source: String,
    pub environment: GatewayEnvironment,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Skip TLS certificate verification. Ignored in production.
    pub accept_invalid_certs: bool,
    /// Partner certificate or public key.
    pub partner_cert_path: PathBuf,
    /// Our private key.
    pub private_key_path: PathBuf,
    /// Our certificate or public key.
    pub public_cert_path: PathBuf,
    pub key_wrap: KeyWrapPolicy,
    /// Ceiling on the serialized record payload.
    pub max_payload_bytes: usize,
    /// Wall-clock offset stamped into request reference numbers.
    pub utc_offset: FixedOffset,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DLC_GATEWAY_URL` (required)
    /// - `DLC_SOURCE_ID` (default: `DLC`)
    /// - `DLC_DESTINATION` (default: `EIS`)
    /// - `DLC_REFERENCE_SOURCE` (default: `DL`)
    /// - `DLC_ENVIRONMENT` (default: `uat`)
    /// - `DLC_TIMEOUT_SECS` (default: 30)
    /// - `DLC_ACCEPT_INVALID_CERTS` (default: false)
    /// - `DLC_PARTNER_CERT_PATH`, `DLC_PRIVATE_KEY_PATH`, `DLC_PUBLIC_CERT_PATH` (required)
    /// - `DLC_KEY_WRAP` (default: `oaep-sha256`)
    /// - `DLC_KEY_WRAP_FALLBACK` (default: true)
    /// - `DLC_MAX_PAYLOAD_BYTES` (default: 4194304)
    /// - `DLC_UTC_OFFSET_MINUTES` (default: 330)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = required("DLC_GATEWAY_URL")?;
        let endpoint = Url::parse(&raw_url)
            .map_err(|e| ConfigError::invalid("DLC_GATEWAY_URL", e.to_string()))?;

        let environment = match std::env::var("DLC_ENVIRONMENT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("DLC_ENVIRONMENT", e))?,
            Err(_) => GatewayEnvironment::Uat,
        };

        let scheme = match std::env::var("DLC_KEY_WRAP") {
            Ok(raw) => raw
                .parse::<KeyWrapScheme>()
                .map_err(|e| ConfigError::invalid("DLC_KEY_WRAP", e))?,
            Err(_) => KeyWrapScheme::OaepSha256,
        };

        Ok(Self {
            endpoint,
            source_id: optional("DLC_SOURCE_ID", "DLC"),
            destination: optional("DLC_DESTINATION", "EIS"),
            reference_source: optional("DLC_REFERENCE_SOURCE", "DL"),
            environment,
            timeout_secs: env_parsed("DLC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            accept_invalid_certs: env_flag("DLC_ACCEPT_INVALID_CERTS", false)?,
            partner_cert_path: required("DLC_PARTNER_CERT_PATH")?.into(),
            private_key_path: required("DLC_PRIVATE_KEY_PATH")?.into(),
            public_cert_path: required("DLC_PUBLIC_CERT_PATH")?.into(),
            key_wrap: KeyWrapPolicy {
                scheme,
                allow_legacy_fallback: env_flag("DLC_KEY_WRAP_FALLBACK", true)?,
            },
            max_payload_bytes: env_parsed("DLC_MAX_PAYLOAD_BYTES", DEFAULT_MAX_PAYLOAD_BYTES)?,
            utc_offset: env_utc_offset("DLC_UTC_OFFSET_MINUTES")?,
        })
    }

    /// Configuration for a given endpoint with every other field defaulted.
    ///
    /// Key paths are left empty; pair with
    /// [`TransactionWorkflow::with_engine`](crate::TransactionWorkflow::with_engine).
    pub fn for_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint,
            source_id: "DLC".into(),
            destination: "EIS".into(),
            reference_source: "DL".into(),
            environment: GatewayEnvironment::Uat,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            accept_invalid_certs: false,
            partner_cert_path: PathBuf::new(),
            private_key_path: PathBuf::new(),
            public_cert_path: PathBuf::new(),
            key_wrap: KeyWrapPolicy::default(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            utc_offset: default_utc_offset(),
        }
    }

    /// Whether TLS verification is actually relaxed for this endpoint.
    pub fn tls_verification_relaxed(&self) -> bool {
        self.accept_invalid_certs && self.environment != GatewayEnvironment::Production
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(var)),
    }
}

fn optional(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse `var`, falling back to `default` when unset or blank.
pub fn env_parsed<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(var, e.to_string())),
        _ => Ok(default),
    }
}

/// Read a boolean flag. Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn env_flag(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            "" => Ok(default),
            other => Err(ConfigError::invalid(var, format!("expected a boolean, got {other:?}"))),
        },
        Err(_) => Ok(default),
    }
}

/// Read a UTC offset in minutes east, defaulting to
/// [`DEFAULT_UTC_OFFSET_MINUTES`].
pub fn env_utc_offset(var: &'static str) -> Result<FixedOffset, ConfigError> {
    utc_offset_from_minutes(var, env_parsed(var, DEFAULT_UTC_OFFSET_MINUTES)?)
}

/// `minutes` east of UTC; anything past ±24h is rejected.
pub fn utc_offset_from_minutes(var: &'static str, minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::invalid(var, format!("{minutes} minutes is out of range")))
}

pub fn default_utc_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            var,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_endpoint_uses_defaults() {
        let cfg = GatewayConfig::for_endpoint("http://127.0.0.1:9000/dlc".parse().unwrap());
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_payload_bytes, 4 * 1024 * 1024);
        assert_eq!(cfg.key_wrap.scheme, KeyWrapScheme::OaepSha256);
        assert!(cfg.key_wrap.allow_legacy_fallback);
        assert_eq!(cfg.reference_source, "DL");
        assert_eq!(cfg.utc_offset.local_minus_utc(), 330 * 60);
    }

    #[test]
    fn utc_offset_out_of_range_is_a_config_error() {
        for minutes in [100_000_000, i32::MIN, 24 * 60, -24 * 60] {
            assert!(matches!(
                utc_offset_from_minutes("DLC_UTC_OFFSET_MINUTES", minutes),
                Err(ConfigError::InvalidValue { var: "DLC_UTC_OFFSET_MINUTES", .. })
            ));
        }
        let ist = utc_offset_from_minutes("DLC_UTC_OFFSET_MINUTES", 330).unwrap();
        assert_eq!(ist.local_minus_utc(), 330 * 60);
        let west = utc_offset_from_minutes("DLC_UTC_OFFSET_MINUTES", -300).unwrap();
        assert_eq!(west.local_minus_utc(), -300 * 60);
    }

    #[test]
    fn utc_offset_reads_its_variable() {
        std::env::set_var("TEST_DLC_OFFSET_WEST", "-300");
        std::env::set_var("TEST_DLC_OFFSET_HUGE", "100000000");
        let west = env_utc_offset("TEST_DLC_OFFSET_WEST");
        let huge = env_utc_offset("TEST_DLC_OFFSET_HUGE");
        std::env::remove_var("TEST_DLC_OFFSET_WEST");
        std::env::remove_var("TEST_DLC_OFFSET_HUGE");
        assert_eq!(west.unwrap().local_minus_utc(), -300 * 60);
        assert!(matches!(huge, Err(ConfigError::InvalidValue { var: "TEST_DLC_OFFSET_HUGE", .. })));
        assert_eq!(
            env_utc_offset("TEST_DLC_OFFSET_ABSENT").unwrap(),
            default_utc_offset()
        );
    }

    #[test]
    fn tls_relaxation_never_applies_to_production() {
        let mut cfg = GatewayConfig::for_endpoint("https://gateway.test/".parse().unwrap());
        cfg.accept_invalid_certs = true;
        assert!(cfg.tls_verification_relaxed());
        cfg.environment = GatewayEnvironment::Production;
        assert!(!cfg.tls_verification_relaxed());
    }

    #[test]
    fn environment_names_parse() {
        assert_eq!("UAT".parse::<GatewayEnvironment>(), Ok(GatewayEnvironment::Uat));
        assert_eq!("prod".parse::<GatewayEnvironment>(), Ok(GatewayEnvironment::Production));
        assert!("staging-2".parse::<GatewayEnvironment>().is_err());
    }

    #[test]
    fn env_parsed_uses_default_when_var_absent() {
        let value: u64 = env_parsed("NONEXISTENT_DLC_VAR_31337", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn env_parsed_rejects_garbage() {
        std::env::set_var("TEST_DLC_BAD_TIMEOUT", "soon");
        let result: Result<u64, _> = env_parsed("TEST_DLC_BAD_TIMEOUT", 30);
        std::env::remove_var("TEST_DLC_BAD_TIMEOUT");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn env_flag_accepts_common_spellings() {
        std::env::set_var("TEST_DLC_FLAG_ON", "Yes");
        std::env::set_var("TEST_DLC_FLAG_BAD", "maybe");
        assert!(env_flag("TEST_DLC_FLAG_ON", false).unwrap());
        assert!(env_flag("TEST_DLC_FLAG_BAD", false).is_err());
        assert!(!env_flag("TEST_DLC_FLAG_ABSENT", false).unwrap());
        std::env::remove_var("TEST_DLC_FLAG_ON");
        std::env::remove_var("TEST_DLC_FLAG_BAD");
    }

    #[test]
    fn from_env_requires_gateway_url() {
        // Only meaningful when the variable is not set in the test environment.
        if std::env::var("DLC_GATEWAY_URL").is_err() {
            assert!(matches!(
                GatewayConfig::from_env(),
                Err(ConfigError::MissingVar("DLC_GATEWAY_URL"))
            ));
        }
    }
}

//! # Key Check Subcommand
//!
//! Loads the three key files named by the gateway configuration and runs
//! the engine self-checks: sign/verify with the own pair, wrap/unwrap of a
//! fresh session key, and a payload seal/open round trip.

use anyhow::{Context, Result};

use dlc_crypto::{CryptoEngine, KeyMaterial};
use dlc_gateway_client::GatewayConfig;

/// Execute `dlc-sync check-keys`.
pub fn run_check_keys() -> Result<u8> {
    let config = GatewayConfig::from_env().context("loading gateway configuration")?;
    let keys = KeyMaterial::load(
        &config.partner_cert_path,
        &config.private_key_path,
        &config.public_cert_path,
    )
    .context("loading key material")?;
    check(CryptoEngine::new(keys, config.key_wrap))
}

fn check(engine: CryptoEngine) -> Result<u8> {
    engine.self_check().context("key self-check failed")?;
    println!(
        "key material OK (wrap scheme {}, legacy fallback {})",
        engine.wrap_policy().scheme.as_str(),
        if engine.wrap_policy().allow_legacy_fallback { "on" } else { "off" },
    );
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlc_crypto::KeyWrapPolicy;
    use rsa::RsaPrivateKey;

    #[test]
    fn matching_key_pair_passes() {
        let mut rng = rand::rngs::OsRng;
        let own = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let partner = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let keys = KeyMaterial::new(partner.to_public_key(), own.clone(), own.to_public_key()).unwrap();
        assert_eq!(check(CryptoEngine::new(keys, KeyWrapPolicy::default())).unwrap(), 0);
    }
}

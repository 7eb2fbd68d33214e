//! Settings the hosting harness hands to the claim protocol.
//!
//! Nothing in the workflow reads global state: the harness builds a
//! [`PoaConfig`] once, either from its own settings store through
//! [`PoaConfig::from_lookup`] or from the process environment, and passes
//! it to the provider and relay client constructors.
//!
//! `SGX` is a flag: any non-empty value enables SGX except `false` (any
//! case) and `0`, which disable it. An unset or blank `SGX` leaves it off.
//! `DSTACK_SIMULATOR_ENDPOINT` only redirects `TEE_MODE=PRODUCTION`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::tee::sgx::GRAMINE_ATTESTATION_DIR;
use crate::tee::{AttestationMode, TdxMode};

pub const DEFAULT_RELAY_URL: &str = "https://proof-of-agent-relay.ata.network";
pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 30;

pub const ENV_TEE_MODE: &str = "TEE_MODE";
pub const ENV_SGX: &str = "SGX";
pub const ENV_RELAY_URL: &str = "PROOF_OF_AGENT_RELAY";
pub const ENV_RELAY_TIMEOUT_SECS: &str = "PROOF_OF_AGENT_RELAY_TIMEOUT_SECS";
pub const ENV_TAPPD_ENDPOINT: &str = "DSTACK_SIMULATOR_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoaConfig {
    pub relay_url: String,
    pub tee_mode: Option<TdxMode>,
    pub sgx: bool,
    pub tappd_endpoint: Option<String>,
    pub gramine_attestation_dir: PathBuf,
    #[serde(with = "duration_secs")]
    pub relay_timeout: Duration,
}

impl Default for PoaConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            tee_mode: None,
            sgx: false,
            tappd_endpoint: None,
            gramine_attestation_dir: PathBuf::from(GRAMINE_ATTESTATION_DIR),
            relay_timeout: Duration::from_secs(DEFAULT_RELAY_TIMEOUT_SECS),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> bool {
    !(value.eq_ignore_ascii_case("false") || value == "0")
}

impl PoaConfig {
    /// Build a config from a settings getter. Unset or empty keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(relay_url) = non_empty(lookup(ENV_RELAY_URL)) {
            config.relay_url = relay_url;
        }
        if let Some(tee_mode) = non_empty(lookup(ENV_TEE_MODE)) {
            config.tee_mode = TdxMode::from_id_str(&tee_mode)
                .with_context(|| format!("invalid `{ENV_TEE_MODE}` setting"))?;
        }
        if let Some(sgx) = non_empty(lookup(ENV_SGX)) {
            config.sgx = parse_flag(&sgx);
        }
        config.tappd_endpoint = non_empty(lookup(ENV_TAPPD_ENDPOINT));
        if let Some(secs) = non_empty(lookup(ENV_RELAY_TIMEOUT_SECS)) {
            let secs: u64 = secs
                .parse()
                .kind(ErrorKind::InvalidParameter)
                .with_context(|| format!("invalid `{ENV_RELAY_TIMEOUT_SECS}` setting"))?;
            config.relay_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn attestation_mode(&self) -> AttestationMode {
        AttestationMode::select(self.tee_mode, self.sgx)
    }

    /// Whether the claim action should be offered at all.
    pub fn tee_enabled(&self) -> bool {
        self.attestation_mode() != AttestationMode::Off
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = PoaConfig::from_lookup(lookup_from(&[]))?;
        assert_eq!(config, PoaConfig::default());
        assert_eq!(config.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(config.attestation_mode(), AttestationMode::Off);
        assert!(!config.tee_enabled());
        Ok(())
    }

    #[test]
    fn test_tdx_wins_over_sgx() -> Result<()> {
        let config = PoaConfig::from_lookup(lookup_from(&[
            (ENV_TEE_MODE, "DOCKER"),
            (ENV_SGX, "1"),
            (ENV_RELAY_URL, "http://relay.local"),
        ]))?;
        assert_eq!(config.attestation_mode(), AttestationMode::Tdx(TdxMode::Docker));
        assert_eq!(config.relay_url, "http://relay.local");
        assert!(config.tee_enabled());
        Ok(())
    }

    #[test]
    fn test_tee_mode_off_falls_back_to_sgx() -> Result<()> {
        let config =
            PoaConfig::from_lookup(lookup_from(&[(ENV_TEE_MODE, "OFF"), (ENV_SGX, "true")]))?;
        assert_eq!(config.attestation_mode(), AttestationMode::Sgx);

        let config =
            PoaConfig::from_lookup(lookup_from(&[(ENV_TEE_MODE, "OFF"), (ENV_SGX, "false")]))?;
        assert_eq!(config.attestation_mode(), AttestationMode::Off);
        Ok(())
    }

    #[test]
    fn test_sgx_flag_values() -> Result<()> {
        for (value, enabled) in [
            ("1", true),
            ("yes", true),
            ("TRUE", true),
            ("0", false),
            ("False", false),
            ("  ", false),
        ] {
            let config = PoaConfig::from_lookup(lookup_from(&[(ENV_SGX, value)]))?;
            assert_eq!(config.sgx, enabled, "SGX={value:?}");
        }
        Ok(())
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let err = PoaConfig::from_lookup(lookup_from(&[(ENV_TEE_MODE, "SEV")])).unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::UnsupportedTeeMode);

        let err = PoaConfig::from_lookup(lookup_from(&[(ENV_RELAY_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_deserialize_partial_config() -> Result<()> {
        let config: PoaConfig =
            serde_json::from_str(r#"{"tee_mode":"LOCAL","relay_timeout":5}"#)?;
        assert_eq!(config.tee_mode, Some(TdxMode::Local));
        assert_eq!(config.relay_timeout, Duration::from_secs(5));
        assert_eq!(config.relay_url, DEFAULT_RELAY_URL);
        Ok(())
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::HashAlgo;
use crate::errors::*;

pub mod sgx;
pub mod tdx;

/// A signed quote produced by one attestation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationReport {
    /// Hex-encoded quote.
    pub quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<String>,
}

impl AttestationReport {
    pub fn quote_bytes(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(self.quote.trim_start_matches("0x"))?)
    }
}

/// Trait representing a generic attester.
#[async_trait]
pub trait GenericAttester: Send + Sync {
    /// Generate a quote over `report_data`. Backends that apply their own
    /// digest are free to ignore `hash_algo`.
    async fn get_evidence(
        &self,
        report_data: &[u8],
        hash_algo: Option<HashAlgo>,
    ) -> Result<AttestationReport>;
}

/// How the dstack quote service is reached when running in TDX.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TdxMode {
    Local,
    Docker,
    Production,
}

impl TdxMode {
    pub fn id_str(&self) -> &'static str {
        match self {
            TdxMode::Local => "LOCAL",
            TdxMode::Docker => "DOCKER",
            TdxMode::Production => "PRODUCTION",
        }
    }

    /// Parse a `TEE_MODE` setting. `OFF` maps to `None`.
    pub fn from_id_str(id_str: &str) -> Result<Option<Self>> {
        let id_str = id_str.trim();
        if id_str.eq_ignore_ascii_case("OFF") {
            return Ok(None);
        }
        for mode in [TdxMode::Local, TdxMode::Docker, TdxMode::Production] {
            if mode.id_str().eq_ignore_ascii_case(id_str) {
                return Ok(Some(mode));
            }
        }
        Err(Error::kind_with_msg(
            ErrorKind::UnsupportedTeeMode,
            format!("Unknown TEE mode `{id_str}`"),
        ))
    }
}

/// The attestation technology selected for a provider.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AttestationMode {
    Off,
    Tdx(TdxMode),
    Sgx,
}

impl AttestationMode {
    /// TDX takes precedence when both technologies are enabled.
    pub fn select(tee_mode: Option<TdxMode>, sgx: bool) -> Self {
        match (tee_mode, sgx) {
            (Some(mode), _) => AttestationMode::Tdx(mode),
            (None, true) => AttestationMode::Sgx,
            (None, false) => AttestationMode::Off,
        }
    }

    pub fn id_str(&self) -> &'static str {
        match self {
            AttestationMode::Off => "off",
            AttestationMode::Tdx(_) => "tdx",
            AttestationMode::Sgx => "sgx",
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_tdx_takes_precedence_over_sgx() {
        assert_eq!(
            AttestationMode::select(Some(TdxMode::Docker), true),
            AttestationMode::Tdx(TdxMode::Docker)
        );
        assert_eq!(AttestationMode::select(None, true), AttestationMode::Sgx);
        assert_eq!(AttestationMode::select(None, false), AttestationMode::Off);
    }

    #[test]
    fn test_tee_mode_parsing() -> Result<()> {
        assert_eq!(TdxMode::from_id_str("off")?, None);
        assert_eq!(TdxMode::from_id_str("OFF")?, None);
        assert_eq!(TdxMode::from_id_str("local")?, Some(TdxMode::Local));
        assert_eq!(TdxMode::from_id_str(" PRODUCTION ")?, Some(TdxMode::Production));
        assert_eq!(
            TdxMode::from_id_str("sev").unwrap_err().get_kind(),
            ErrorKind::UnsupportedTeeMode
        );
        Ok(())
    }

    #[test]
    fn test_quote_bytes() -> Result<()> {
        let report = AttestationReport {
            quote: "0x0a0b".into(),
            event_log: None,
        };
        assert_eq!(report.quote_bytes()?, vec![0x0a, 0x0b]);
        Ok(())
    }
}

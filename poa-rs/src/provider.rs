use log::debug;

use crate::config::PoaConfig;
use crate::crypto::HashAlgo;
use crate::errors::*;
use crate::tee::sgx::attester::SgxAttester;
use crate::tee::tdx::attester::TdxAttester;
use crate::tee::tdx::tappd_endpoint;
use crate::tee::{AttestationMode, AttestationReport, GenericAttester};

/// The single backend a provider drives, chosen once at construction.
pub enum AttestationBackend {
    Tdx(TdxAttester),
    Sgx(SgxAttester),
    Unconfigured,
}

/// Wraps at most one attestation backend and produces quotes over arbitrary
/// report data.
pub struct AttestationProvider {
    mode: AttestationMode,
    backend: AttestationBackend,
}

impl AttestationProvider {
    /// Configure the backend selected by `config`. SGX settings are ignored
    /// when a TDX mode is set.
    pub fn new(config: &PoaConfig) -> Result<Self> {
        let mode = config.attestation_mode();
        let backend = match mode {
            AttestationMode::Tdx(tdx_mode) => AttestationBackend::Tdx(TdxAttester::new(
                &tappd_endpoint(tdx_mode, config.tappd_endpoint.as_deref()),
            )?),
            AttestationMode::Sgx => {
                AttestationBackend::Sgx(SgxAttester::new(&config.gramine_attestation_dir))
            }
            AttestationMode::Off => AttestationBackend::Unconfigured,
        };
        debug!("Configured attestation provider with mode {:?}", mode);
        Ok(Self { mode, backend })
    }

    pub fn from_backend(mode: AttestationMode, backend: AttestationBackend) -> Self {
        Self { mode, backend }
    }

    pub fn unconfigured() -> Self {
        Self::from_backend(AttestationMode::Off, AttestationBackend::Unconfigured)
    }

    pub fn mode(&self) -> AttestationMode {
        self.mode
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self.backend, AttestationBackend::Unconfigured)
    }

    /// Produce a quote over `report_data`. TDX applies `hash_algo` before
    /// quoting; SGX always uses its own default digest.
    pub async fn attest(
        &self,
        report_data: &[u8],
        hash_algo: Option<HashAlgo>,
    ) -> Result<AttestationReport> {
        debug!(
            "Generate attestation with {} backend over {} bytes of report data",
            self.mode.id_str(),
            report_data.len()
        );
        match &self.backend {
            AttestationBackend::Tdx(attester) => attester.get_evidence(report_data, hash_algo).await,
            AttestationBackend::Sgx(attester) => attester.get_evidence(report_data, None).await,
            AttestationBackend::Unconfigured => Err(Error::kind_with_msg(
                ErrorKind::ConfigurationError,
                "no attestation backend is configured",
            )),
        }
    }
}

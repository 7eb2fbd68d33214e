//! The attestation-backed claim protocol.
//!
//! One [`ClaimWorkflow::run`] walks catalog lookup, intent extraction, claim
//! request, attestation and submission in that order, stopping at the first
//! failing step. Nothing is retried and nothing outlives the run; the only
//! observable result is a [`ClaimOutcome`].

use std::sync::Arc;

use log::{debug, info, warn};

use crate::crypto::HashAlgo;
use crate::errors::*;
use crate::provider::AttestationProvider;
use crate::relay::{AssetCatalog, ClaimRequest, ClaimTicket, RelayApi, SubmitClaimRequest};
use crate::tee::AttestationReport;

pub mod intent;

pub use intent::{ExtractedIntent, IntentExtractor};

pub const TEE_NOT_ENABLED_MSG: &str = "Failed: You can only claim tokens after enabling TEE";
pub const PROOF_FAILED_MSG: &str = "Generate Proof Failed: please specify the TEE Mode";
pub const CLAIM_FAILED_MSG: &str = "Claim Failed";

/// Digest applied to the claim ticket hash before it is quoted.
pub const CLAIM_REPORT_DATA_HASH: HashAlgo = HashAlgo::Sha256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Idle,
    ValidatingConfig,
    FetchingCatalog,
    ExtractingIntent,
    RequestingClaim,
    Attesting,
    SubmittingClaim,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub success: bool,
    pub message: String,
    /// `Completed` or `Failed`.
    pub state: ClaimState,
    /// The step that was running when the claim failed.
    pub failed_at: Option<ClaimState>,
    pub error_kind: Option<ErrorKind>,
    /// Set when the failure only ends this claim attempt and the surrounding
    /// conversation should carry on.
    pub continue_conversation: bool,
}

enum ClaimFailure {
    TeeNotEnabled,
    Incomplete(String),
    Rejected(String),
    ProofUnavailable(ErrorKind),
    NotClaimed,
    Error(Error),
}

impl ClaimFailure {
    fn error_kind(&self) -> ErrorKind {
        match self {
            ClaimFailure::TeeNotEnabled => ErrorKind::ConfigurationError,
            ClaimFailure::Incomplete(_) => ErrorKind::ExtractionIncomplete,
            ClaimFailure::Rejected(_) => ErrorKind::RelayApplicationError,
            ClaimFailure::ProofUnavailable(kind) => *kind,
            ClaimFailure::NotClaimed => ErrorKind::RelayApplicationError,
            ClaimFailure::Error(e) => e.get_kind(),
        }
    }

    fn message(self) -> String {
        match self {
            ClaimFailure::TeeNotEnabled => TEE_NOT_ENABLED_MSG.to_owned(),
            ClaimFailure::Incomplete(hint) => hint,
            ClaimFailure::Rejected(reason) => format!("Failed: {reason}"),
            ClaimFailure::ProofUnavailable(_) => PROOF_FAILED_MSG.to_owned(),
            ClaimFailure::NotClaimed => CLAIM_FAILED_MSG.to_owned(),
            ClaimFailure::Error(e) => e.to_string(),
        }
    }
}

type StepResult<T> = std::result::Result<T, ClaimFailure>;

/// Relay rejections become `Rejected`, everything else is passed on as is.
fn rejected_or_error(e: Error) -> ClaimFailure {
    match e.get_kind() {
        ErrorKind::RelayApplicationError => {
            ClaimFailure::Rejected(e.get_msg_ref().clone().unwrap_or_default())
        }
        _ => ClaimFailure::Error(e),
    }
}

pub struct ClaimWorkflow {
    provider: Arc<AttestationProvider>,
    relay: Arc<dyn RelayApi>,
    extractor: Arc<dyn IntentExtractor>,
}

struct ClaimRun<'a> {
    workflow: &'a ClaimWorkflow,
    state: ClaimState,
}

impl ClaimWorkflow {
    pub fn new(
        provider: Arc<AttestationProvider>,
        relay: Arc<dyn RelayApi>,
        extractor: Arc<dyn IntentExtractor>,
    ) -> Self {
        Self {
            provider,
            relay,
            extractor,
        }
    }

    /// Run the claim protocol once against `recent_messages`.
    pub async fn run(&self, recent_messages: &str) -> ClaimOutcome {
        let mut run = ClaimRun {
            workflow: self,
            state: ClaimState::Idle,
        };

        match run.drive(recent_messages).await {
            Ok(claimed) => {
                run.enter(ClaimState::Completed);
                info!("Claim completed");
                ClaimOutcome {
                    success: true,
                    message: claimed,
                    state: ClaimState::Completed,
                    failed_at: None,
                    error_kind: None,
                    continue_conversation: false,
                }
            }
            Err(failure) => {
                let failed_at = run.state;
                run.enter(ClaimState::Failed);
                let continue_conversation = matches!(failure, ClaimFailure::Incomplete(_));
                let error_kind = failure.error_kind();
                let message = failure.message();
                if continue_conversation {
                    warn!("Claim intent incomplete: {}", message);
                } else {
                    info!("Claim failed at {:?}: {}", failed_at, message);
                }
                ClaimOutcome {
                    success: false,
                    message,
                    state: ClaimState::Failed,
                    failed_at: Some(failed_at),
                    error_kind: Some(error_kind),
                    continue_conversation,
                }
            }
        }
    }
}

impl ClaimRun<'_> {
    fn enter(&mut self, state: ClaimState) {
        debug!("Claim state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    async fn drive(&mut self, recent_messages: &str) -> StepResult<String> {
        self.validate_config()?;
        let catalog = self.fetch_catalog().await?;
        let (request, intent) = self.extract_intent(recent_messages, &catalog).await?;
        let ticket = self.request_claim(&request).await?;
        let report = self.attest(&ticket).await?;
        self.submit_claim(&report, &ticket).await?;
        Ok(intent.claimed)
    }

    fn validate_config(&mut self) -> StepResult<()> {
        self.enter(ClaimState::ValidatingConfig);
        if !self.workflow.provider.is_ready() {
            return Err(ClaimFailure::TeeNotEnabled);
        }
        Ok(())
    }

    async fn fetch_catalog(&mut self) -> StepResult<AssetCatalog> {
        self.enter(ClaimState::FetchingCatalog);
        self.workflow
            .relay
            .query_asset_catalog()
            .await
            .map_err(rejected_or_error)
    }

    async fn extract_intent(
        &mut self,
        recent_messages: &str,
        catalog: &AssetCatalog,
    ) -> StepResult<(ClaimRequest, ExtractedIntent)> {
        self.enter(ClaimState::ExtractingIntent);
        let intent = self
            .workflow
            .extractor
            .extract(recent_messages, catalog)
            .await
            .map_err(ClaimFailure::Error)?;
        debug!("Extracted claim intent: {:?}", intent);

        let recipient = match (&intent.recipient, intent.assets.is_empty()) {
            (Some(recipient), false) => recipient,
            _ => return Err(ClaimFailure::Incomplete(intent.hint)),
        };
        match ClaimRequest::new(recipient, intent.assets.clone(), catalog) {
            Ok(request) => Ok((request, intent)),
            Err(e) if intent.hint.is_empty() => Err(ClaimFailure::Incomplete(e.to_string())),
            Err(_) => Err(ClaimFailure::Incomplete(intent.hint)),
        }
    }

    async fn request_claim(&mut self, request: &ClaimRequest) -> StepResult<ClaimTicket> {
        self.enter(ClaimState::RequestingClaim);
        self.workflow
            .relay
            .request_claim(request)
            .await
            .map_err(rejected_or_error)
    }

    async fn attest(&mut self, ticket: &ClaimTicket) -> StepResult<AttestationReport> {
        self.enter(ClaimState::Attesting);
        // The readiness check above should make this unreachable for an
        // unconfigured provider.
        match self
            .workflow
            .provider
            .attest(ticket.hash.as_bytes(), Some(CLAIM_REPORT_DATA_HASH))
            .await
        {
            Ok(report) if report.quote.is_empty() => {
                Err(ClaimFailure::ProofUnavailable(ErrorKind::AttestationUnavailable))
            }
            Ok(report) => Ok(report),
            Err(e) => match e.get_kind() {
                kind @ (ErrorKind::ConfigurationError | ErrorKind::AttestationUnavailable) => {
                    warn!("Attestation unavailable: {}", e);
                    Err(ClaimFailure::ProofUnavailable(kind))
                }
                _ => Err(ClaimFailure::Error(e)),
            },
        }
    }

    async fn submit_claim(
        &mut self,
        report: &AttestationReport,
        ticket: &ClaimTicket,
    ) -> StepResult<()> {
        self.enter(ClaimState::SubmittingClaim);
        let result = self
            .workflow
            .relay
            .submit_claim(&SubmitClaimRequest::new(report, ticket))
            .await
            .map_err(rejected_or_error)?;
        if let Some(reason) = result.error.filter(|reason| !reason.is_empty()) {
            return Err(ClaimFailure::Rejected(reason));
        }
        if !result.success {
            return Err(ClaimFailure::NotClaimed);
        }
        Ok(())
    }
}

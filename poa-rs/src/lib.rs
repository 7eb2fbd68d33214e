//! Client side of the proof-of-agent claim protocol: prove to a relay that a
//! token claim was produced inside a TDX or SGX environment, then submit it.

pub mod claim;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod provider;
pub mod relay;
pub mod tee;

pub use crate::claim::{ClaimOutcome, ClaimState, ClaimWorkflow, ExtractedIntent, IntentExtractor};
pub use crate::config::PoaConfig;
pub use crate::provider::AttestationProvider;
pub use crate::relay::{RelayApi, RelayClient};

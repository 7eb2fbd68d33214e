use async_trait::async_trait;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::{
    relay_error_message, AssetCatalog, ClaimRequest, ClaimTicket, RelayApi, SubmitClaimRequest,
    SubmitResult,
};
use crate::config::PoaConfig;
use crate::errors::*;

pub const QUERY_ASSETS_PATH: &str = "/poa/queryAssets";
pub const REQUEST_CLAIM_PATH: &str = "/poa/requestClaim";
pub const SUBMIT_CLAIM_PATH: &str = "/poa/submitClaim";

/// JSON-over-HTTP client for the proof-of-agent relay.
pub struct RelayClient {
    relay_url: String,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(config: &PoaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("poa-rs/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.relay_timeout)
            .build()
            .kind(ErrorKind::ConfigurationError)
            .context("Failed to build relay client")?;

        Ok(Self {
            relay_url: config.relay_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    async fn call<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.relay_url, path);
        debug!("Send relay request to {}", url);

        let response = match self.client.post(&url).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Send request to relay `{}` failed: {}", url, e);
                return Err(e).context(format!("Send request to relay `{url}` failed"));
            }
        };
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read relay response from `{url}`"))?;

        decode_response(status, &text).or_else(|e| match e.get_kind() {
            // Relay rejections are surfaced verbatim.
            ErrorKind::RelayApplicationError => Err(e),
            _ => Err(e).context(format!("relay `{path}`")),
        })
    }
}

/// Split a relay reply into an application error, a transport error, or the
/// expected body. A non-empty `error` field wins over the HTTP status.
fn decode_response<Resp: DeserializeOwned>(status: reqwest::StatusCode, text: &str) -> Result<Resp> {
    let value: Option<Value> = serde_json::from_str(text).ok();

    let relay_error = value
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(relay_error_message);
    if let Some(msg) = relay_error {
        return Err(Error::kind_with_msg(ErrorKind::RelayApplicationError, msg));
    }

    if !status.is_success() {
        return Err(Error::kind_with_msg(
            ErrorKind::RelayTransportError,
            format!("status: {} response: {:?}", status, text),
        ));
    }

    match value {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Err(Error::kind_with_msg(
            ErrorKind::RelayMalformedResponse,
            format!("response is not JSON: {:?}", text),
        )),
    }
}

#[async_trait]
impl RelayApi for RelayClient {
    async fn query_asset_catalog(&self) -> Result<AssetCatalog> {
        let catalog: AssetCatalog = self.call(QUERY_ASSETS_PATH, &json!({})).await?;
        debug!("Relay supports {} assets", catalog.len());
        Ok(catalog)
    }

    async fn request_claim(&self, request: &ClaimRequest) -> Result<ClaimTicket> {
        self.call(REQUEST_CLAIM_PATH, request).await
    }

    async fn submit_claim(&self, request: &SubmitClaimRequest) -> Result<SubmitResult> {
        self.call(SUBMIT_CLAIM_PATH, request).await
    }
}

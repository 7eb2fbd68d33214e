use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::*;
use crate::tee::AttestationReport;

pub mod restful;

pub use restful::RelayClient;

/// Assets the relay can issue, with the block explorer base URL of each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAssetCatalog")]
pub struct AssetCatalog {
    assets: Vec<String>,
    explorers: Vec<String>,
}

#[derive(Deserialize)]
struct RawAssetCatalog {
    #[serde(default)]
    assets: Vec<String>,
    #[serde(default)]
    explorers: Vec<String>,
}

impl TryFrom<RawAssetCatalog> for AssetCatalog {
    type Error = Error;

    fn try_from(raw: RawAssetCatalog) -> Result<Self> {
        AssetCatalog::new(raw.assets, raw.explorers)
    }
}

impl AssetCatalog {
    pub fn new(assets: Vec<String>, explorers: Vec<String>) -> Result<Self> {
        if assets.len() != explorers.len() {
            return Err(Error::kind_with_msg(
                ErrorKind::RelayMalformedResponse,
                format!(
                    "asset catalog has {} assets but {} explorers",
                    assets.len(),
                    explorers.len()
                ),
            ));
        }
        Ok(Self { assets, explorers })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn explorers(&self) -> &[String] {
        &self.explorers
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.position(asset).is_some()
    }

    pub fn position(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// `explorers[index]/address/recipient`, or `None` if `index` is out of range.
    pub fn explorer_link(&self, index: usize, recipient: &str) -> Option<String> {
        self.explorers.get(index).map(|explorer| {
            format!("{}/address/{}", explorer.trim_end_matches('/'), recipient)
        })
    }

    /// One `(asset, link)` pair per asset of `request`, in request order.
    pub fn explorer_links(&self, request: &ClaimRequest) -> Vec<(String, String)> {
        request
            .assets
            .iter()
            .filter_map(|asset| {
                let index = self.position(asset)?;
                let link = self.explorer_link(index, &request.recipient)?;
                Some((asset.clone(), link))
            })
            .collect()
    }
}

/// `0x` followed by exactly 40 hex characters.
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex_part) => hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimRequest {
    recipient: String,
    assets: Vec<String>,
}

impl ClaimRequest {
    /// Validate a claim against `catalog`: the recipient must be an address
    /// and the assets a non-empty subset of the catalog.
    pub fn new(recipient: &str, assets: Vec<String>, catalog: &AssetCatalog) -> Result<Self> {
        if !is_valid_address(recipient) {
            return Err(Error::kind_with_msg(
                ErrorKind::ExtractionIncomplete,
                format!("invalid recipient address `{recipient}`"),
            ));
        }
        if assets.is_empty() {
            return Err(Error::kind_with_msg(
                ErrorKind::ExtractionIncomplete,
                "no asset to claim",
            ));
        }
        if let Some(unknown) = assets.iter().find(|asset| !catalog.contains(asset)) {
            return Err(Error::kind_with_msg(
                ErrorKind::ExtractionIncomplete,
                format!("asset `{unknown}` is not supported by the relay"),
            ));
        }
        Ok(Self {
            recipient: recipient.to_owned(),
            assets,
        })
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }
}

/// Correlation pair issued by the relay for one claim request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTicket {
    pub hash: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitClaimRequest {
    pub attestation_report: String,
    pub context: String,
}

impl SubmitClaimRequest {
    pub fn new(report: &AttestationReport, ticket: &ClaimTicket) -> Self {
        Self {
            attestation_report: report.quote.clone(),
            context: ticket.context.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    #[serde(default)]
    pub success: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_relay_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

/// Message carried by a relay `error` field. `null`, `false`, `0` and `""`
/// all mean the relay reported nothing.
pub(crate) fn relay_error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn deserialize_relay_error<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(relay_error_message(&Value::deserialize(deserializer)?))
}

/// The three relay operations. Transport failures are reported as
/// `RelayTransportError`, an `error` field in a reply as
/// `RelayApplicationError`.
#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn query_asset_catalog(&self) -> Result<AssetCatalog>;

    async fn request_claim(&self, request: &ClaimRequest) -> Result<ClaimTicket>;

    async fn submit_claim(&self, request: &SubmitClaimRequest) -> Result<SubmitResult>;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub const RECIPIENT: &str = "0x3b1f8782d6023137b8ff26f82de164abdb6760ef";

    pub fn holesky_catalog() -> AssetCatalog {
        AssetCatalog::new(
            vec!["holesky_eth".into(), "sepolia_eth".into()],
            vec![
                "https://explorer.example/holesky".into(),
                "https://explorer.example/sepolia/".into(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_explorer_link_composition() -> Result<()> {
        let catalog = AssetCatalog::new(
            vec!["holesky_eth".into()],
            vec!["https://explorer.example/holesky".into()],
        )?;
        assert_eq!(
            catalog.explorer_link(0, RECIPIENT).as_deref(),
            Some("https://explorer.example/holesky/address/0x3b1f8782d6023137b8ff26f82de164abdb6760ef")
        );
        assert_eq!(catalog.explorer_link(1, RECIPIENT), None);
        Ok(())
    }

    #[test]
    fn test_explorer_links_follow_request_order() -> Result<()> {
        let catalog = holesky_catalog();
        let request = ClaimRequest::new(
            RECIPIENT,
            vec!["sepolia_eth".into(), "holesky_eth".into()],
            &catalog,
        )?;
        let links = catalog.explorer_links(&request);
        assert_eq!(
            links,
            vec![
                (
                    "sepolia_eth".to_string(),
                    format!("https://explorer.example/sepolia/address/{RECIPIENT}")
                ),
                (
                    "holesky_eth".to_string(),
                    format!("https://explorer.example/holesky/address/{RECIPIENT}")
                ),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_catalog_rejects_length_mismatch() {
        let err = AssetCatalog::new(vec!["holesky_eth".into()], vec![]).unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::RelayMalformedResponse);

        let res: std::result::Result<AssetCatalog, _> =
            serde_json::from_str(r#"{"assets":["a","b"],"explorers":["x"]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(RECIPIENT));
        assert!(is_valid_address("0x3B1F8782D6023137B8FF26F82DE164ABDB6760EF"));
        assert!(!is_valid_address("3b1f8782d6023137b8ff26f82de164abdb6760ef"));
        assert!(!is_valid_address("0x3b1f8782d6023137b8ff26f82de164abdb6760e"));
        assert!(!is_valid_address("0x3b1f8782d6023137b8ff26f82de164abdb6760eg"));
    }

    #[test]
    fn test_claim_request_invariants() {
        let catalog = holesky_catalog();
        assert!(ClaimRequest::new(RECIPIENT, vec!["holesky_eth".into()], &catalog).is_ok());

        for (recipient, assets) in [
            ("0x1234", vec!["holesky_eth".to_string()]),
            (RECIPIENT, vec![]),
            (RECIPIENT, vec!["mainnet_eth".to_string()]),
        ] {
            let err = ClaimRequest::new(recipient, assets, &catalog).unwrap_err();
            assert_eq!(err.get_kind(), ErrorKind::ExtractionIncomplete);
        }
    }

    #[test]
    fn test_ticket_without_context() -> Result<()> {
        let ticket: ClaimTicket = serde_json::from_str(r#"{"hash":"abc123"}"#)?;
        assert_eq!(ticket.hash, "abc123");
        assert_eq!(ticket.context, "");
        Ok(())
    }
}

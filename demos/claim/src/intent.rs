use async_trait::async_trait;
use poa_rs::errors::Result;
use poa_rs::relay::{is_valid_address, AssetCatalog, ClaimRequest};
use poa_rs::{ExtractedIntent, IntentExtractor};

/// Claim intent given on the command line instead of read from a
/// conversation.
pub struct CliIntent {
    recipient: Option<String>,
    assets: Vec<String>,
}

impl CliIntent {
    pub fn new(recipient: Option<String>, assets: Vec<String>) -> Self {
        Self { recipient, assets }
    }

    fn hint(&self, catalog: &AssetCatalog) -> String {
        let mut hint = String::new();
        match &self.recipient {
            None => hint.push_str("Pass the recipient with `--recipient 0x...`.\n"),
            Some(r) if !is_valid_address(r) => hint.push_str(&format!(
                "`{r}` is not an address: expected 0x followed by 40 hex characters.\n"
            )),
            Some(_) => {}
        }
        if self.assets.is_empty() || self.assets.iter().any(|a| !catalog.contains(a)) {
            hint.push_str(&format!(
                "Pick one or more `--asset` from: {}",
                catalog.assets().join(", ")
            ));
        }
        hint.trim_end().to_owned()
    }
}

#[async_trait]
impl IntentExtractor for CliIntent {
    async fn extract(&self, _recent_messages: &str, catalog: &AssetCatalog) -> Result<ExtractedIntent> {
        let mut intent = ExtractedIntent {
            recipient: self.recipient.clone(),
            assets: self.assets.clone(),
            analysis: "taken from the command line".to_owned(),
            hint: self.hint(catalog),
            claimed: String::new(),
        };

        if let Some(recipient) = &self.recipient {
            if let Ok(request) = ClaimRequest::new(recipient, self.assets.clone(), catalog) {
                let mut claimed = format!(
                    "Claimed {} to {}. The transfer is on the way, follow it on:",
                    self.assets.join(", "),
                    recipient
                );
                for (asset, link) in catalog.explorer_links(&request) {
                    claimed.push_str(&format!("\n{asset}: {link}"));
                }
                intent.claimed = claimed;
            }
        }
        Ok(intent)
    }
}

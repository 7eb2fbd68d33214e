use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::*;
use crate::relay::AssetCatalog;

/// What the extraction collaborator read out of the conversation.
///
/// `claimed` is the confirmation text shown to the user once the claim went
/// through, `hint` the guidance shown when the claim cannot be extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedIntent {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub recipient: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assets: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub analysis: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub claimed: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty()))
}

impl ExtractedIntent {
    /// Parse the JSON object out of a model reply. The object may be wrapped
    /// in a ```json fenced block or surrounded by free text.
    pub fn from_model_output(text: &str) -> Result<Self> {
        let json = fenced_json(text)
            .or_else(|| bare_object(text))
            .ok_or_else(|| {
                Error::kind_with_msg(
                    ErrorKind::ExtractionIncomplete,
                    "no JSON object found in model output",
                )
            })?;
        serde_json::from_str(json)
            .kind(ErrorKind::ExtractionIncomplete)
            .context("model output is not a claim object")
    }

    /// Whether the intent names at least one asset and a recipient.
    pub fn is_complete(&self) -> bool {
        !self.assets.is_empty() && self.recipient.is_some()
    }
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn bare_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Turns recent conversation into a claim. Implementations are free to be
/// non-deterministic; the workflow only relies on the shape of the result.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, recent_messages: &str, catalog: &AssetCatalog) -> Result<ExtractedIntent>;
}

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::crypto::{HashAlgo, REPORT_DATA_LEN};
use crate::errors::*;
use crate::tee::{AttestationReport, GenericAttester};

/// Attester backed by the dstack quote service (Tappd) of a TDX guest.
pub struct TdxAttester {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TdxQuoteRequest {
    report_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash_algorithm: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct TdxQuoteResponse {
    #[serde(default)]
    quote: Option<String>,
    #[serde(default)]
    event_log: Option<String>,
}

impl TdxAttester {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("poa-rs/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .kind(ErrorKind::ConfigurationError)
            .context("Failed to build quote service client")?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            client,
        })
    }
}

fn encode_report_data(report_data: &[u8], hash_algo: Option<HashAlgo>) -> Result<String> {
    let mut hex_data = hex::encode(report_data);
    if hash_algo == Some(HashAlgo::Raw) {
        if report_data.len() > REPORT_DATA_LEN {
            Err(Error::kind_with_msg(
                ErrorKind::InvalidParameter,
                format!(
                    "report data length too long: {} > {}",
                    report_data.len(),
                    REPORT_DATA_LEN
                ),
            ))?;
        }
        while hex_data.len() < REPORT_DATA_LEN * 2 {
            hex_data.push('0');
        }
    }
    Ok(hex_data)
}

#[async_trait]
impl GenericAttester for TdxAttester {
    async fn get_evidence(
        &self,
        report_data: &[u8],
        hash_algo: Option<HashAlgo>,
    ) -> Result<AttestationReport> {
        let request = TdxQuoteRequest {
            report_data: encode_report_data(report_data, hash_algo)?,
            hash_algorithm: hash_algo.map(|algo| algo.str_id()),
        };
        debug!(
            "Request TDX quote from {} with hash algorithm {:?}",
            self.endpoint, request.hash_algorithm
        );

        let response = self
            .client
            .post(format!("{}/prpc/Tappd.TdxQuote?json", self.endpoint))
            .json(&request)
            .send()
            .await
            .kind(ErrorKind::TdxAttesterGenerateQuoteFailed)
            .context("Send TdxQuote request to quote service failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::kind_with_msg(
                ErrorKind::TdxAttesterGenerateQuoteFailed,
                format!(
                    "Error returned from quote service. status: {} response: {:?}",
                    status,
                    response.text().await.unwrap_or_default(),
                ),
            ));
        }

        let body: TdxQuoteResponse = response
            .json()
            .await
            .kind(ErrorKind::TdxAttesterGenerateQuoteFailed)
            .context("Failed to parse TdxQuote response")?;

        let quote = match body.quote {
            Some(quote) if !quote.is_empty() => quote,
            _ => {
                return Err(Error::kind_with_msg(
                    ErrorKind::AttestationUnavailable,
                    "quote service returned no quote",
                ))
            }
        };

        let report = AttestationReport {
            quote,
            event_log: body.event_log,
        };
        report
            .quote_bytes()
            .kind(ErrorKind::TdxAttesterGenerateQuoteFailed)
            .context("quote service returned a malformed quote")?;
        Ok(report)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_quote_request_carries_digest_algorithm() -> Result<()> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/prpc/Tappd.TdxQuote?json")
            .match_body(Matcher::Json(json!({
                "report_data": hex::encode("abc123"),
                "hash_algorithm": "sha256",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"quote":"0a0b0c","event_log":"[]"}"#)
            .create_async()
            .await;

        let attester = TdxAttester::new(&format!("{}/", server.url()))?;
        let report = attester
            .get_evidence(b"abc123", Some(HashAlgo::Sha256))
            .await?;
        mock.assert_async().await;
        assert_eq!(report.quote, "0a0b0c");
        assert_eq!(report.event_log.as_deref(), Some("[]"));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_quote_is_unavailable() -> Result<()> {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/prpc/Tappd.TdxQuote?json")
            .with_status(200)
            .with_body(r#"{"quote":""}"#)
            .create_async()
            .await;

        let attester = TdxAttester::new(&server.url())?;
        let err = attester
            .get_evidence(b"abc123", Some(HashAlgo::Sha256))
            .await
            .unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::AttestationUnavailable);
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_fails_quote_generation() -> Result<()> {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/prpc/Tappd.TdxQuote?json")
            .with_status(500)
            .with_body("tdx device unavailable")
            .create_async()
            .await;

        let attester = TdxAttester::new(&server.url())?;
        let err = attester.get_evidence(b"abc123", None).await.unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::TdxAttesterGenerateQuoteFailed);
        assert!(err.to_string().contains("tdx device unavailable"));
        Ok(())
    }

    #[test]
    fn test_raw_report_data_is_padded() -> Result<()> {
        let hex_data = encode_report_data(b"\x01\x02", Some(HashAlgo::Raw))?;
        assert_eq!(hex_data.len(), 128);
        assert!(hex_data.starts_with("0102"));
        assert!(encode_report_data(&[0u8; 65], Some(HashAlgo::Raw)).is_err());
        assert_eq!(encode_report_data(&[0u8; 65], Some(HashAlgo::Sha256))?.len(), 130);
        Ok(())
    }
}

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::task;

use crate::crypto::{DefaultCrypto, HashAlgo, REPORT_DATA_LEN};
use crate::errors::*;
use crate::tee::{AttestationReport, GenericAttester};

/// Digest the SGX backend always applies to report data.
pub const SGX_REPORT_DATA_HASH: HashAlgo = HashAlgo::Sha256;

/// Attester for SGX enclaves running under Gramine, driven through the
/// `/dev/attestation` pseudo-filesystem.
pub struct SgxAttester {
    dir: PathBuf,
}

impl SgxAttester {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn gramine_get_quote(dir: &Path, report_data: &[u8; REPORT_DATA_LEN]) -> Result<Vec<u8>> {
    let user_report_data = dir.join("user_report_data");
    let mut file = OpenOptions::new()
        .write(true)
        .open(&user_report_data)
        .with_context(|| format!("opening `{}`", user_report_data.display()))?;
    file.write_all(report_data)
        .with_context(|| format!("writing `{}`", user_report_data.display()))?;
    drop(file);

    let quote_path = dir.join("quote");
    fs::read(&quote_path).with_context(|| format!("reading `{}`", quote_path.display()))
}

#[async_trait]
impl GenericAttester for SgxAttester {
    async fn get_evidence(
        &self,
        report_data: &[u8],
        hash_algo: Option<HashAlgo>,
    ) -> Result<AttestationReport> {
        if let Some(hash_algo) = hash_algo.filter(|algo| *algo != SGX_REPORT_DATA_HASH) {
            debug!(
                "SGX attester ignores requested hash algorithm {}, using {}",
                hash_algo.str_id(),
                SGX_REPORT_DATA_HASH.str_id()
            );
        }
        let sgx_report_data = DefaultCrypto::report_data(SGX_REPORT_DATA_HASH, report_data)?;

        let dir = self.dir.clone();
        let quote = task::spawn_blocking(move || gramine_get_quote(&dir, &sgx_report_data))
            .await
            .context("the quote generation task panics")?
            .kind(ErrorKind::SgxAttesterGenerateQuoteFailed)?;

        if quote.is_empty() {
            return Err(Error::kind_with_msg(
                ErrorKind::AttestationUnavailable,
                "gramine returned an empty quote",
            ));
        }
        debug!("Generated SGX quote of {} bytes", quote.len());

        Ok(AttestationReport {
            quote: hex::encode(quote),
            event_log: None,
        })
    }
}

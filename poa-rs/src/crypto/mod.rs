use crate::errors::*;

use sha2::Digest as _;

/// Size of the report data field of both TDX and SGX quotes.
pub const REPORT_DATA_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Sha256,
    Sha384,
    Sha512,
    /// Report data is used as is, without hashing.
    Raw,
}

impl HashAlgo {
    pub fn str_id(&self) -> &'static str {
        match self {
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Sha384 => "sha384",
            HashAlgo::Sha512 => "sha512",
            HashAlgo::Raw => "raw",
        }
    }

    pub fn from_str_id(id_str: &str) -> Result<Self> {
        for algo in [
            HashAlgo::Sha256,
            HashAlgo::Sha384,
            HashAlgo::Sha512,
            HashAlgo::Raw,
        ] {
            if algo.str_id().eq_ignore_ascii_case(id_str) {
                return Ok(algo);
            }
        }
        Err(Error::kind_with_msg(
            ErrorKind::InvalidParameter,
            format!("Unknown hash algorithm `{id_str}`"),
        ))
    }
}

pub struct DefaultCrypto {}

impl DefaultCrypto {
    pub fn hash(hash_algo: HashAlgo, bytes: &[u8]) -> Vec<u8> {
        match hash_algo {
            HashAlgo::Sha256 => sha2::Sha256::new().chain_update(bytes).finalize().to_vec(),
            HashAlgo::Sha384 => sha2::Sha384::new().chain_update(bytes).finalize().to_vec(),
            HashAlgo::Sha512 => sha2::Sha512::new().chain_update(bytes).finalize().to_vec(),
            HashAlgo::Raw => bytes.to_vec(),
        }
    }

    /// Digest `bytes` with `hash_algo` and zero-pad the result to the 64-byte
    /// report data field of a quote.
    pub fn report_data(hash_algo: HashAlgo, bytes: &[u8]) -> Result<[u8; REPORT_DATA_LEN]> {
        let digest = Self::hash(hash_algo, bytes);
        if digest.len() > REPORT_DATA_LEN {
            Err(Error::kind_with_msg(
                ErrorKind::InvalidParameter,
                format!(
                    "report data length too long: {} > {}",
                    digest.len(),
                    REPORT_DATA_LEN
                ),
            ))?;
        }
        let mut report_data = [0u8; REPORT_DATA_LEN];
        report_data[..digest.len()].clone_from_slice(&digest);
        Ok(report_data)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_report_data_is_padded_digest() -> Result<()> {
        let report_data = DefaultCrypto::report_data(HashAlgo::Sha256, b"abc123")?;
        let digest = DefaultCrypto::hash(HashAlgo::Sha256, b"abc123");
        assert_eq!(digest.len(), 32);
        assert_eq!(&report_data[..32], digest.as_slice());
        assert!(report_data[32..].iter().all(|b| *b == 0));
        Ok(())
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(DefaultCrypto::hash(HashAlgo::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_raw_report_data_too_long() {
        let err = DefaultCrypto::report_data(HashAlgo::Raw, &[1u8; 65]).unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::InvalidParameter);
        assert!(DefaultCrypto::report_data(HashAlgo::Sha512, &[1u8; 65]).is_ok());
    }

    #[test]
    fn test_hash_algo_str_id() -> Result<()> {
        assert_eq!(HashAlgo::from_str_id("SHA256")?, HashAlgo::Sha256);
        assert_eq!(HashAlgo::from_str_id("raw")?, HashAlgo::Raw);
        assert!(HashAlgo::from_str_id("md5").is_err());
        Ok(())
    }
}

pub mod attester;

use std::path::Path;

pub const GRAMINE_ATTESTATION_DIR: &str = "/dev/attestation";

/// Whether `dir` exposes the Gramine attestation pseudo-files.
pub fn detect_env(dir: &Path) -> bool {
    dir.join("quote").exists() && dir.join("user_report_data").exists()
}

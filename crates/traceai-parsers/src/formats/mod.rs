//! The six built-in format parsers (§4.3).

pub mod cobol;
pub mod csv_lineage;
pub mod excel;
pub mod jcl;
pub mod json_config;
pub mod ssis;

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of file bytes, used as `Document.content_hash` by
/// every format parser (§3).
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

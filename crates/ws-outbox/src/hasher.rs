// hasher.rs — SHA-256 links for the outbox hash chain.
//
// Each log line stores the hex digest of the previous raw line, so edits,
// deletions and insertions are all detectable.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a log line.
pub fn hash_line(line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    format!("{:x}", hasher.finalize())
}

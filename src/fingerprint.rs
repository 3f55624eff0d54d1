//! Content fingerprinting for cache validity.
//!
//! A document's identity is the SHA-256 digest of its bytes on disk. Any byte
//! change produces a different digest, which invalidates every derived field
//! of its analysis record.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::DocumentAnalysis;

/// Compute the SHA-256 hex digest of a byte slice.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compute the fingerprint of a file's current bytes.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(fingerprint(&bytes))
}

/// Check whether a record still describes the given on-disk digest.
pub fn is_current(record: &DocumentAnalysis, current_digest: &str) -> bool {
    record.content_hash == current_digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let content = b"fee schedule, page one";
        assert_eq!(fingerprint(content), fingerprint(content));
    }

    #[test]
    fn test_fingerprint_sensitive_to_any_change() {
        assert_ne!(fingerprint(b"price list 2025"), fingerprint(b"price list 2024"));
        assert_ne!(fingerprint(b""), fingerprint(b" "));
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let digest = fingerprint(b"abc");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"document body").unwrap();
        assert_eq!(fingerprint_file(&path).unwrap(), fingerprint(b"document body"));
    }
}

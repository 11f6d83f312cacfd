//! Content fingerprinting
//!
//! The stores hand out a SHA-256 fingerprint of the document text as the
//! concurrency token, so any change to the stored text invalidates it.

use sha2::{Digest, Sha256};

/// Full lowercase hex SHA-256 of `content`.
pub fn content_fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_fingerprint_deterministic() {
        let first = content_fingerprint(b"<cruise/>");
        let second = content_fingerprint(b"<cruise/>");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_content_fingerprint_different_content() {
        assert_ne!(content_fingerprint(b"<cruise/>"), content_fingerprint(b"<cruise />"));
    }
}

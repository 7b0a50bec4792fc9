//! SHA-256 checksums in the canonical `sha256:<hex>` form.
//!
//! Used to notice files edited outside the engine between runs.

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// Compute the checksum of string content.
pub fn content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_known_value() {
        assert_eq!(
            content_checksum("hello world"),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn different_content_different_checksum() {
        assert_ne!(content_checksum("a = 1\n"), content_checksum("a = 2\n"));
    }
}

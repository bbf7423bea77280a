//! Content fingerprints for records that have no store identifier yet.

use sha2::{Digest, Sha256};

/// SHA-256 of the whitespace-normalised, lowercased text, hex encoded.
pub fn fingerprint(text: &str) -> String {
    let normalised = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(normalised.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_same_fingerprint() {
        let text = "Washington, George, 1732-1799";
        assert_eq!(fingerprint(text), fingerprint(text));
    }

    #[test]
    fn test_whitespace_and_case_are_ignored() {
        assert_eq!(
            fingerprint("Washington,  George"),
            fingerprint(" washington, george ")
        );
    }

    #[test]
    fn test_different_texts_differ() {
        assert_ne!(fingerprint("Washington, George"), fingerprint("Washington, Martha"));
        assert_eq!(fingerprint("").len(), 64);
    }
}

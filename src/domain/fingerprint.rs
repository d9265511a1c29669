//! Content fingerprints used for change detection.

use std::fmt;

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::requirement::TestLink;

/// A SHA-256 digest of some text, stored as 64 lower-case hex characters.
///
/// Fingerprints are only ever compared for equality. They answer "has this
/// text changed since it was last observed?".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Calculate the fingerprint of a test body.
    #[must_use]
    pub fn of(body: &str) -> Self {
        Self::digest(body.as_bytes())
    }

    fn digest(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        Self(format!("{hash:x}"))
    }

    /// The full hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first eight hex characters, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calculate a fingerprint over a set of test links.
///
/// Covers each link's file, identifier, stored hash and confirmation hash, in
/// order. A cached verification result is only valid while this value is
/// unchanged.
///
/// # Panics
///
/// Panics if borsh serialization fails (which should never happen for this
/// data structure).
#[must_use]
pub fn links_fingerprint(tests: &[TestLink]) -> Fingerprint {
    #[derive(BorshSerialize)]
    struct LinkData<'a> {
        file: &'a str,
        identifier: &'a str,
        hash: &'a str,
        confirmation: Option<&'a str>,
    }

    let data: Vec<LinkData<'_>> = tests
        .iter()
        .map(|link| LinkData {
            file: link.file(),
            identifier: link.identifier(),
            hash: link.hash().as_str(),
            confirmation: link.confirmation().map(|c| c.hash.as_str()),
        })
        .collect();

    // encode using [borsh](https://borsh.io/)
    let encoded = borsh::to_vec(&data).expect("this should never fail");

    Fingerprint::digest(&encoded)
}

#[cfg(test)]
mod tests {
    use super::Fingerprint;

    #[test]
    fn identical_bodies_hash_identically() {
        let body = "() => { expect(1+1).toBe(2); }";
        assert_eq!(Fingerprint::of(body), Fingerprint::of(body));
    }

    #[test]
    fn single_byte_change_changes_hash() {
        assert_ne!(
            Fingerprint::of("expect(1+1).toBe(2)"),
            Fingerprint::of("expect(1+1).toBe(3)")
        );
    }

    #[test]
    fn digest_is_fixed_length_hex() {
        for body in ["", "x", "long body ".repeat(1000).as_str()] {
            let fingerprint = Fingerprint::of(body);
            assert_eq!(fingerprint.as_str().len(), 64);
            assert!(fingerprint.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn short_is_a_prefix() {
        let fingerprint = Fingerprint::of("body");
        assert_eq!(fingerprint.short().len(), 8);
        assert!(fingerprint.as_str().starts_with(fingerprint.short()));
    }

    #[test]
    fn empty_string_matches_known_digest() {
        assert_eq!(
            Fingerprint::of("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

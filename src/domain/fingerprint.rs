//! Content fingerprints used for change detection and render memoization.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of stored content bytes.
///
/// The value is a pure function of the bytes it was computed from. An empty
/// fingerprint is representable because older stores may not have one; the
/// render cache treats it as "do not memoize".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(bytes.as_ref());
        Self(hex::encode(digest))
    }

    /// Wrap a digest that was computed elsewhere, e.g. loaded from a database row.
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::from_hex(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_matches_known_sha256() {
        let fp = Fingerprint::of("hello");
        assert_eq!(
            fp.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn fingerprint_is_stable_for_identical_bytes() {
        assert_eq!(Fingerprint::of(b"# Title"), Fingerprint::of("# Title"));
        assert_ne!(Fingerprint::of("a"), Fingerprint::of("b"));
    }

    #[test]
    fn empty_fingerprint_is_reported() {
        assert!(Fingerprint::empty().is_empty());
        assert!(!Fingerprint::of("").is_empty());
    }
}

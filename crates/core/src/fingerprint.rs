//! Content fingerprints
//!
//! A fingerprint is the base64 (standard, padded) SHA-256 digest of an
//! image object's bytes. The empty fingerprint means "no image".

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-derived identifier of an image object
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The absent fingerprint
    pub fn empty() -> Self {
        Fingerprint(String::new())
    }

    /// Fingerprint a complete byte buffer
    pub fn of(bytes: &[u8]) -> Self {
        Self::from_digest(Sha256::digest(bytes).as_slice())
    }

    /// Build a fingerprint from a finished SHA-256 digest
    pub fn from_digest(digest: &[u8]) -> Self {
        Fingerprint(STANDARD.encode(digest))
    }

    /// Finish an incremental hasher
    pub fn from_hasher(hasher: Sha256) -> Self {
        Self::from_digest(hasher.finalize().as_slice())
    }

    /// True for the absent fingerprint
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encoded form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Fingerprint(s.to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

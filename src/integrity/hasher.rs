//! Content fingerprints for row-sets.
//!
//! Fingerprints are cheap equality/staleness checks ("has the active dataset
//! changed since analytics were computed"), not a security mechanism. The
//! default algorithm is a 32-bit rolling polynomial hash; SHA-256 can be
//! selected in [`Settings`](crate::config::Settings) when a wider digest is
//! wanted.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::str::FromStr;

/// Hex characters kept from a SHA-256 digest.
const SHA256_FINGERPRINT_LEN: usize = 16;

/// Fingerprint algorithm used for version hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Rolling32,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rolling32 => "rolling32",
            Self::Sha256 => "sha256",
        }
    }

    /// Fingerprint arbitrary content. Deterministic and pure.
    pub fn fingerprint(self, content: &str) -> String {
        match self {
            Self::Rolling32 => rolling_hash(content),
            Self::Sha256 => sha256_fingerprint(content),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rolling32" | "rolling" => Ok(Self::Rolling32),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(format!("Unknown hash algorithm: {other}")),
        }
    }
}

/// 32-bit rolling polynomial hash (`h = h * 31 + unit`) over UTF-16 code units.
///
/// The result is the absolute value of the signed 32-bit accumulator in
/// lowercase hex. Empty input yields `"0"`.
pub fn rolling_hash(content: &str) -> String {
    let mut hash: i32 = 0;
    for unit in content.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit));
    }
    format!("{:x}", hash.unsigned_abs())
}

/// Leading hex characters of the SHA-256 digest.
pub fn sha256_fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(SHA256_FINGERPRINT_LEN);
    hex
}

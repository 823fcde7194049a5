//! Content digest type.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SealpackError;

/// A SHA-256 digest as 64 lowercase hex characters.
///
/// Immutable once computed. Used both as an artifact integrity check and as a
/// Merkle leaf/node value in the transparency log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Length of the hex encoding.
    pub const HEX_LEN: usize = 64;

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap already-encoded lowercase hex produced by the hasher.
    ///
    /// Callers outside the hasher should go through `FromStr`, which
    /// validates the input.
    pub fn from_hex_unchecked(hex: String) -> Self {
        Self(hex)
    }
}

impl FromStr for Digest {
    type Err = SealpackError;

    /// Parse a digest, accepting upper- or lowercase hex and normalizing to
    /// lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SealpackError::Config {
                reason: format!("'{}' is not a 64-character hex SHA-256 digest", s),
            });
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Digest {
    type Error = SealpackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

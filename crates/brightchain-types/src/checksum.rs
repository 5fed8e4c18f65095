//! 64-byte block checksums rendered as 128 lowercase hex characters.
//!
//! A [`Checksum`] is the content address of a block in the pool. Equality
//! is byte equality; the hex form is the wire rendering used in CBL headers,
//! magnet URLs, and gossip announcements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, TypesError};

/// Length of a checksum in bytes.
pub const CHECKSUM_LEN: usize = 64;

/// Length of a checksum's hex rendering.
pub const CHECKSUM_HEX_LEN: usize = 128;

/// A 64-byte block identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// Wrap a 64-byte array as a checksum.
    pub fn from_bytes(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }

    /// Render as exactly 128 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string.
    ///
    /// The string must be exactly 128 characters of `[0-9a-f]`; uppercase
    /// digits are rejected because the wire format is lowercase-only.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != CHECKSUM_HEX_LEN {
            return Err(TypesError::InvalidChecksum(format!(
                "expected {CHECKSUM_HEX_LEN} hex chars, got {}",
                s.len()
            )));
        }
        if !is_lower_hex(s) {
            return Err(TypesError::InvalidChecksum(
                "checksum must be lowercase hex".to_string(),
            ));
        }
        let decoded = hex::decode(s)
            .map_err(|e| TypesError::InvalidChecksum(format!("hex decode failed: {e}")))?;
        let mut bytes = [0u8; CHECKSUM_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

/// Check that a string is non-empty lowercase hex.
pub fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Check that a string is a well-formed block id (128 lowercase hex chars).
pub fn is_block_id(s: &str) -> bool {
    s.len() == CHECKSUM_HEX_LEN && is_lower_hex(s)
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Checksum({}..{})", &hex[..8], &hex[CHECKSUM_HEX_LEN - 8..])
    }
}

impl FromStr for Checksum {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Checksum::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

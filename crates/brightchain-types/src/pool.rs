//! Pool identifiers.
//!
//! A pool is a named logical partition of the block-location index. Pool
//! ids appear in routing keys and gossip announcements, so the grammar is
//! restricted to `^[a-zA-Z0-9_-]{1,64}$`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, TypesError};

/// Maximum length of a pool id.
pub const POOL_ID_MAX_LEN: usize = 64;

/// A validated pool identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(String);

impl PoolId {
    /// Parse and validate a pool id.
    pub fn parse(s: &str) -> Result<Self> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(TypesError::InvalidPoolId(s.to_string()))
        }
    }

    /// Check a candidate against the pool-id grammar.
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty()
            && s.len() <= POOL_ID_MAX_LEN
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    /// Borrow the pool id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PoolId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PoolId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PoolId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PoolId::parse(&s).map_err(serde::de::Error::custom)
    }
}

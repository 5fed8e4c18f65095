//! # brightchain-gossip
//!
//! Announcement gossip and retry-and-ack message delivery for BrightChain.
//!
//! This crate implements:
//! - the pure announcement validator via [`validate`]
//! - batched, priority-tiered announcement fanout via [`service`]
//! - the CBOR batch envelope via [`wire`]
//! - the retry-and-ack delivery state machine via [`retry`]
//! - in-memory block-location and CBL indexes via [`location`]
//! - the injected collaborator traits via [`traits`]
//!
//! ## Key parameters
//!
//! | Parameter | Default |
//! |---|---|
//! | fanout (block-only) | 3 |
//! | TTL (block-only) | 3 |
//! | batch interval | 1000 ms |
//! | max batch size | 100 |
//! | normal-priority fanout/TTL | 5 / 5 |
//! | high-priority fanout/TTL | 7 / 7 |
//! | retry check interval | 1000 ms |
//! | initial retry timeout | 30 s |
//! | backoff multiplier | 2 |
//! | max retries | 5 |
//! | max backoff | 240 s |

pub mod config;
pub mod location;
pub mod retry;
pub mod service;
pub mod traits;
pub mod validate;
pub mod wire;

/// Error types for gossip and retry operations.
#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    /// A fanout, TTL, or retry parameter is non-positive.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The network transport reported failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// CBOR envelope serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CBOR envelope deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Convenience result type for gossip operations.
pub type Result<T> = std::result::Result<T, GossipError>;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        // Well past 2021-01-01 in milliseconds.
        assert!(now_millis() > 1_600_000_000_000);
    }

    #[test]
    fn test_error_display() {
        let err = GossipError::ConfigInvalid("fanout must be positive".to_string());
        assert!(err.to_string().contains("fanout"));
    }
}

//! Gossip and retry configuration.
//!
//! All fanout, TTL, interval, and retry values must be positive;
//! `validate()` returns `false` otherwise and service constructors reject
//! invalid configs with [`GossipError::ConfigInvalid`](crate::GossipError).

use brightchain_types::announcement::MessagePriority;
use serde::{Deserialize, Serialize};

/// Default fanout for block-only announcements.
pub const DEFAULT_FANOUT: usize = 3;

/// Default initial TTL for block-only announcements.
pub const DEFAULT_TTL: u32 = 3;

/// Default batch flush cadence in milliseconds.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 1000;

/// Default forced-flush threshold.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Fanout and TTL for one message priority tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityParams {
    /// Peers selected per forwarding step.
    pub fanout: usize,
    /// Initial forwarding hops.
    pub ttl: u32,
}

/// Per-priority parameters for message-bearing announcements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePriorityConfig {
    /// Normal-priority tier.
    #[serde(default = "default_normal_params")]
    pub normal: PriorityParams,
    /// High-priority tier.
    #[serde(default = "default_high_params")]
    pub high: PriorityParams,
}

fn default_normal_params() -> PriorityParams {
    PriorityParams { fanout: 5, ttl: 5 }
}

fn default_high_params() -> PriorityParams {
    PriorityParams { fanout: 7, ttl: 7 }
}

impl Default for MessagePriorityConfig {
    fn default() -> Self {
        Self {
            normal: default_normal_params(),
            high: default_high_params(),
        }
    }
}

/// Gossip service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipConfig {
    /// Peers per forward for block-only announcements.
    #[serde(default = "default_fanout")]
    pub fanout: usize,
    /// Initial TTL for block-only announcements.
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,
    /// Flush cadence in milliseconds.
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
    /// Queue length that forces an immediate flush.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Per-priority fanout/TTL for message announcements.
    #[serde(default)]
    pub message_priority: MessagePriorityConfig,
}

fn default_fanout() -> usize {
    DEFAULT_FANOUT
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_batch_interval_ms() -> u64 {
    DEFAULT_BATCH_INTERVAL_MS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            fanout: DEFAULT_FANOUT,
            default_ttl: DEFAULT_TTL,
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            message_priority: MessagePriorityConfig::default(),
        }
    }
}

impl GossipConfig {
    /// Check that every fanout, TTL, and interval is positive.
    pub fn validate(&self) -> bool {
        self.fanout > 0
            && self.default_ttl > 0
            && self.batch_interval_ms > 0
            && self.max_batch_size > 0
            && self.message_priority.normal.fanout > 0
            && self.message_priority.normal.ttl > 0
            && self.message_priority.high.fanout > 0
            && self.message_priority.high.ttl > 0
    }

    /// The fanout/TTL tier for a message priority.
    pub fn priority_params(&self, priority: MessagePriority) -> PriorityParams {
        match priority {
            MessagePriority::Normal => self.message_priority.normal,
            MessagePriority::High => self.message_priority.high,
        }
    }
}

/// Default initial retry timeout in milliseconds.
pub const DEFAULT_INITIAL_TIMEOUT_MS: u64 = 30_000;

/// Default exponential backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Default maximum number of retries.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default backoff ceiling in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 240_000;

/// Retry service configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_timeout_ms")]
    pub initial_timeout_ms: u64,
    /// Multiplier applied per retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    /// Retries before a delivery is declared failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Ceiling on any single backoff delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_initial_timeout_ms() -> u64 {
    DEFAULT_INITIAL_TIMEOUT_MS
}

fn default_backoff_multiplier() -> u32 {
    DEFAULT_BACKOFF_MULTIPLIER
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_timeout_ms: DEFAULT_INITIAL_TIMEOUT_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_retries: DEFAULT_MAX_RETRIES,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryConfig {
    /// Check that every retry parameter is positive.
    pub fn validate(&self) -> bool {
        self.initial_timeout_ms > 0
            && self.backoff_multiplier > 0
            && self.max_retries > 0
            && self.max_backoff_ms > 0
    }

    /// Delay before the `attempt`th retry (1-indexed):
    /// `min(initialTimeoutMs × multiplier^(attempt-1), maxBackoffMs)`.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.backoff_multiplier).saturating_pow(exponent);
        self.initial_timeout_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gossip_defaults() {
        let config = GossipConfig::default();
        assert_eq!(config.fanout, 3);
        assert_eq!(config.default_ttl, 3);
        assert_eq!(config.batch_interval_ms, 1000);
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.message_priority.normal, PriorityParams { fanout: 5, ttl: 5 });
        assert_eq!(config.message_priority.high, PriorityParams { fanout: 7, ttl: 7 });
        assert!(config.validate());
    }

    #[test]
    fn test_gossip_validate_rejects_zeroes() {
        let mut config = GossipConfig::default();
        config.fanout = 0;
        assert!(!config.validate());

        let mut config = GossipConfig::default();
        config.default_ttl = 0;
        assert!(!config.validate());

        let mut config = GossipConfig::default();
        config.batch_interval_ms = 0;
        assert!(!config.validate());

        let mut config = GossipConfig::default();
        config.max_batch_size = 0;
        assert!(!config.validate());

        let mut config = GossipConfig::default();
        config.message_priority.high.fanout = 0;
        assert!(!config.validate());

        let mut config = GossipConfig::default();
        config.message_priority.normal.ttl = 0;
        assert!(!config.validate());
    }

    #[test]
    fn test_priority_params_lookup() {
        let config = GossipConfig::default();
        assert_eq!(config.priority_params(MessagePriority::Normal).fanout, 5);
        assert_eq!(config.priority_params(MessagePriority::High).ttl, 7);
    }

    #[test]
    fn test_gossip_config_serde_defaults() {
        let config: GossipConfig = serde_json::from_str("{}").expect("parse empty");
        assert_eq!(config, GossipConfig::default());
    }

    #[test]
    fn test_retry_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_timeout_ms, 30_000);
        assert_eq!(config.backoff_multiplier, 2);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_backoff_ms, 240_000);
        assert!(config.validate());
    }

    #[test]
    fn test_retry_validate_rejects_zeroes() {
        for field in 0..4 {
            let mut config = RetryConfig::default();
            match field {
                0 => config.initial_timeout_ms = 0,
                1 => config.backoff_multiplier = 0,
                2 => config.max_retries = 0,
                _ => config.max_backoff_ms = 0,
            }
            assert!(!config.validate(), "field {field} zero must be rejected");
        }
    }

    #[test]
    fn test_backoff_schedule_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_delay_ms(1), 30_000);
        assert_eq!(config.backoff_delay_ms(2), 60_000);
        assert_eq!(config.backoff_delay_ms(3), 120_000);
        assert_eq!(config.backoff_delay_ms(4), 240_000);
        assert_eq!(config.backoff_delay_ms(5), 240_000);
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        let config = RetryConfig::default();
        let mut previous = 0;
        for attempt in 1..=10 {
            let delay = config.backoff_delay_ms(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_first_delay_is_initial_timeout() {
        let config = RetryConfig {
            initial_timeout_ms: 1234,
            backoff_multiplier: 3,
            max_retries: 4,
            max_backoff_ms: 1_000_000,
        };
        assert_eq!(config.backoff_delay_ms(1), 1234);
        assert_eq!(config.backoff_delay_ms(2), 3702);
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let config = RetryConfig {
            initial_timeout_ms: u64::MAX / 2,
            backoff_multiplier: u32::MAX,
            max_retries: 100,
            max_backoff_ms: u64::MAX,
        };
        // Must not panic; clamped by saturation.
        let _ = config.backoff_delay_ms(100);
    }

    #[test]
    fn test_retry_config_serde_defaults() {
        let config: RetryConfig = serde_json::from_str("{}").expect("parse empty");
        assert_eq!(config, RetryConfig::default());
    }
}

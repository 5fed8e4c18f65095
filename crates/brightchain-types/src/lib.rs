//! # brightchain-types
//!
//! Shared domain types used across the BrightChain workspace: block
//! checksums, pool identifiers, the gossip announcement union, and the
//! per-recipient delivery-status state machine.

pub mod announcement;
pub mod checksum;
pub mod delivery;
pub mod pool;

/// Identifier of a node in the gossip network.
pub type NodeId = String;

/// Identifier of a point-to-point message tracked for delivery.
pub type MessageId = String;

/// Identifier of a message recipient.
pub type RecipientId = String;

/// Raw byte buffer.
pub type Bytes = Vec<u8>;

/// Version of the CBL JSON header format.
pub const CBL_VERSION: u32 = 1;

/// Length of the big-endian length prefix inside a padded CBL block.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Error types for domain-type parsing and validation.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A checksum string is not exactly 128 lowercase hex characters.
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    /// A pool id violates the `^[a-zA-Z0-9_-]{1,64}$` grammar.
    #[error("invalid pool id: {0}")]
    InvalidPoolId(String),
}

/// Convenience result type for domain-type operations.
pub type Result<T> = std::result::Result<T, TypesError>;

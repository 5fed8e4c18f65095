//! # brightchain-store
//!
//! Content-addressed block storage for the BrightChain pool.
//!
//! This crate implements fixed-size block storage with content addressing,
//! the Constituent Block List (CBL) codec, the file chop/reassemble
//! pipeline, the XOR whitening engine (Owner-Free System), and the magnet
//! URL grammar.
//!
//! ## Modules
//!
//! - [`block`] — block store contract and the in-memory implementation.
//! - [`cbl`] — CBL JSON header encode/decode.
//! - [`file`] — chop a byte stream into blocks and reassemble it.
//! - [`whiten`] — length-prefix padding and XOR whitening against
//!   pool-drawn randomizers.
//! - [`magnet`] — `magnet:?xt=urn:brightchain:…` URL generation and parsing.

pub mod block;
pub mod cbl;
pub mod file;
pub mod magnet;
pub mod whiten;

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block id is absent from the store.
    #[error("block not found: {0}")]
    NotFound(String),

    /// A block with the same id is already present.
    #[error("block already exists: {0}")]
    AlreadyExists(String),

    /// A payload does not match the store's configured block size.
    #[error("block size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Malformed CBL, magnet URL, hex string, or other input.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A reconstructed payload fails the length-prefix sanity check.
    #[error("integrity error: declared length {declared} exceeds capacity {capacity}")]
    Integrity { declared: u32, capacity: usize },

    /// Backing storage I/O failed.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenience result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

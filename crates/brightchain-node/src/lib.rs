//! # brightchain-node
//!
//! Node facade composing the BrightChain block store, gossip service, and
//! retry service into the end-to-end flows: store/retrieve files, whiten
//! CBLs, send messages with tracked delivery, and react to inbound
//! announcements.
//!
//! ## Modules
//!
//! - [`config`] — TOML-loadable node configuration.
//! - [`events`] — broadcast event bus carrying `message:*` events.
//! - [`node`] — the [`BrightChainNode`](node::BrightChainNode) facade.

pub mod config;
pub mod events;
pub mod node;

/// Initialize structured logging for a node host process.
///
/// Respects `RUST_LOG`; defaults to `info` when unset. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Error types for node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] brightchain_store::StoreError),

    /// A gossip or retry operation failed.
    #[error(transparent)]
    Gossip(#[from] brightchain_gossip::GossipError),

    /// The node configuration is invalid.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

/// Convenience result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

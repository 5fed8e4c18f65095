//! Integration test crate for BrightChain.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end flows across multiple workspace crates:
//! file store/retrieve, CBL whitening, magnet URLs, priority gossip, and
//! the retry-and-ack delivery lifecycle.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p brightchain-integration-tests
//! ```

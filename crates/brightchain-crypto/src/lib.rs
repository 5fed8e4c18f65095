//! # brightchain-crypto
//!
//! Hashing and randomness primitives for the BrightChain block pool.
//!
//! This crate provides:
//! - [`blake3`] — BLAKE3 block checksums (64-byte extended output) used for
//!   content addressing across the pool.
//! - [`random`] — CSPRNG helpers for padding, fallback randomizers, and
//!   uniform sampling (whitener selection and gossip peer selection both
//!   draw from the OS CSPRNG so selection cannot be predicted).

pub mod blake3;
pub mod random;

//! CSPRNG helpers for padding, fallback randomizers, and uniform sampling.
//!
//! All randomness in BrightChain flows through the OS CSPRNG. Whitener
//! selection in particular must not use a predictable shuffle: an adversary
//! who can predict which pool block will be chosen as a randomizer can
//! correlate stored blocks with user data.

use rand::RngCore;

/// Fill `buf` with bytes from the OS CSPRNG.
pub fn fill_bytes(buf: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(buf);
}

/// Return `len` bytes from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    fill_bytes(&mut buf);
    buf
}

/// Return `len_bytes` random bytes rendered as lowercase hex.
///
/// Used for receipt and message identifiers.
pub fn random_hex(len_bytes: usize) -> String {
    hex::encode(random_bytes(len_bytes))
}

/// Sample `count` distinct indices uniformly from `0..population`.
///
/// Returns `min(count, population)` indices without replacement. The order
/// of the returned indices is unspecified.
pub fn sample_indices(population: usize, count: usize) -> Vec<usize> {
    let amount = count.min(population);
    rand::seq::index::sample(&mut rand::rngs::OsRng, population, amount).into_vec()
}

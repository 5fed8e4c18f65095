//! BLAKE3 hashing for BrightChain block identifiers.
//!
//! Block checksums are 64 bytes, produced with BLAKE3 in extended-output
//! (XOF) mode. The first 32 bytes of the extended output coincide with the
//! standard BLAKE3 digest; the full 64 bytes form the pool-wide block
//! identifier rendered as 128 lowercase hex characters.

/// Length of a block checksum in bytes.
pub const CHECKSUM_LEN: usize = 64;

/// Compute the 64-byte checksum of a block payload.
///
/// Used for content addressing: the checksum of a payload is its identity
/// in the block pool.
pub fn block_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut out = [0u8; CHECKSUM_LEN];
    hash_xof(data, &mut out);
    out
}

/// Compute the standard 32-byte BLAKE3 hash of the input data.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *::blake3::hash(data).as_bytes()
}

/// Compute a variable-length BLAKE3 hash into `output`.
pub fn hash_xof(data: &[u8], output: &mut [u8]) {
    let mut hasher = ::blake3::Hasher::new();
    hasher.update(data);
    let mut reader = hasher.finalize_xof();
    reader.fill(output);
}

//! XOR whitening of CBLs against pool-drawn randomizers (Owner-Free System).
//!
//! A CBL is padded with a 4-byte big-endian length prefix and CSPRNG fill,
//! then XORed segment-by-segment against randomizer blocks so that no
//! persisted block, viewed alone, contains identifiable user content.
//!
//! ## Padding
//!
//! ```text
//! padded[0..4]   = big-endian u32 length of the CBL
//! padded[4..4+L] = CBL bytes
//! padded[4+L..]  = CSPRNG fill up to a multiple of the store block size
//! ```
//!
//! ## Whitener selection
//!
//! When the pool already holds blocks, the randomizer for each segment is
//! drawn uniformly from the pool — reusing blocks across users is what
//! makes the system owner-free. An empty pool falls back to a CSPRNG
//! randomizer, which is stored alongside the whitened block. Selection
//! uses the OS CSPRNG so an adversary cannot predict which block will be
//! reused.
//!
//! A padded CBL larger than one store block spans multiple XOR pairs; the
//! continuation pairs travel in the magnet URL's `p1`/`p2` lists.

use brightchain_crypto::random;
use brightchain_types::checksum::Checksum;
use brightchain_types::LENGTH_PREFIX_LEN;

use crate::block::{payload_checksum, BlockStore};
use crate::magnet::WhitenedCblMagnet;
use crate::{Result, StoreError};

/// Result of whitening a CBL into the pool.
#[derive(Clone, Debug)]
pub struct WhitenedCbl {
    /// The store's block size (the magnet `bs` parameter).
    pub block_size: u32,
    /// Randomizer ids, one per segment. The first is the magnet `b1`.
    pub randomizer_ids: Vec<Checksum>,
    /// Whitened ids, one per segment. The first is the magnet `b2`.
    pub whitened_ids: Vec<Checksum>,
    /// The whitened-CBL magnet URL.
    pub magnet_url: String,
}

/// Pad `data` with a length prefix and CSPRNG fill to a multiple of
/// `block_size`.
pub fn pad_to_blocks(data: &[u8], block_size: usize) -> Result<Vec<u8>> {
    if block_size == 0 {
        return Err(StoreError::InvalidFormat(
            "block size must be positive".to_string(),
        ));
    }
    if data.len() > u32::MAX as usize {
        return Err(StoreError::InvalidFormat(
            "payload exceeds the 32-bit size limit".to_string(),
        ));
    }

    let needed = data.len() + LENGTH_PREFIX_LEN;
    let total = needed.div_ceil(block_size) * block_size;

    let mut padded = Vec::with_capacity(total);
    padded.extend_from_slice(&(data.len() as u32).to_be_bytes());
    padded.extend_from_slice(data);
    let mut fill = vec![0u8; total - needed];
    random::fill_bytes(&mut fill);
    padded.extend_from_slice(&fill);
    Ok(padded)
}

/// Recover the original bytes from a padded buffer.
///
/// Fails with [`StoreError::Integrity`] when the declared length exceeds
/// the buffer's capacity.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>> {
    if padded.len() < LENGTH_PREFIX_LEN {
        return Err(StoreError::InvalidFormat(
            "padded buffer shorter than its length prefix".to_string(),
        ));
    }
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    prefix.copy_from_slice(&padded[..LENGTH_PREFIX_LEN]);
    let declared = u32::from_be_bytes(prefix);
    let capacity = padded.len() - LENGTH_PREFIX_LEN;
    if declared as usize > capacity {
        return Err(StoreError::Integrity { declared, capacity });
    }
    Ok(padded[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + declared as usize].to_vec())
}

/// XOR two equal-length buffers.
pub fn xor_bytes(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    if a.len() != b.len() {
        return Err(StoreError::InvalidFormat(format!(
            "XOR length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
}

/// Whiten a CBL into the store and return ids plus the magnet URL.
pub fn encode_whitened<S: BlockStore + ?Sized>(store: &mut S, cbl: &[u8]) -> Result<WhitenedCbl> {
    encode_whitened_flagged(store, cbl, false)
}

/// Whiten a CBL, optionally flagging the payload as encrypted (`enc=1`).
///
/// The engine does not interpret the payload; encryption is orthogonal and
/// the flag merely travels in the magnet URL.
pub fn encode_whitened_flagged<S: BlockStore + ?Sized>(
    store: &mut S,
    cbl: &[u8],
    encrypted: bool,
) -> Result<WhitenedCbl> {
    let block_size = store.block_size();
    let padded = pad_to_blocks(cbl, block_size)?;

    let mut created = Vec::new();
    let mut randomizer_ids = Vec::new();
    let mut whitened_ids = Vec::new();

    for segment in padded.chunks(block_size) {
        match whiten_segment(store, segment, &mut created) {
            Ok((randomizer, whitened)) => {
                randomizer_ids.push(randomizer);
                whitened_ids.push(whitened);
            }
            Err(e) => {
                rollback(store, &created);
                return Err(e);
            }
        }
    }

    let magnet_url = WhitenedCblMagnet {
        block_size: block_size as u32,
        block1: randomizer_ids[0],
        block2: whitened_ids[0],
        extra1: randomizer_ids[1..].to_vec(),
        extra2: whitened_ids[1..].to_vec(),
        encrypted,
    }
    .to_url();

    tracing::debug!(
        segments = randomizer_ids.len(),
        block_size,
        encrypted,
        "whitened CBL"
    );

    Ok(WhitenedCbl {
        block_size: block_size as u32,
        randomizer_ids,
        whitened_ids,
        magnet_url,
    })
}

/// Whiten one padded segment: select or create a randomizer, store the
/// XOR result, and record any newly created blocks for rollback.
fn whiten_segment<S: BlockStore + ?Sized>(
    store: &mut S,
    segment: &[u8],
    created: &mut Vec<Checksum>,
) -> Result<(Checksum, Checksum)> {
    let (randomizer_id, randomizer) = match store.get_random(1).into_iter().next() {
        Some(id) => (id, store.get(&id)?.payload().to_vec()),
        None => {
            let payload = random::random_bytes(segment.len());
            let id = store.put(payload.clone())?;
            created.push(id);
            (id, payload)
        }
    };

    let whitened = xor_bytes(segment, &randomizer)?;
    let whitened_id = payload_checksum(&whitened);
    if !store.has(&whitened_id) {
        store.put(whitened)?;
        created.push(whitened_id);
    }

    Ok((randomizer_id, whitened_id))
}

/// Remove blocks newly created by a failed whitening, in reverse order.
fn rollback<S: BlockStore + ?Sized>(store: &mut S, created: &[Checksum]) {
    for id in created.iter().rev() {
        if let Err(e) = store.delete(id) {
            tracing::warn!(block_id = %id, error = %e, "whitening rollback delete failed");
        }
    }
}

/// Reverse a whitening: XOR each stored pair and strip the padding.
///
/// XOR is commutative, so each pair's ids may be given in either order.
pub fn decode_whitened<S: BlockStore + ?Sized>(
    store: &S,
    block1: &Checksum,
    block2: &Checksum,
    extra1: &[Checksum],
    extra2: &[Checksum],
) -> Result<Vec<u8>> {
    if extra1.len() != extra2.len() {
        return Err(StoreError::InvalidFormat(format!(
            "continuation lists differ in length: {} vs {}",
            extra1.len(),
            extra2.len()
        )));
    }

    let mut padded = Vec::new();
    let pairs = std::iter::once((block1, block2)).chain(extra1.iter().zip(extra2.iter()));
    for (a, b) in pairs {
        let left = store.get(a)?.payload().to_vec();
        let right = store.get(b)?.payload();
        padded.extend_from_slice(&xor_bytes(&left, right)?);
    }

    unpad(&padded)
}

/// Store bytes as length-prefix padded, un-whitened blocks.
///
/// This is the plain sibling of whitening, used for message CBL blocks
/// whose content need not be concealed.
pub fn store_padded<S: BlockStore + ?Sized>(store: &mut S, data: &[u8]) -> Result<Vec<Checksum>> {
    let block_size = store.block_size();
    let padded = pad_to_blocks(data, block_size)?;
    let mut ids = Vec::new();
    for chunk in padded.chunks(block_size) {
        let id = payload_checksum(chunk);
        if !store.has(&id) {
            store.put(chunk.to_vec())?;
        }
        ids.push(id);
    }
    Ok(ids)
}

/// Load and unpad bytes stored with [`store_padded`].
pub fn load_padded<S: BlockStore + ?Sized>(store: &S, ids: &[Checksum]) -> Result<Vec<u8>> {
    let mut padded = Vec::new();
    for id in ids {
        padded.extend_from_slice(store.get(id)?.payload());
    }
    unpad(&padded)
}

//! Content-addressed block storage.
//!
//! A store holds fixed-size blocks keyed by their 64-byte BLAKE3 checksum.
//! One store instance has one block size; every payload it accepts must be
//! exactly that size. Duplicate inserts fail, `get` returns a read-only
//! view of the exact bytes inserted, and `get_random` draws a uniform
//! sample of resident ids (whitener selection relies on this).
//!
//! ## Session isolation
//!
//! A store is tagged with a session id at construction. A fresh instance
//! begins empty and never shares state with another instance; dropping the
//! store frees the entire pool.

use std::collections::HashMap;

use brightchain_crypto::{blake3, random};
use brightchain_types::checksum::Checksum;
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// A fixed-size block and its content address.
#[derive(Clone, Debug)]
pub struct RawBlock {
    id: Checksum,
    payload: Vec<u8>,
}

impl RawBlock {
    /// Wrap a payload, computing its checksum.
    pub fn new(payload: Vec<u8>) -> Self {
        let id = Checksum::from_bytes(blake3::block_checksum(&payload));
        Self { id, payload }
    }

    /// The block's content address.
    pub fn id(&self) -> &Checksum {
        &self.id
    }

    /// Read-only view of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Compute the content address of a payload without storing it.
pub fn payload_checksum(payload: &[u8]) -> Checksum {
    Checksum::from_bytes(blake3::block_checksum(payload))
}

/// Position and size of one block within an originating file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    /// Content address of the block.
    pub id: Checksum,
    /// Bytes of the original file carried by this block (≤ block size).
    pub size: u32,
    /// Zero-based position within the originating file.
    pub index: u32,
}

/// Content-addressed mapping `Checksum → RawBlock` with a fixed block size.
///
/// Implementations may back this with memory, disk, or a remote pool; all
/// failures are value-typed. Mutations must be atomic with respect to
/// concurrent reads (single writer, multiple readers).
pub trait BlockStore {
    /// The fixed payload size this store accepts.
    fn block_size(&self) -> usize;

    /// Insert a payload, returning its content address.
    ///
    /// Fails with [`StoreError::SizeMismatch`] when the payload length is
    /// not exactly [`block_size`](BlockStore::block_size), and with
    /// [`StoreError::AlreadyExists`] when the id is already present.
    fn put(&mut self, payload: Vec<u8>) -> Result<Checksum>;

    /// Whether a block with this id is present.
    fn has(&self, id: &Checksum) -> bool;

    /// Fetch a block by id. Fails with [`StoreError::NotFound`] if absent.
    fn get(&self, id: &Checksum) -> Result<&RawBlock>;

    /// Remove a block by id. Fails with [`StoreError::NotFound`] if absent.
    fn delete(&mut self, id: &Checksum) -> Result<()>;

    /// Draw up to `min(count, len)` ids uniformly without replacement.
    fn get_random(&self, count: usize) -> Vec<Checksum>;

    /// Number of resident blocks.
    fn len(&self) -> usize;

    /// Whether the store holds no blocks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory block store, one pool per session.
pub struct MemoryBlockStore {
    block_size: usize,
    session_id: String,
    blocks: HashMap<Checksum, RawBlock>,
}

impl MemoryBlockStore {
    /// Create an empty store with the given block size and a fresh
    /// random session id.
    pub fn new(block_size: usize) -> Self {
        Self::with_session(block_size, random::random_hex(8))
    }

    /// Create an empty store tagged with an explicit session id.
    pub fn with_session(block_size: usize, session_id: String) -> Self {
        Self {
            block_size,
            session_id,
            blocks: HashMap::new(),
        }
    }

    /// The session this store belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl BlockStore for MemoryBlockStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn put(&mut self, payload: Vec<u8>) -> Result<Checksum> {
        if payload.len() != self.block_size {
            return Err(StoreError::SizeMismatch {
                expected: self.block_size,
                actual: payload.len(),
            });
        }

        let block = RawBlock::new(payload);
        let id = *block.id();
        if self.blocks.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id.to_hex()));
        }

        self.blocks.insert(id, block);
        tracing::debug!(
            session = %self.session_id,
            block_id = %id,
            pool_size = self.blocks.len(),
            "stored block"
        );
        Ok(id)
    }

    fn has(&self, id: &Checksum) -> bool {
        self.blocks.contains_key(id)
    }

    fn get(&self, id: &Checksum) -> Result<&RawBlock> {
        self.blocks
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_hex()))
    }

    fn delete(&mut self, id: &Checksum) -> Result<()> {
        if self.blocks.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_hex()));
        }
        tracing::debug!(
            session = %self.session_id,
            block_id = %id,
            pool_size = self.blocks.len(),
            "deleted block"
        );
        Ok(())
    }

    fn get_random(&self, count: usize) -> Vec<Checksum> {
        let ids: Vec<&Checksum> = self.blocks.keys().collect();
        random::sample_indices(ids.len(), count)
            .into_iter()
            .map(|i| *ids[i])
            .collect()
    }

    fn len(&self) -> usize {
        self.blocks.len()
    }
}

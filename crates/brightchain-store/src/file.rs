//! File chop/reassemble pipeline.
//!
//! A byte stream is chopped into store-sized blocks; the final partial
//! block is filled with CSPRNG bytes so every stored payload is exactly
//! block-sized and random-padded. The declared (un-padded) size of each
//! block is preserved in the receipt and the CBL, and retrieval truncates
//! each slice back to its declared size.
//!
//! Inserting a block whose content already exists in the pool is treated
//! as a successful (idempotent) insert — that deduplication is the point
//! of content addressing.

use brightchain_crypto::random;
use serde::{Deserialize, Serialize};

use crate::block::{payload_checksum, BlockInfo, BlockStore};
use crate::cbl::CblHeader;
use crate::magnet::FileReceiptMagnet;
use crate::{Result, StoreError};

/// Receipt returned by a file store operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReceipt {
    /// Random identifier of this receipt.
    pub receipt_id: String,
    /// Original file name.
    pub file_name: String,
    /// Total size of the original file in bytes.
    pub original_size: u32,
    /// Ordered block descriptions.
    pub blocks: Vec<BlockInfo>,
}

impl FileReceipt {
    /// Build the CBL header for this receipt.
    pub fn header(&self) -> CblHeader {
        CblHeader::from_blocks(&self.blocks, self.original_size, &self.file_name)
    }

    /// Render the file-receipt magnet URL.
    pub fn magnet_url(&self) -> String {
        FileReceiptMagnet {
            receipt_id: self.receipt_id.clone(),
            file_name: self.file_name.clone(),
            original_size: self.original_size,
            blocks: self.blocks.iter().map(|b| (b.id, b.size)).collect(),
        }
        .to_url()
    }
}

/// Chop `data` into blocks, store them, and return a receipt.
///
/// Blocks already resident in the pool are reused. The receipt's block
/// list preserves file order and per-block declared sizes.
pub fn store_file<S: BlockStore + ?Sized>(
    store: &mut S,
    data: &[u8],
    file_name: &str,
) -> Result<FileReceipt> {
    let block_size = store.block_size();
    if block_size == 0 {
        return Err(StoreError::InvalidFormat(
            "store block size must be positive".to_string(),
        ));
    }
    if data.len() > u32::MAX as usize {
        return Err(StoreError::InvalidFormat(
            "file exceeds the 32-bit size limit".to_string(),
        ));
    }

    let mut blocks = Vec::new();
    for (index, chunk) in data.chunks(block_size).enumerate() {
        let mut payload = chunk.to_vec();
        if payload.len() < block_size {
            let mut pad = vec![0u8; block_size - payload.len()];
            random::fill_bytes(&mut pad);
            payload.extend_from_slice(&pad);
        }

        let id = payload_checksum(&payload);
        if !store.has(&id) {
            store.put(payload)?;
        }

        blocks.push(BlockInfo {
            id,
            size: chunk.len() as u32,
            index: index as u32,
        });
    }

    let receipt = FileReceipt {
        receipt_id: random::random_hex(16),
        file_name: file_name.to_string(),
        original_size: data.len() as u32,
        blocks,
    };

    tracing::debug!(
        receipt_id = %receipt.receipt_id,
        file_name,
        original_size = receipt.original_size,
        block_count = receipt.blocks.len(),
        "stored file"
    );

    Ok(receipt)
}

/// Reassemble a file from its CBL header.
///
/// Blocks are fetched in list order; each slice is truncated to its
/// declared size.
pub fn retrieve_file<S: BlockStore + ?Sized>(store: &S, header: &CblHeader) -> Result<Vec<u8>> {
    header.validate()?;

    let mut data = Vec::with_capacity(header.original_size as usize);
    for block_ref in &header.blocks {
        let id = brightchain_types::checksum::Checksum::from_hex(&block_ref.id)
            .map_err(|e| StoreError::InvalidFormat(e.to_string()))?;
        let block = store.get(&id)?;
        let declared = block_ref.size as usize;
        if declared > block.len() {
            return Err(StoreError::InvalidFormat(format!(
                "declared size {declared} exceeds block payload length {}",
                block.len()
            )));
        }
        data.extend_from_slice(&block.payload()[..declared]);
    }

    Ok(data)
}

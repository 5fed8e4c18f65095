//! Constituent Block List (CBL) JSON header codec.
//!
//! The CBL is the authoritative manifest for reassembling a file from
//! blocks. The header is wire-stable UTF-8 JSON:
//!
//! ```text
//! {"version":1,"fileName":"…","originalSize":N,"blockCount":K,
//!  "blocks":[{"id":"<128-hex>","size":N_i}, …]}
//! ```
//!
//! Decoding validates the JSON shape, that every block id is 128 lowercase
//! hex characters, that `blockCount` matches the list length, and that the
//! block sizes sum to `originalSize`.

use brightchain_types::checksum::is_block_id;
use brightchain_types::CBL_VERSION;
use serde::{Deserialize, Serialize};

use crate::block::BlockInfo;
use crate::{Result, StoreError};

/// One entry of a CBL's ordered block list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CblBlockRef {
    /// Block id as 128 lowercase hex characters.
    pub id: String,
    /// Bytes of the original file carried by this block.
    pub size: u32,
}

/// The CBL header describing one stored file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CblHeader {
    /// Header format version.
    pub version: u32,
    /// Original file name.
    pub file_name: String,
    /// Total size of the original file in bytes.
    pub original_size: u32,
    /// Number of blocks; must equal `blocks.len()`.
    pub block_count: u32,
    /// Ordered block list.
    pub blocks: Vec<CblBlockRef>,
}

impl CblHeader {
    /// Build a header from the pipeline's block descriptions.
    pub fn from_blocks(blocks: &[BlockInfo], original_size: u32, file_name: &str) -> Self {
        Self {
            version: CBL_VERSION,
            file_name: file_name.to_string(),
            original_size,
            block_count: blocks.len() as u32,
            blocks: blocks
                .iter()
                .map(|b| CblBlockRef {
                    id: b.id.to_hex(),
                    size: b.size,
                })
                .collect(),
        }
    }

    /// Serialize to the wire-stable UTF-8 JSON form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| StoreError::InvalidFormat(format!("CBL serialization failed: {e}")))
    }

    /// Parse and validate a CBL header from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header: CblHeader = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::InvalidFormat(format!("CBL parse failed: {e}")))?;
        header.validate()?;
        Ok(header)
    }

    /// Check the header's internal invariants.
    pub fn validate(&self) -> Result<()> {
        if self.block_count as usize != self.blocks.len() {
            return Err(StoreError::InvalidFormat(format!(
                "blockCount {} does not match {} listed blocks",
                self.block_count,
                self.blocks.len()
            )));
        }

        let total: u64 = self.blocks.iter().map(|b| u64::from(b.size)).sum();
        if total != u64::from(self.original_size) {
            return Err(StoreError::InvalidFormat(format!(
                "block sizes sum to {total}, expected originalSize {}",
                self.original_size
            )));
        }

        for (i, block) in self.blocks.iter().enumerate() {
            if !is_block_id(&block.id) {
                return Err(StoreError::InvalidFormat(format!(
                    "block {i} id is not 128 lowercase hex chars"
                )));
            }
        }

        Ok(())
    }
}

/// Serialize a block list directly to CBL header bytes.
pub fn encode(blocks: &[BlockInfo], original_size: u32, file_name: &str) -> Result<Vec<u8>> {
    CblHeader::from_blocks(blocks, original_size, file_name).encode()
}

/// Parse and validate CBL header bytes.
pub fn decode(bytes: &[u8]) -> Result<CblHeader> {
    CblHeader::decode(bytes)
}

//! Magnet URL grammar for whitened CBLs and file receipts.
//!
//! Two wire-stable grammars are produced:
//!
//! ```text
//! magnet:?xt=urn:brightchain:cbl&bs=<B>&b1=<hex>&b2=<hex>
//!        [&p1=<hex,hex,…>][&p2=<hex,hex,…>][&enc=1]
//!
//! magnet:?xt=urn:brightchain:<receiptId>&dn=<fileName>&xl=<originalSize>
//!        &blocks=<hex:size,hex:size,…>
//! ```
//!
//! Parsing rejects URLs that do not begin with `magnet:?`, missing required
//! parameters, malformed hex, and malformed sizes. Unknown parameters are
//! ignored.

use std::collections::HashMap;

use brightchain_types::checksum::Checksum;

use crate::{Result, StoreError};

/// Required scheme prefix of every magnet URL.
pub const MAGNET_PREFIX: &str = "magnet:?";

/// URN namespace of BrightChain exact-topic parameters.
pub const URN_PREFIX: &str = "urn:brightchain:";

/// Exact-topic value of a whitened-CBL URL.
pub const CBL_URN: &str = "urn:brightchain:cbl";

/// A parsed whitened-CBL magnet URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhitenedCblMagnet {
    /// Store block size (`bs`).
    pub block_size: u32,
    /// First block of the leading XOR pair (`b1`).
    pub block1: Checksum,
    /// Second block of the leading XOR pair (`b2`).
    pub block2: Checksum,
    /// Continuation blocks paired with `block1`'s side (`p1`).
    pub extra1: Vec<Checksum>,
    /// Continuation blocks paired with `block2`'s side (`p2`).
    pub extra2: Vec<Checksum>,
    /// Whether the CBL payload itself is encrypted (`enc=1`).
    pub encrypted: bool,
}

impl WhitenedCblMagnet {
    /// Render the wire form.
    pub fn to_url(&self) -> String {
        let mut url = format!(
            "{MAGNET_PREFIX}xt={CBL_URN}&bs={}&b1={}&b2={}",
            self.block_size, self.block1, self.block2
        );
        if !self.extra1.is_empty() {
            url.push_str("&p1=");
            url.push_str(&join_checksums(&self.extra1));
        }
        if !self.extra2.is_empty() {
            url.push_str("&p2=");
            url.push_str(&join_checksums(&self.extra2));
        }
        if self.encrypted {
            url.push_str("&enc=1");
        }
        url
    }
}

/// A parsed file-receipt magnet URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReceiptMagnet {
    /// Receipt identifier (the URN suffix).
    pub receipt_id: String,
    /// Display name (`dn`), percent-encoded on the wire.
    pub file_name: String,
    /// Exact length (`xl`) of the original file.
    pub original_size: u32,
    /// Ordered `(blockId, size)` list (`blocks`).
    pub blocks: Vec<(Checksum, u32)>,
}

impl FileReceiptMagnet {
    /// Render the wire form.
    pub fn to_url(&self) -> String {
        let encoded_name: String =
            url::form_urlencoded::byte_serialize(self.file_name.as_bytes()).collect();
        let blocks = self
            .blocks
            .iter()
            .map(|(id, size)| format!("{id}:{size}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{MAGNET_PREFIX}xt={URN_PREFIX}{}&dn={encoded_name}&xl={}&blocks={blocks}",
            self.receipt_id, self.original_size
        )
    }
}

/// Any parsed BrightChain magnet URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MagnetLink {
    WhitenedCbl(WhitenedCblMagnet),
    FileReceipt(FileReceiptMagnet),
}

/// Parse a magnet URL in either grammar.
pub fn parse(input: &str) -> Result<MagnetLink> {
    if !input.starts_with(MAGNET_PREFIX) {
        return Err(StoreError::InvalidFormat(
            "magnet URL must begin with `magnet:?`".to_string(),
        ));
    }

    let url = url::Url::parse(input)
        .map_err(|e| StoreError::InvalidFormat(format!("magnet URL parse failed: {e}")))?;

    let mut params: HashMap<String, String> = HashMap::new();
    for (key, value) in url.query_pairs() {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }

    let xt = required(&params, "xt")?;
    if xt == CBL_URN {
        parse_whitened(&params).map(MagnetLink::WhitenedCbl)
    } else if let Some(receipt_id) = xt.strip_prefix(URN_PREFIX) {
        if receipt_id.is_empty() {
            return Err(StoreError::InvalidFormat("empty receipt id".to_string()));
        }
        parse_receipt(&params, receipt_id).map(MagnetLink::FileReceipt)
    } else {
        Err(StoreError::InvalidFormat(format!(
            "unrecognized exact topic: {xt}"
        )))
    }
}

fn parse_whitened(params: &HashMap<String, String>) -> Result<WhitenedCblMagnet> {
    let block_size = parse_size(required(params, "bs")?, "bs")?;
    let block1 = parse_checksum(required(params, "b1")?, "b1")?;
    let block2 = parse_checksum(required(params, "b2")?, "b2")?;
    let extra1 = match params.get("p1") {
        Some(raw) => split_checksums(raw, "p1")?,
        None => Vec::new(),
    };
    let extra2 = match params.get("p2") {
        Some(raw) => split_checksums(raw, "p2")?,
        None => Vec::new(),
    };
    if extra1.len() != extra2.len() {
        return Err(StoreError::InvalidFormat(format!(
            "p1 and p2 differ in length: {} vs {}",
            extra1.len(),
            extra2.len()
        )));
    }
    let encrypted = params.get("enc").map(String::as_str) == Some("1");

    Ok(WhitenedCblMagnet {
        block_size,
        block1,
        block2,
        extra1,
        extra2,
        encrypted,
    })
}

fn parse_receipt(params: &HashMap<String, String>, receipt_id: &str) -> Result<FileReceiptMagnet> {
    let file_name = required(params, "dn")?.to_string();
    let original_size = parse_size(required(params, "xl")?, "xl")?;
    let raw_blocks = required(params, "blocks")?;

    let mut blocks = Vec::new();
    if !raw_blocks.is_empty() {
        for token in raw_blocks.split(',') {
            let (id, size) = token.split_once(':').ok_or_else(|| {
                StoreError::InvalidFormat(format!("block token `{token}` is not `id:size`"))
            })?;
            blocks.push((parse_checksum(id, "blocks")?, parse_size(size, "blocks")?));
        }
    }

    Ok(FileReceiptMagnet {
        receipt_id: receipt_id.to_string(),
        file_name,
        original_size,
        blocks,
    })
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| StoreError::InvalidFormat(format!("missing parameter `{key}`")))
}

fn parse_size(raw: &str, key: &str) -> Result<u32> {
    raw.parse::<u32>()
        .map_err(|_| StoreError::InvalidFormat(format!("`{key}` is not a non-negative integer")))
}

fn parse_checksum(raw: &str, key: &str) -> Result<Checksum> {
    Checksum::from_hex(raw)
        .map_err(|e| StoreError::InvalidFormat(format!("`{key}` block id invalid: {e}")))
}

fn split_checksums(raw: &str, key: &str) -> Result<Vec<Checksum>> {
    if raw.is_empty() {
        return Err(StoreError::InvalidFormat(format!("`{key}` list is empty")));
    }
    raw.split(',').map(|token| parse_checksum(token, key)).collect()
}

fn join_checksums(ids: &[Checksum]) -> String {
    ids.iter()
        .map(Checksum::to_hex)
        .collect::<Vec<_>>()
        .join(",")
}

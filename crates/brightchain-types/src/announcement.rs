//! Gossip announcement schema.
//!
//! An announcement is a small record a node publishes describing a block
//! event (add/remove), a message delivery, an ack, a pool deletion, or a
//! CBL index change. Announcements propagate to a random subset of peers
//! with a decreasing TTL.
//!
//! Field-presence coupling (which metadata may accompany which `type`) is
//! enforced by the validator in `brightchain-gossip`, not by construction,
//! because inbound announcements arrive from untrusted peers.

use serde::{Deserialize, Serialize};

use crate::pool::PoolId;

/// The announcement type discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    /// A block was added to the announcing node's pool.
    Add,
    /// A block was removed from the announcing node's pool.
    Remove,
    /// A delivery ack for a tracked message.
    Ack,
    /// An entire pool was deleted on the announcing node.
    PoolDeleted,
    /// A whitened-CBL index entry was published or refreshed.
    CblIndexUpdate,
    /// A whitened-CBL index entry was withdrawn.
    CblIndexDelete,
}

/// Priority tier of a message-bearing announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Normal,
    High,
}

/// Status carried by a delivery ack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Delivered,
    Read,
    Failed,
    Bounced,
}

/// Metadata attached to an `add` announcement that delivers a message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeliveryMetadata {
    /// Identifier of the message being delivered.
    pub message_id: String,
    /// Recipients the message is addressed to. Non-empty.
    pub recipient_ids: Vec<String>,
    /// Priority tier selecting fanout and TTL.
    pub priority: MessagePriority,
    /// Ids of the payload blocks. Non-empty.
    pub block_ids: Vec<String>,
    /// Id of the block holding the message's padded CBL.
    pub cbl_block_id: String,
    /// Whether the sender tracks delivery and expects acks.
    pub ack_required: bool,
}

/// Metadata attached to an `ack` announcement.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAckMetadata {
    /// Identifier of the acked message.
    pub message_id: String,
    /// The recipient acknowledging.
    pub recipient_id: String,
    /// Delivery outcome at the recipient.
    pub status: AckStatus,
    /// Node id of the original sender (the ack's destination).
    pub original_sender_node: String,
}

/// Metadata attached to `cbl_index_update`/`cbl_index_delete` announcements.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CblIndexEntry {
    /// Whitened-CBL magnet URL being indexed.
    pub magnet_url: String,
    /// First block of the XOR pair.
    pub block_id1: String,
    /// Second block of the XOR pair.
    pub block_id2: String,
}

/// A gossip announcement.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAnnouncement {
    /// The announcement type.
    #[serde(rename = "type")]
    pub kind: AnnouncementKind,
    /// Subject block id. Empty only for `pool_deleted`.
    pub block_id: String,
    /// Id of the node that created the announcement.
    pub node_id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Forwarding hops remaining. Never forwarded at zero.
    pub ttl: u32,
    /// Pool the subject block belongs to. Required for `pool_deleted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<PoolId>,
    /// Present only on message-delivering `add` announcements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_delivery: Option<MessageDeliveryMetadata>,
    /// Present only on `ack` announcements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_ack: Option<DeliveryAckMetadata>,
    /// Present only on `cbl_index_update`/`cbl_index_delete` announcements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cbl_index_entry: Option<CblIndexEntry>,
}

impl BlockAnnouncement {
    /// Deduplication key: `(type, blockId, nodeId, messageDelivery.messageId)`.
    ///
    /// The message id is included so that re-announcements of the same block
    /// for different messages are not suppressed as duplicates.
    pub fn dedupe_key(&self) -> (AnnouncementKind, String, String, Option<String>) {
        (
            self.kind,
            self.block_id.clone(),
            self.node_id.clone(),
            self.message_delivery
                .as_ref()
                .map(|m| m.message_id.clone()),
        )
    }

    /// Return a copy with the TTL decremented by one, for forwarding.
    pub fn forwarded(&self) -> Self {
        let mut copy = self.clone();
        copy.ttl = copy.ttl.saturating_sub(1);
        copy
    }
}

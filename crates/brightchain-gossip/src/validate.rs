//! Pure announcement validation.
//!
//! Inbound announcements arrive from untrusted peers, so field presence
//! and type-field coupling are checked before anything else touches them:
//!
//! 1. `messageDelivery` only on `add`; `deliveryAck` only on `ack`;
//!    `cblIndexEntry` only on `cbl_index_update`/`cbl_index_delete`;
//!    `pool_deleted` carries neither message nor ack metadata.
//! 2. `ack` and the CBL-index types must carry their metadata;
//!    `pool_deleted` must carry a pool id.
//! 3. Every required string is non-empty; arrays are non-empty with
//!    non-empty elements.
//!
//! The pool-id grammar and the priority/status value sets are enforced by
//! the types themselves at deserialization time.

use brightchain_types::announcement::{
    AnnouncementKind, BlockAnnouncement, CblIndexEntry, DeliveryAckMetadata,
    MessageDeliveryMetadata,
};

/// Validate an announcement. Returns `false` on any violation.
pub fn validate_announcement(announcement: &BlockAnnouncement) -> bool {
    if announcement.node_id.is_empty() {
        return false;
    }

    // Only pool deletions have no subject block.
    if announcement.block_id.is_empty() && announcement.kind != AnnouncementKind::PoolDeleted {
        return false;
    }

    // Type-field coupling.
    if announcement.message_delivery.is_some() && announcement.kind != AnnouncementKind::Add {
        return false;
    }
    if announcement.delivery_ack.is_some() && announcement.kind != AnnouncementKind::Ack {
        return false;
    }
    if announcement.cbl_index_entry.is_some()
        && !matches!(
            announcement.kind,
            AnnouncementKind::CblIndexUpdate | AnnouncementKind::CblIndexDelete
        )
    {
        return false;
    }

    match announcement.kind {
        AnnouncementKind::PoolDeleted => {
            announcement.pool_id.is_some()
                && announcement.message_delivery.is_none()
                && announcement.delivery_ack.is_none()
        }
        AnnouncementKind::Ack => announcement
            .delivery_ack
            .as_ref()
            .is_some_and(validate_delivery_ack),
        AnnouncementKind::CblIndexUpdate | AnnouncementKind::CblIndexDelete => announcement
            .cbl_index_entry
            .as_ref()
            .is_some_and(validate_cbl_index_entry),
        AnnouncementKind::Add => announcement
            .message_delivery
            .as_ref()
            .map_or(true, validate_message_delivery),
        AnnouncementKind::Remove => true,
    }
}

/// Validate message-delivery metadata.
pub fn validate_message_delivery(metadata: &MessageDeliveryMetadata) -> bool {
    !metadata.message_id.is_empty()
        && !metadata.cbl_block_id.is_empty()
        && !metadata.recipient_ids.is_empty()
        && metadata.recipient_ids.iter().all(|r| !r.is_empty())
        && !metadata.block_ids.is_empty()
        && metadata.block_ids.iter().all(|b| !b.is_empty())
}

/// Validate delivery-ack metadata.
pub fn validate_delivery_ack(ack: &DeliveryAckMetadata) -> bool {
    !ack.message_id.is_empty()
        && !ack.recipient_id.is_empty()
        && !ack.original_sender_node.is_empty()
}

/// Validate a CBL index entry.
pub fn validate_cbl_index_entry(entry: &CblIndexEntry) -> bool {
    !entry.magnet_url.is_empty() && !entry.block_id1.is_empty() && !entry.block_id2.is_empty()
}

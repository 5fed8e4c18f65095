//! Injected collaborator traits.
//!
//! The gossip and retry services address their environment through small
//! capability interfaces supplied at construction time: the network
//! transport, the external delivery-status store, and the message event
//! emitter. The core never implements these; hosts inject them.

use async_trait::async_trait;
use brightchain_types::announcement::{BlockAnnouncement, MessageDeliveryMetadata};
use brightchain_types::delivery::DeliveryStatus;

/// Network transport capability.
///
/// `send_to_node` and `is_node_reachable` serve direct point-to-point
/// delivery; `send_announcements` ships a gossip batch to one peer. All
/// methods are best-effort and report failure as `false` rather than
/// erroring; the gossip layer tolerates lossy transports.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    /// Attempt a direct message handoff to a node.
    async fn send_to_node(&self, node_id: &str, message_id: &str) -> bool;

    /// Whether the node currently answers on the transport.
    async fn is_node_reachable(&self, node_id: &str) -> bool;

    /// Deliver a batch of announcements to one peer.
    async fn send_announcements(&self, node_id: &str, batch: &[BlockAnnouncement]) -> bool;
}

/// External per-recipient delivery-status store.
pub trait DeliveryStatusStore: Send + Sync {
    /// Record a recipient's new delivery status for a message.
    fn update_delivery_status(&self, message_id: &str, recipient_id: &str, status: DeliveryStatus);
}

/// Terminal and lifecycle message events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageEventKind {
    /// A message's blocks and CBL were stored locally.
    Stored,
    /// A message announcement addressed to this node arrived.
    Received,
    /// Every recipient of a tracked message settled as delivered/read.
    Delivered,
    /// A tracked message exhausted its retries.
    Failed,
}

impl MessageEventKind {
    /// Wire name of the event type.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageEventKind::Stored => "message:stored",
            MessageEventKind::Received => "message:received",
            MessageEventKind::Delivered => "message:delivered",
            MessageEventKind::Failed => "message:failed",
        }
    }
}

/// Message event sink.
///
/// `message:delivered` and `message:failed` are emitted exactly once per
/// tracked delivery across its lifetime.
pub trait MessageEventEmitter: Send + Sync {
    /// Emit an event with the message's delivery metadata.
    fn emit(&self, kind: MessageEventKind, metadata: &MessageDeliveryMetadata);
}

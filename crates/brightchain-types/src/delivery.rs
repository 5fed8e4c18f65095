//! Per-recipient delivery-status state machine.
//!
//! Each recipient of a tracked message walks a restricted lifecycle:
//!
//! ```text
//! Pending ──► Announced ──► Delivered ──► Read
//!    │            │  │          │
//!    │            │  └► Bounced └► Failed
//!    └► Failed    └► Failed
//! ```
//!
//! `Read`, `Failed`, and `Bounced` are terminal. `Delivered` is terminal
//! for accounting purposes but may still advance to `Read`. Any transition
//! not in the table is rejected by ack handling.

use serde::{Deserialize, Serialize};

use crate::announcement::AckStatus;

/// Per-recipient delivery status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created but not yet announced.
    Pending,
    /// Announced over gossip; awaiting an ack.
    Announced,
    /// The recipient confirmed delivery.
    Delivered,
    /// The recipient confirmed the message was read.
    Read,
    /// Delivery failed (retries exhausted or recipient reported failure).
    Failed,
    /// The recipient's node bounced the message.
    Bounced,
}

impl DeliveryStatus {
    /// Whether `self → to` is a valid ack-driven transition.
    pub fn can_transition(self, to: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, to),
            (Pending, Announced)
                | (Pending, Failed)
                | (Announced, Delivered)
                | (Announced, Failed)
                | (Announced, Bounced)
                | (Delivered, Read)
                | (Delivered, Failed)
        )
    }

    /// Whether this status counts toward full delivery of a message.
    pub fn is_settled(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Read)
    }

    /// Whether this recipient is still awaiting an outcome.
    pub fn is_outstanding(self) -> bool {
        matches!(self, DeliveryStatus::Pending | DeliveryStatus::Announced)
    }
}

impl From<AckStatus> for DeliveryStatus {
    fn from(status: AckStatus) -> Self {
        match status {
            AckStatus::Delivered => DeliveryStatus::Delivered,
            AckStatus::Read => DeliveryStatus::Read,
            AckStatus::Failed => DeliveryStatus::Failed,
            AckStatus::Bounced => DeliveryStatus::Bounced,
        }
    }
}

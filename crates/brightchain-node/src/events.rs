//! Message event bus.
//!
//! Events are pushed from the node to subscribers via a broadcast channel.
//! Each subscriber has an independent buffer; slow subscribers lag rather
//! than block the emitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use brightchain_gossip::now_millis;
use brightchain_gossip::traits::{MessageEventEmitter, MessageEventKind};
use brightchain_types::announcement::MessageDeliveryMetadata;
use tokio::sync::broadcast;

/// An event emitted by the node.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Event type (`message:stored`, `message:received`,
    /// `message:delivered`, `message:failed`).
    pub kind: MessageEventKind,
    /// The message the event concerns.
    pub message_id: String,
    /// The message's delivery metadata.
    pub metadata: MessageDeliveryMetadata,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Event bus for broadcasting message events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MessageEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit_event(&self, event: MessageEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }

    /// Get the number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl MessageEventEmitter for EventBus {
    fn emit(&self, kind: MessageEventKind, metadata: &MessageDeliveryMetadata) {
        self.emit_event(MessageEvent {
            kind,
            message_id: metadata.message_id.clone(),
            metadata: metadata.clone(),
            timestamp: now_millis(),
        });
    }
}

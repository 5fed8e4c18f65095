//! Batched, priority-tiered announcement gossip.
//!
//! Outbound announcements accumulate in a queue. On each interval tick, or
//! when the queue reaches the forced-flush threshold, the queue is drained,
//! grouped by each announcement's required fanout (block-only announcements
//! use the base fanout, message-bearing ones their priority tier), and each
//! group is shipped to a uniformly random sample of peers of that size.
//!
//! Inbound announcements are validated, deduplicated against a bounded
//! seen-cache, delivered to subscribers, and — when `ttl > 0` — re-enqueued
//! with `ttl - 1` for forwarding. Acks reach subscribers but are never
//! forwarded. Handler invocations are serialized per service instance.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use brightchain_crypto::random;
use brightchain_types::announcement::{
    AnnouncementKind, BlockAnnouncement, CblIndexEntry, DeliveryAckMetadata,
    MessageDeliveryMetadata,
};
use brightchain_types::checksum::Checksum;
use brightchain_types::pool::PoolId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::GossipConfig;
use crate::traits::NetworkTransport;
use crate::validate::validate_announcement;
use crate::{now_millis, GossipError, Result};

/// Bound on the seen-cache; oldest keys are evicted first.
pub const SEEN_CACHE_CAP: usize = 8192;

/// Subscriber callback invoked for each accepted inbound announcement.
pub type AnnouncementHandler = Arc<dyn Fn(&BlockAnnouncement) + Send + Sync>;

type DedupeKey = (AnnouncementKind, String, String, Option<String>);

struct GossipState {
    pending: VecDeque<BlockAnnouncement>,
    seen: HashSet<DedupeKey>,
    seen_order: VecDeque<DedupeKey>,
    handlers: Vec<(u64, AnnouncementHandler)>,
    next_handler_id: u64,
    peers: Vec<String>,
}

impl GossipState {
    /// Record a dedupe key, evicting the oldest entry at capacity.
    /// Returns `false` when the key was already present.
    fn mark_seen(&mut self, key: DedupeKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.seen_order.len() >= SEEN_CACHE_CAP {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.seen_order.push_back(key);
        true
    }
}

/// The gossip service.
///
/// One instance per node; all public operations on an instance execute one
/// at a time against its internal state.
pub struct GossipService {
    config: GossipConfig,
    node_id: String,
    transport: Arc<dyn NetworkTransport>,
    state: Arc<Mutex<GossipState>>,
    tick: Mutex<Option<JoinHandle<()>>>,
}

/// Drain the queue and ship each fanout group to a random peer sample.
///
/// Free function so the periodic tick can run it from cloned handles.
async fn flush_queue(
    config: &GossipConfig,
    transport: &dyn NetworkTransport,
    state: &Mutex<GossipState>,
) {
    let (batch, peers) = {
        let mut state = state.lock().await;
        let batch: Vec<BlockAnnouncement> = state.pending.drain(..).collect();
        (batch, state.peers.clone())
    };
    if batch.is_empty() {
        return;
    }
    if peers.is_empty() {
        tracing::debug!(dropped = batch.len(), "no peers known, dropping batch");
        return;
    }

    // Group by required fanout, preserving enqueue order within groups.
    let mut groups: Vec<(usize, Vec<BlockAnnouncement>)> = Vec::new();
    for announcement in batch {
        let fanout = fanout_for(config, &announcement);
        match groups.iter_mut().find(|(f, _)| *f == fanout) {
            Some((_, list)) => list.push(announcement),
            None => groups.push((fanout, vec![announcement])),
        }
    }

    for (fanout, group) in groups {
        let selected = random::sample_indices(peers.len(), fanout);
        tracing::debug!(
            fanout,
            peers = selected.len(),
            announcements = group.len(),
            "flushing announcement group"
        );
        for index in selected {
            let peer = &peers[index];
            if !transport.send_announcements(peer, &group).await {
                tracing::warn!(peer = %peer, batch = group.len(), "announcement send failed");
            }
        }
    }
}

fn fanout_for(config: &GossipConfig, announcement: &BlockAnnouncement) -> usize {
    match &announcement.message_delivery {
        Some(metadata) => config.priority_params(metadata.priority).fanout,
        None => config.fanout,
    }
}

impl GossipService {
    /// Create a gossip service.
    ///
    /// Fails with [`GossipError::ConfigInvalid`] when any fanout, TTL, or
    /// batch value is non-positive.
    pub fn new(
        config: GossipConfig,
        node_id: impl Into<String>,
        transport: Arc<dyn NetworkTransport>,
    ) -> Result<Self> {
        if !config.validate() {
            return Err(GossipError::ConfigInvalid(
                "gossip fanout, TTL, and batch values must be positive".to_string(),
            ));
        }
        Ok(Self {
            config,
            node_id: node_id.into(),
            transport,
            state: Arc::new(Mutex::new(GossipState {
                pending: VecDeque::new(),
                seen: HashSet::new(),
                seen_order: VecDeque::new(),
                handlers: Vec::new(),
                next_handler_id: 1,
                peers: Vec::new(),
            })),
            tick: Mutex::new(None),
        })
    }

    /// The service's configuration.
    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    /// This node's id as stamped into produced announcements.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Replace the known peer set.
    pub async fn set_peers(&self, peers: Vec<String>) {
        self.state.lock().await.peers = peers;
    }

    /// Add one peer if not already known. The local node is never a peer.
    pub async fn add_peer(&self, peer: impl Into<String>) {
        let peer = peer.into();
        if peer == self.node_id {
            return;
        }
        let mut state = self.state.lock().await;
        if !state.peers.contains(&peer) {
            state.peers.push(peer);
        }
    }

    /// Remove one peer.
    pub async fn remove_peer(&self, peer: &str) {
        self.state.lock().await.peers.retain(|p| p != peer);
    }

    /// Snapshot of the known peer set.
    pub async fn peers(&self) -> Vec<String> {
        self.state.lock().await.peers.clone()
    }

    fn make_announcement(&self, kind: AnnouncementKind, block_id: String, ttl: u32) -> BlockAnnouncement {
        BlockAnnouncement {
            kind,
            block_id,
            node_id: self.node_id.clone(),
            timestamp: now_millis(),
            ttl,
            pool_id: None,
            message_delivery: None,
            delivery_ack: None,
            cbl_index_entry: None,
        }
    }

    /// Announce a newly stored block.
    pub async fn announce_block(&self, block_id: &Checksum) {
        let a = self.make_announcement(
            AnnouncementKind::Add,
            block_id.to_hex(),
            self.config.default_ttl,
        );
        self.enqueue(a).await;
    }

    /// Announce a block removal.
    pub async fn announce_removal(&self, block_id: &Checksum) {
        let a = self.make_announcement(
            AnnouncementKind::Remove,
            block_id.to_hex(),
            self.config.default_ttl,
        );
        self.enqueue(a).await;
    }

    /// Announce a message delivery: one `add` announcement per payload
    /// block, each carrying the full delivery metadata and the priority
    /// tier's TTL.
    pub async fn announce_message(&self, block_ids: &[String], metadata: MessageDeliveryMetadata) {
        let params = self.config.priority_params(metadata.priority);
        for block_id in block_ids {
            let mut a = self.make_announcement(AnnouncementKind::Add, block_id.clone(), params.ttl);
            a.message_delivery = Some(metadata.clone());
            self.enqueue(a).await;
        }
    }

    /// Send a delivery ack toward the original sender.
    ///
    /// The ack's `blockId` mirrors the acked message id. Acks are delivered
    /// to subscribers on receipt but never forwarded.
    pub async fn send_delivery_ack(&self, ack: DeliveryAckMetadata) {
        let mut a = self.make_announcement(
            AnnouncementKind::Ack,
            ack.message_id.clone(),
            self.config.default_ttl,
        );
        a.delivery_ack = Some(ack);
        self.enqueue(a).await;
    }

    /// Announce that an entire pool was deleted.
    pub async fn announce_pool_deletion(&self, pool_id: PoolId) {
        let mut a = self.make_announcement(
            AnnouncementKind::PoolDeleted,
            String::new(),
            self.config.default_ttl,
        );
        a.pool_id = Some(pool_id);
        self.enqueue(a).await;
    }

    /// Publish or refresh a whitened-CBL index entry.
    pub async fn announce_cbl_index_update(&self, entry: CblIndexEntry) {
        let mut a = self.make_announcement(
            AnnouncementKind::CblIndexUpdate,
            entry.block_id1.clone(),
            self.config.default_ttl,
        );
        a.cbl_index_entry = Some(entry);
        self.enqueue(a).await;
    }

    /// Withdraw a whitened-CBL index entry.
    pub async fn announce_cbl_index_delete(&self, entry: CblIndexEntry) {
        let mut a = self.make_announcement(
            AnnouncementKind::CblIndexDelete,
            entry.block_id1.clone(),
            self.config.default_ttl,
        );
        a.cbl_index_entry = Some(entry);
        self.enqueue(a).await;
    }

    /// Queue an outbound announcement, flushing when the queue reaches the
    /// forced-flush threshold. Own announcements are marked seen so echoes
    /// from peers are dropped on receipt.
    async fn enqueue(&self, announcement: BlockAnnouncement) {
        let should_flush = {
            let mut state = self.state.lock().await;
            state.mark_seen(announcement.dedupe_key());
            state.pending.push_back(announcement);
            state.pending.len() >= self.config.max_batch_size
        };
        if should_flush {
            self.flush_announcements().await;
        }
    }

    /// Snapshot of the pending outbound queue.
    pub async fn get_pending_announcements(&self) -> Vec<BlockAnnouncement> {
        self.state.lock().await.pending.iter().cloned().collect()
    }

    /// Process an inbound announcement from a peer.
    pub async fn handle_announcement(&self, announcement: BlockAnnouncement) {
        if !validate_announcement(&announcement) {
            tracing::debug!(
                node_id = %announcement.node_id,
                kind = ?announcement.kind,
                "dropping invalid announcement"
            );
            return;
        }

        let should_flush = {
            let mut state = self.state.lock().await;
            if !state.mark_seen(announcement.dedupe_key()) {
                tracing::debug!(
                    block_id = %announcement.block_id,
                    "dropping duplicate announcement"
                );
                return;
            }

            for (_, handler) in &state.handlers {
                handler(&announcement);
            }

            if announcement.ttl > 0 && announcement.kind != AnnouncementKind::Ack {
                state.pending.push_back(announcement.forwarded());
                state.pending.len() >= self.config.max_batch_size
            } else {
                false
            }
        };
        if should_flush {
            self.flush_announcements().await;
        }
    }

    /// Process a CBOR announcement envelope received from the wire.
    pub async fn handle_envelope(&self, bytes: &[u8]) -> Result<()> {
        let envelope = crate::wire::AnnouncementEnvelope::from_bytes(bytes)?;
        for announcement in envelope.announcements {
            self.handle_announcement(announcement).await;
        }
        Ok(())
    }

    /// Register a subscriber. Returns a handle for [`off_announcement`](Self::off_announcement).
    pub async fn on_announcement(&self, handler: AnnouncementHandler) -> u64 {
        let mut state = self.state.lock().await;
        let id = state.next_handler_id;
        state.next_handler_id += 1;
        state.handlers.push((id, handler));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub async fn off_announcement(&self, handler_id: u64) -> bool {
        let mut state = self.state.lock().await;
        let before = state.handlers.len();
        state.handlers.retain(|(id, _)| *id != handler_id);
        state.handlers.len() != before
    }

    /// Drain the queue and ship each fanout group to a random peer sample.
    pub async fn flush_announcements(&self) {
        flush_queue(&self.config, self.transport.as_ref(), &self.state).await;
    }

    /// Start the periodic batch flush.
    pub async fn start(&self) {
        let mut tick = self.tick.lock().await;
        if tick.is_some() {
            return;
        }
        let config = self.config.clone();
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        *tick = Some(tokio::spawn(async move {
            let mut timer =
                tokio::time::interval(Duration::from_millis(config.batch_interval_ms));
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                flush_queue(&config, transport.as_ref(), &state).await;
            }
        }));
        tracing::info!(node_id = %self.node_id, "gossip service started");
    }

    /// Cancel the periodic tick and flush pending announcements best-effort.
    pub async fn stop(&self) {
        if let Some(handle) = self.tick.lock().await.take() {
            handle.abort();
        }
        self.flush_announcements().await;
        tracing::info!(node_id = %self.node_id, "gossip service stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use brightchain_types::announcement::MessagePriority;

    use super::*;

    /// Transport that records every batch it is asked to send.
    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<(String, Vec<BlockAnnouncement>)>>,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<(String, Vec<BlockAnnouncement>)> {
            self.sent.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl NetworkTransport for RecordingTransport {
        async fn send_to_node(&self, _node_id: &str, _message_id: &str) -> bool {
            true
        }

        async fn is_node_reachable(&self, _node_id: &str) -> bool {
            true
        }

        async fn send_announcements(&self, node_id: &str, batch: &[BlockAnnouncement]) -> bool {
            self.sent
                .lock()
                .expect("lock")
                .push((node_id.to_string(), batch.to_vec()));
            true
        }
    }

    fn service_with(config: GossipConfig) -> (Arc<GossipService>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let service = Arc::new(
            GossipService::new(config, "local-node", transport.clone()).expect("valid config"),
        );
        (service, transport)
    }

    fn checksum(fill: u8) -> Checksum {
        Checksum::from_bytes([fill; 64])
    }

    fn metadata(priority: MessagePriority) -> MessageDeliveryMetadata {
        MessageDeliveryMetadata {
            message_id: "m-1".to_string(),
            recipient_ids: vec!["r1".to_string()],
            priority,
            block_ids: vec![checksum(0x11).to_hex()],
            cbl_block_id: checksum(0x22).to_hex(),
            ack_required: true,
        }
    }

    fn inbound(kind: AnnouncementKind, block: u8, ttl: u32) -> BlockAnnouncement {
        BlockAnnouncement {
            kind,
            block_id: checksum(block).to_hex(),
            node_id: "remote-node".to_string(),
            timestamp: 1,
            ttl,
            pool_id: None,
            message_delivery: None,
            delivery_ack: None,
            cbl_index_entry: None,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GossipConfig::default();
        config.fanout = 0;
        let transport = Arc::new(RecordingTransport::default());
        let err = GossipService::new(config, "n", transport).err().expect("invalid");
        assert!(matches!(err, GossipError::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn test_announce_block_uses_default_ttl() {
        let (service, _) = service_with(GossipConfig::default());
        service.announce_block(&checksum(0x01)).await;

        let pending = service.get_pending_announcements().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, AnnouncementKind::Add);
        assert_eq!(pending[0].ttl, 3);
        assert_eq!(pending[0].node_id, "local-node");
    }

    #[tokio::test]
    async fn test_announce_message_uses_priority_ttl() {
        let (service, _) = service_with(GossipConfig::default());
        let block_ids = vec![checksum(0x01).to_hex(), checksum(0x02).to_hex()];
        service
            .announce_message(&block_ids, metadata(MessagePriority::High))
            .await;

        let pending = service.get_pending_announcements().await;
        assert_eq!(pending.len(), 2);
        for a in &pending {
            assert_eq!(a.ttl, 7);
            assert!(a.message_delivery.is_some());
        }

        let (service, _) = service_with(GossipConfig::default());
        service
            .announce_message(&block_ids, metadata(MessagePriority::Normal))
            .await;
        assert!(service
            .get_pending_announcements()
            .await
            .iter()
            .all(|a| a.ttl == 5));
    }

    #[tokio::test]
    async fn test_flush_groups_by_priority_fanout() {
        let (service, transport) = service_with(GossipConfig::default());
        service
            .set_peers((0..10).map(|i| format!("peer-{i}")).collect())
            .await;

        service.announce_block(&checksum(0x01)).await;
        service
            .announce_message(
                &[checksum(0x02).to_hex()],
                metadata(MessagePriority::High),
            )
            .await;
        service.flush_announcements().await;

        let sent = transport.sent();
        let block_sends: Vec<_> = sent
            .iter()
            .filter(|(_, b)| b[0].message_delivery.is_none())
            .collect();
        let message_sends: Vec<_> = sent
            .iter()
            .filter(|(_, b)| b[0].message_delivery.is_some())
            .collect();
        assert_eq!(block_sends.len(), 3, "block group flushed at fanout 3");
        assert_eq!(message_sends.len(), 7, "high group flushed at fanout 7");

        // Each group goes to distinct peers.
        let mut peers: Vec<_> = message_sends.iter().map(|(p, _)| p.clone()).collect();
        peers.sort();
        peers.dedup();
        assert_eq!(peers.len(), 7);

        assert!(service.get_pending_announcements().await.is_empty());
    }

    #[tokio::test]
    async fn test_fanout_clamped_to_peer_count() {
        let (service, transport) = service_with(GossipConfig::default());
        service.set_peers(vec!["only-peer".to_string()]).await;
        service.announce_block(&checksum(0x01)).await;
        service.flush_announcements().await;
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_without_peers_drops_batch() {
        let (service, transport) = service_with(GossipConfig::default());
        service.announce_block(&checksum(0x01)).await;
        service.flush_announcements().await;
        assert!(transport.sent().is_empty());
        assert!(service.get_pending_announcements().await.is_empty());
    }

    #[tokio::test]
    async fn test_forced_flush_at_max_batch_size() {
        let mut config = GossipConfig::default();
        config.max_batch_size = 2;
        let (service, transport) = service_with(config);
        service.set_peers(vec!["p1".to_string()]).await;

        service.announce_block(&checksum(0x01)).await;
        assert!(transport.sent().is_empty(), "below threshold, no flush yet");
        service.announce_block(&checksum(0x02)).await;
        assert!(!transport.sent().is_empty(), "threshold reached, flushed");
    }

    #[tokio::test]
    async fn test_inbound_delivered_to_subscribers() {
        let (service, _) = service_with(GossipConfig::default());
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink = received.clone();
        service
            .on_announcement(Arc::new(move |a: &BlockAnnouncement| {
                sink.lock().expect("lock").push(a.block_id.clone());
            }))
            .await;

        service
            .handle_announcement(inbound(AnnouncementKind::Add, 0x01, 3))
            .await;
        assert_eq!(received.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_dropped() {
        let (service, _) = service_with(GossipConfig::default());
        let received = Arc::new(StdMutex::new(0usize));
        let sink = received.clone();
        service
            .on_announcement(Arc::new(move |_: &BlockAnnouncement| {
                *sink.lock().expect("lock") += 1;
            }))
            .await;

        let a = inbound(AnnouncementKind::Add, 0x01, 3);
        service.handle_announcement(a.clone()).await;
        service.handle_announcement(a).await;
        assert_eq!(*received.lock().expect("lock"), 1);
        // The duplicate must not be queued for forwarding twice either.
        assert_eq!(service.get_pending_announcements().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_inbound_dropped() {
        let (service, _) = service_with(GossipConfig::default());
        let received = Arc::new(StdMutex::new(0usize));
        let sink = received.clone();
        service
            .on_announcement(Arc::new(move |_: &BlockAnnouncement| {
                *sink.lock().expect("lock") += 1;
            }))
            .await;

        let mut bad = inbound(AnnouncementKind::Add, 0x01, 3);
        bad.node_id = String::new();
        service.handle_announcement(bad).await;
        assert_eq!(*received.lock().expect("lock"), 0);
        assert!(service.get_pending_announcements().await.is_empty());
    }

    #[tokio::test]
    async fn test_forwarding_decrements_ttl() {
        let (service, _) = service_with(GossipConfig::default());
        service
            .handle_announcement(inbound(AnnouncementKind::Add, 0x01, 3))
            .await;

        let pending = service.get_pending_announcements().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].ttl, 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_forwarded() {
        let (service, _) = service_with(GossipConfig::default());
        service
            .handle_announcement(inbound(AnnouncementKind::Add, 0x01, 0))
            .await;
        assert!(service.get_pending_announcements().await.is_empty());
    }

    #[tokio::test]
    async fn test_acks_not_forwarded() {
        use brightchain_types::announcement::{AckStatus, DeliveryAckMetadata};

        let (service, _) = service_with(GossipConfig::default());
        let received = Arc::new(StdMutex::new(0usize));
        let sink = received.clone();
        service
            .on_announcement(Arc::new(move |_: &BlockAnnouncement| {
                *sink.lock().expect("lock") += 1;
            }))
            .await;

        let mut ack = inbound(AnnouncementKind::Ack, 0x01, 3);
        ack.delivery_ack = Some(DeliveryAckMetadata {
            message_id: "m-1".to_string(),
            recipient_id: "r1".to_string(),
            status: AckStatus::Delivered,
            original_sender_node: "local-node".to_string(),
        });
        service.handle_announcement(ack).await;

        assert_eq!(*received.lock().expect("lock"), 1, "delivered to subscribers");
        assert!(
            service.get_pending_announcements().await.is_empty(),
            "acks bypass forwarding"
        );
    }

    #[tokio::test]
    async fn test_own_announcements_not_echoed_back() {
        let (service, _) = service_with(GossipConfig::default());
        let received = Arc::new(StdMutex::new(0usize));
        let sink = received.clone();
        service
            .on_announcement(Arc::new(move |_: &BlockAnnouncement| {
                *sink.lock().expect("lock") += 1;
            }))
            .await;

        service.announce_block(&checksum(0x01)).await;
        let pending = service.get_pending_announcements().await;

        // A peer forwards our announcement back to us.
        service.handle_announcement(pending[0].clone()).await;
        assert_eq!(*received.lock().expect("lock"), 0, "echo suppressed");
    }

    #[tokio::test]
    async fn test_off_announcement_unsubscribes() {
        let (service, _) = service_with(GossipConfig::default());
        let received = Arc::new(StdMutex::new(0usize));
        let sink = received.clone();
        let id = service
            .on_announcement(Arc::new(move |_: &BlockAnnouncement| {
                *sink.lock().expect("lock") += 1;
            }))
            .await;

        assert!(service.off_announcement(id).await);
        assert!(!service.off_announcement(id).await, "already removed");

        service
            .handle_announcement(inbound(AnnouncementKind::Add, 0x01, 3))
            .await;
        assert_eq!(*received.lock().expect("lock"), 0);
    }

    #[tokio::test]
    async fn test_stop_flushes_pending() {
        let (service, transport) = service_with(GossipConfig::default());
        service.set_peers(vec!["p1".to_string()]).await;
        service.announce_block(&checksum(0x01)).await;

        service.stop().await;
        assert!(!transport.sent().is_empty());
        assert!(service.get_pending_announcements().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop_periodic_flush() {
        let mut config = GossipConfig::default();
        config.batch_interval_ms = 10;
        let (service, transport) = service_with(config);
        service.set_peers(vec!["p1".to_string()]).await;

        service.start().await;
        service.announce_block(&checksum(0x01)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!transport.sent().is_empty(), "periodic tick flushed");
        service.stop().await;
    }

    #[tokio::test]
    async fn test_handle_envelope_feeds_each_announcement() {
        use crate::wire::AnnouncementEnvelope;

        let (service, _) = service_with(GossipConfig::default());
        let received = Arc::new(StdMutex::new(0usize));
        let sink = received.clone();
        service
            .on_announcement(Arc::new(move |_: &BlockAnnouncement| {
                *sink.lock().expect("lock") += 1;
            }))
            .await;

        let envelope = AnnouncementEnvelope::new(
            vec![
                inbound(AnnouncementKind::Add, 0x01, 3),
                inbound(AnnouncementKind::Add, 0x02, 3),
            ],
            7,
        );
        let bytes = envelope.to_bytes().expect("encode");
        service.handle_envelope(&bytes).await.expect("handle");
        assert_eq!(*received.lock().expect("lock"), 2);

        assert!(service.handle_envelope(b"junk").await.is_err());
    }

    #[tokio::test]
    async fn test_add_peer_ignores_self_and_duplicates() {
        let (service, _) = service_with(GossipConfig::default());
        service.add_peer("local-node").await;
        service.add_peer("p1").await;
        service.add_peer("p1").await;
        assert_eq!(service.peers().await, vec!["p1".to_string()]);
        service.remove_peer("p1").await;
        assert!(service.peers().await.is_empty());
    }
}

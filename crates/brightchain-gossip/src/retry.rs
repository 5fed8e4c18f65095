//! Retry-and-ack tracking for point-to-point message delivery.
//!
//! Every tracked message holds one [`DeliveryStatus`] per recipient,
//! starting at `Announced`. A periodic tick re-announces undelivered
//! messages over gossip with exponential backoff
//! (`min(initialTimeoutMs × multiplier^(n-1), maxBackoffMs)` before the
//! nth retry). When retries are exhausted, every outstanding recipient is
//! failed, exactly one `message:failed` event fires, and the delivery is
//! dropped from tracking. Acks walk the validated state machine; invalid
//! or unknown acks are silently ignored and never touch the external
//! delivery-status store.
//!
//! Time is injected (`*_at` variants) so tests drive the schedule
//! deterministically; the public operations stamp the wall clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use brightchain_types::announcement::{DeliveryAckMetadata, MessageDeliveryMetadata};
use brightchain_types::delivery::DeliveryStatus;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::RetryConfig;
use crate::service::GossipService;
use crate::traits::{DeliveryStatusStore, MessageEventEmitter, MessageEventKind};
use crate::{now_millis, GossipError, Result};

/// Interval between internal retry checks in milliseconds.
pub const RETRY_CHECK_INTERVAL_MS: u64 = 1000;

/// One tracked message delivery.
#[derive(Clone, Debug)]
pub struct PendingDelivery {
    /// The tracked message id.
    pub message_id: String,
    /// Payload block ids re-announced on retry.
    pub block_ids: Vec<String>,
    /// The message's delivery metadata.
    pub metadata: MessageDeliveryMetadata,
    /// Per-recipient status, initialized to `Announced`.
    pub recipient_statuses: HashMap<String, DeliveryStatus>,
    /// Retries performed so far.
    pub retry_count: u32,
    /// When the next retry (or exhaustion check) is due.
    pub next_retry_at: u64,
    /// When tracking began.
    pub created_at: u64,
}

struct RetryState {
    pending: HashMap<String, PendingDelivery>,
}

/// The retry service.
///
/// Holds a reference to the gossip service for re-announcement; the gossip
/// service outlives it. The delivery-status store and event emitter are
/// injected collaborators.
pub struct RetryService {
    config: RetryConfig,
    gossip: Arc<GossipService>,
    status_store: Arc<dyn DeliveryStatusStore>,
    emitter: Arc<dyn MessageEventEmitter>,
    state: Arc<Mutex<RetryState>>,
    tick: Mutex<Option<JoinHandle<()>>>,
}

/// One retry pass at time `now`.
///
/// Free function so the periodic tick can run it from cloned handles. Due
/// deliveries either re-announce (incrementing the retry count and
/// scheduling the next backoff) or, once `maxRetries` is reached, fail
/// every outstanding recipient and drop out of tracking.
async fn run_retry_check(
    config: RetryConfig,
    gossip: &GossipService,
    status_store: &dyn DeliveryStatusStore,
    emitter: &dyn MessageEventEmitter,
    state: &Mutex<RetryState>,
    now: u64,
) {
    let mut reannounce = Vec::new();
    let mut exhausted = Vec::new();

    {
        let mut state = state.lock().await;
        let due: Vec<String> = state
            .pending
            .iter()
            .filter(|(_, d)| now >= d.next_retry_at)
            .map(|(id, _)| id.clone())
            .collect();

        for message_id in due {
            let Some(delivery) = state.pending.get_mut(&message_id) else {
                continue;
            };
            if delivery.retry_count >= config.max_retries {
                let mut failed_recipients = Vec::new();
                for (recipient, status) in delivery.recipient_statuses.iter_mut() {
                    if status.is_outstanding() {
                        *status = DeliveryStatus::Failed;
                        failed_recipients.push(recipient.clone());
                    }
                }
                let metadata = delivery.metadata.clone();
                state.pending.remove(&message_id);
                exhausted.push((message_id, failed_recipients, metadata));
            } else {
                delivery.retry_count += 1;
                delivery.next_retry_at = now + config.backoff_delay_ms(delivery.retry_count + 1);
                tracing::debug!(
                    message_id = %message_id,
                    retry = delivery.retry_count,
                    next_retry_at = delivery.next_retry_at,
                    "re-announcing delivery"
                );
                reannounce.push((delivery.block_ids.clone(), delivery.metadata.clone()));
            }
        }
    }

    for (message_id, failed_recipients, metadata) in exhausted {
        for recipient in &failed_recipients {
            status_store.update_delivery_status(&message_id, recipient, DeliveryStatus::Failed);
        }
        tracing::warn!(
            message_id = %message_id,
            failed = failed_recipients.len(),
            "delivery retries exhausted"
        );
        emitter.emit(MessageEventKind::Failed, &metadata);
    }

    for (block_ids, metadata) in reannounce {
        gossip.announce_message(&block_ids, metadata).await;
    }
}

impl RetryService {
    /// Create a retry service.
    ///
    /// Fails with [`GossipError::ConfigInvalid`] when any retry parameter
    /// is non-positive.
    pub fn new(
        config: RetryConfig,
        gossip: Arc<GossipService>,
        status_store: Arc<dyn DeliveryStatusStore>,
        emitter: Arc<dyn MessageEventEmitter>,
    ) -> Result<Self> {
        if !config.validate() {
            return Err(GossipError::ConfigInvalid(
                "retry timeout, multiplier, max retries, and backoff ceiling must be positive"
                    .to_string(),
            ));
        }
        Ok(Self {
            config,
            gossip,
            status_store,
            emitter,
            state: Arc::new(Mutex::new(RetryState {
                pending: HashMap::new(),
            })),
            tick: Mutex::new(None),
        })
    }

    /// The service's configuration.
    pub fn get_config(&self) -> &RetryConfig {
        &self.config
    }

    /// Begin tracking a delivery. Every recipient starts at `Announced`;
    /// the first retry is due after the initial timeout.
    pub async fn track_delivery(
        &self,
        message_id: &str,
        block_ids: Vec<String>,
        metadata: MessageDeliveryMetadata,
    ) {
        self.track_delivery_at(message_id, block_ids, metadata, now_millis())
            .await;
    }

    /// [`track_delivery`](Self::track_delivery) with an injected clock.
    pub async fn track_delivery_at(
        &self,
        message_id: &str,
        block_ids: Vec<String>,
        metadata: MessageDeliveryMetadata,
        now: u64,
    ) {
        let recipient_statuses = metadata
            .recipient_ids
            .iter()
            .map(|r| (r.clone(), DeliveryStatus::Announced))
            .collect();

        let delivery = PendingDelivery {
            message_id: message_id.to_string(),
            block_ids,
            metadata,
            recipient_statuses,
            retry_count: 0,
            next_retry_at: now + self.config.backoff_delay_ms(1),
            created_at: now,
        };

        tracing::debug!(
            message_id,
            recipients = delivery.recipient_statuses.len(),
            next_retry_at = delivery.next_retry_at,
            "tracking delivery"
        );
        self.state
            .lock()
            .await
            .pending
            .insert(message_id.to_string(), delivery);
    }

    /// Apply a delivery ack.
    ///
    /// Unknown message ids, unknown recipients, and invalid state
    /// transitions are silently ignored; nothing reaches the external
    /// delivery-status store in those cases. When the last recipient
    /// settles, exactly one `message:delivered` event fires and the
    /// delivery is dropped from tracking.
    pub async fn handle_ack(&self, ack: &DeliveryAckMetadata) {
        let outcome = {
            let mut state = self.state.lock().await;
            let Some(delivery) = state.pending.get_mut(&ack.message_id) else {
                tracing::debug!(message_id = %ack.message_id, "ack for untracked message ignored");
                return;
            };
            let Some(current) = delivery.recipient_statuses.get(&ack.recipient_id).copied()
            else {
                tracing::debug!(
                    message_id = %ack.message_id,
                    recipient_id = %ack.recipient_id,
                    "ack for unknown recipient ignored"
                );
                return;
            };

            let next = DeliveryStatus::from(ack.status);
            if !current.can_transition(next) {
                tracing::debug!(
                    message_id = %ack.message_id,
                    recipient_id = %ack.recipient_id,
                    from = ?current,
                    to = ?next,
                    "invalid status transition ignored"
                );
                return;
            }

            delivery
                .recipient_statuses
                .insert(ack.recipient_id.clone(), next);

            let all_settled = delivery
                .recipient_statuses
                .values()
                .all(|s| s.is_settled());
            let metadata = delivery.metadata.clone();
            if all_settled {
                state.pending.remove(&ack.message_id);
            }
            (next, all_settled, metadata)
        };

        let (next, all_settled, metadata) = outcome;
        self.status_store
            .update_delivery_status(&ack.message_id, &ack.recipient_id, next);

        if all_settled {
            tracing::info!(message_id = %ack.message_id, "message fully delivered");
            self.emitter.emit(MessageEventKind::Delivered, &metadata);
        }
    }

    /// Run one retry check against the wall clock.
    pub async fn check_retries(&self) {
        self.check_retries_at(now_millis()).await;
    }

    /// Run one retry check at an injected time.
    pub async fn check_retries_at(&self, now: u64) {
        run_retry_check(
            self.config,
            &self.gossip,
            self.status_store.as_ref(),
            self.emitter.as_ref(),
            &self.state,
            now,
        )
        .await;
    }

    /// Snapshot of a tracked delivery.
    pub async fn get_pending_delivery(&self, message_id: &str) -> Option<PendingDelivery> {
        self.state.lock().await.pending.get(message_id).cloned()
    }

    /// Number of tracked deliveries.
    pub async fn get_pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Start the periodic retry tick.
    pub async fn start(&self) {
        let mut tick = self.tick.lock().await;
        if tick.is_some() {
            return;
        }
        let config = self.config;
        let gossip = Arc::clone(&self.gossip);
        let status_store = Arc::clone(&self.status_store);
        let emitter = Arc::clone(&self.emitter);
        let state = Arc::clone(&self.state);
        *tick = Some(tokio::spawn(async move {
            let mut timer =
                tokio::time::interval(Duration::from_millis(RETRY_CHECK_INTERVAL_MS));
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                run_retry_check(
                    config,
                    &gossip,
                    status_store.as_ref(),
                    emitter.as_ref(),
                    &state,
                    now_millis(),
                )
                .await;
            }
        }));
        tracing::info!("retry service started");
    }

    /// Cancel the periodic tick. The pending-delivery map is left intact
    /// for inspection and no events are emitted.
    pub async fn stop(&self) {
        if let Some(handle) = self.tick.lock().await.take() {
            handle.abort();
        }
        tracing::info!("retry service stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use brightchain_types::announcement::{AckStatus, BlockAnnouncement, MessagePriority};

    use crate::config::GossipConfig;
    use crate::traits::NetworkTransport;

    use super::*;

    struct NullTransport;

    #[async_trait]
    impl NetworkTransport for NullTransport {
        async fn send_to_node(&self, _node_id: &str, _message_id: &str) -> bool {
            true
        }

        async fn is_node_reachable(&self, _node_id: &str) -> bool {
            true
        }

        async fn send_announcements(&self, _node_id: &str, _batch: &[BlockAnnouncement]) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingStatusStore {
        updates: StdMutex<Vec<(String, String, DeliveryStatus)>>,
    }

    impl RecordingStatusStore {
        fn updates(&self) -> Vec<(String, String, DeliveryStatus)> {
            self.updates.lock().expect("lock").clone()
        }
    }

    impl DeliveryStatusStore for RecordingStatusStore {
        fn update_delivery_status(
            &self,
            message_id: &str,
            recipient_id: &str,
            status: DeliveryStatus,
        ) {
            self.updates.lock().expect("lock").push((
                message_id.to_string(),
                recipient_id.to_string(),
                status,
            ));
        }
    }

    #[derive(Default)]
    struct RecordingEmitter {
        events: StdMutex<Vec<(MessageEventKind, String)>>,
    }

    impl RecordingEmitter {
        fn events(&self) -> Vec<(MessageEventKind, String)> {
            self.events.lock().expect("lock").clone()
        }
    }

    impl MessageEventEmitter for RecordingEmitter {
        fn emit(&self, kind: MessageEventKind, metadata: &MessageDeliveryMetadata) {
            self.events
                .lock()
                .expect("lock")
                .push((kind, metadata.message_id.clone()));
        }
    }

    struct Harness {
        service: Arc<RetryService>,
        gossip: Arc<GossipService>,
        store: Arc<RecordingStatusStore>,
        emitter: Arc<RecordingEmitter>,
    }

    fn harness() -> Harness {
        let gossip = Arc::new(
            GossipService::new(GossipConfig::default(), "sender", Arc::new(NullTransport))
                .expect("gossip config"),
        );
        let store = Arc::new(RecordingStatusStore::default());
        let emitter = Arc::new(RecordingEmitter::default());
        let service = Arc::new(
            RetryService::new(
                RetryConfig::default(),
                gossip.clone(),
                store.clone(),
                emitter.clone(),
            )
            .expect("retry config"),
        );
        Harness {
            service,
            gossip,
            store,
            emitter,
        }
    }

    fn metadata(message_id: &str, recipients: &[&str]) -> MessageDeliveryMetadata {
        MessageDeliveryMetadata {
            message_id: message_id.to_string(),
            recipient_ids: recipients.iter().map(|r| r.to_string()).collect(),
            priority: MessagePriority::Normal,
            block_ids: vec!["ab".repeat(64)],
            cbl_block_id: "cd".repeat(64),
            ack_required: true,
        }
    }

    fn ack(message_id: &str, recipient: &str, status: AckStatus) -> DeliveryAckMetadata {
        DeliveryAckMetadata {
            message_id: message_id.to_string(),
            recipient_id: recipient.to_string(),
            status,
            original_sender_node: "sender".to_string(),
        }
    }

    async fn track(h: &Harness, message_id: &str, recipients: &[&str], now: u64) {
        let md = metadata(message_id, recipients);
        h.service
            .track_delivery_at(message_id, md.block_ids.clone(), md, now)
            .await;
    }

    #[test]
    fn test_invalid_config_rejected() {
        let gossip = Arc::new(
            GossipService::new(GossipConfig::default(), "n", Arc::new(NullTransport))
                .expect("gossip"),
        );
        let config = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        let result = RetryService::new(
            config,
            gossip,
            Arc::new(RecordingStatusStore::default()),
            Arc::new(RecordingEmitter::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_track_initializes_announced() {
        let h = harness();
        track(&h, "m-1", &["r1", "r2"], 1000).await;

        let delivery = h.service.get_pending_delivery("m-1").await.expect("tracked");
        assert_eq!(delivery.recipient_statuses.len(), 2);
        assert!(delivery
            .recipient_statuses
            .values()
            .all(|s| *s == DeliveryStatus::Announced));
        assert_eq!(delivery.retry_count, 0);
        assert_eq!(delivery.created_at, 1000);
        assert_eq!(delivery.next_retry_at, 1000 + 30_000);
        assert_eq!(h.service.get_pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_tick_before_deadline_does_nothing() {
        let h = harness();
        track(&h, "m-1", &["r1"], 1000).await;
        h.service.check_retries_at(1000 + 29_999).await;

        let delivery = h.service.get_pending_delivery("m-1").await.expect("tracked");
        assert_eq!(delivery.retry_count, 0);
        assert!(h.gossip.get_pending_announcements().await.is_empty());
    }

    #[tokio::test]
    async fn test_retry_schedule_follows_backoff() {
        let h = harness();
        track(&h, "m-1", &["r1"], 0).await;

        // Expected due times with defaults: 30s, 90s, 210s, 450s, 690s,
        // exhaustion at 930s (each consecutive delay 30/60/120/240/240).
        let mut now = 0u64;
        let expected_delays = [30_000u64, 60_000, 120_000, 240_000, 240_000];
        for (i, delay) in expected_delays.iter().enumerate() {
            now += delay;
            h.service.check_retries_at(now).await;
            let delivery = h.service.get_pending_delivery("m-1").await.expect("tracked");
            assert_eq!(delivery.retry_count as usize, i + 1);
            let next_delay = RetryConfig::default().backoff_delay_ms(i as u32 + 2);
            assert_eq!(delivery.next_retry_at, now + next_delay);
        }

        // Five re-announcements, one announcement per block per retry.
        assert_eq!(h.gossip.get_pending_announcements().await.len(), 5);
    }

    #[tokio::test]
    async fn test_exhaustion_fails_outstanding_recipients() {
        let h = harness();
        track(&h, "m-1", &["r1", "r2"], 0).await;

        // Drive through all five retries and the exhaustion tick.
        for now in [30_000u64, 90_000, 210_000, 450_000, 690_000, 930_000] {
            h.service.check_retries_at(now).await;
        }

        assert_eq!(h.service.get_pending_count().await, 0);
        let events = h.emitter.events();
        assert_eq!(events.len(), 1, "exactly one terminal event");
        assert_eq!(events[0], (MessageEventKind::Failed, "m-1".to_string()));

        let updates = h.store.updates();
        assert_eq!(updates.len(), 2);
        assert!(updates
            .iter()
            .all(|(m, _, s)| m == "m-1" && *s == DeliveryStatus::Failed));
        let mut recipients: Vec<_> = updates.iter().map(|(_, r, _)| r.clone()).collect();
        recipients.sort();
        assert_eq!(recipients, vec!["r1".to_string(), "r2".to_string()]);
    }

    #[tokio::test]
    async fn test_exhaustion_skips_settled_recipients() {
        let h = harness();
        track(&h, "m-1", &["r1", "r2"], 0).await;
        h.service
            .handle_ack(&ack("m-1", "r1", AckStatus::Delivered))
            .await;

        for now in [30_000u64, 90_000, 210_000, 450_000, 690_000, 930_000] {
            h.service.check_retries_at(now).await;
        }

        let failed: Vec<_> = h
            .store
            .updates()
            .into_iter()
            .filter(|(_, _, s)| *s == DeliveryStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].1, "r2");
    }

    #[tokio::test]
    async fn test_ack_updates_local_and_external_state() {
        let h = harness();
        track(&h, "m-1", &["r1", "r2"], 0).await;

        h.service
            .handle_ack(&ack("m-1", "r1", AckStatus::Delivered))
            .await;

        let delivery = h.service.get_pending_delivery("m-1").await.expect("tracked");
        assert_eq!(
            delivery.recipient_statuses.get("r1"),
            Some(&DeliveryStatus::Delivered)
        );
        assert_eq!(
            delivery.recipient_statuses.get("r2"),
            Some(&DeliveryStatus::Announced)
        );
        assert_eq!(
            h.store.updates(),
            vec![("m-1".to_string(), "r1".to_string(), DeliveryStatus::Delivered)]
        );
        assert!(h.emitter.events().is_empty(), "not fully delivered yet");
    }

    #[tokio::test]
    async fn test_full_delivery_emits_once_and_untracks() {
        let h = harness();
        track(&h, "m-1", &["r1", "r2", "r3"], 0).await;

        h.service.handle_ack(&ack("m-1", "r1", AckStatus::Delivered)).await;
        h.service.handle_ack(&ack("m-1", "r2", AckStatus::Delivered)).await;
        assert!(h.emitter.events().is_empty());

        h.service.handle_ack(&ack("m-1", "r3", AckStatus::Delivered)).await;
        let events = h.emitter.events();
        assert_eq!(events, vec![(MessageEventKind::Delivered, "m-1".to_string())]);
        assert_eq!(h.service.get_pending_count().await, 0);

        // A late ack after removal is ignored.
        h.service.handle_ack(&ack("m-1", "r1", AckStatus::Read)).await;
        assert_eq!(h.emitter.events().len(), 1);
    }

    #[tokio::test]
    async fn test_read_counts_as_settled() {
        let h = harness();
        track(&h, "m-1", &["r1"], 0).await;
        h.service.handle_ack(&ack("m-1", "r1", AckStatus::Delivered)).await;
        assert_eq!(h.service.get_pending_count().await, 0);

        let h = harness();
        track(&h, "m-2", &["r1", "r2"], 0).await;
        h.service.handle_ack(&ack("m-2", "r1", AckStatus::Delivered)).await;
        h.service.handle_ack(&ack("m-2", "r1", AckStatus::Read)).await;
        assert_eq!(h.service.get_pending_count().await, 1, "r2 still outstanding");
        h.service.handle_ack(&ack("m-2", "r2", AckStatus::Delivered)).await;
        assert_eq!(h.service.get_pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_message_ack_ignored() {
        let h = harness();
        track(&h, "m-1", &["r1"], 0).await;

        h.service.handle_ack(&ack("m-9", "r1", AckStatus::Delivered)).await;
        assert!(h.store.updates().is_empty(), "external store untouched");
        assert_eq!(h.service.get_pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_recipient_ack_ignored() {
        let h = harness();
        track(&h, "m-1", &["r1"], 0).await;

        h.service.handle_ack(&ack("m-1", "stranger", AckStatus::Delivered)).await;
        assert!(h.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_transition_ignored() {
        let h = harness();
        track(&h, "m-1", &["r1"], 0).await;

        // Announced -> Read is not a valid transition.
        h.service.handle_ack(&ack("m-1", "r1", AckStatus::Read)).await;
        assert!(h.store.updates().is_empty());
        let delivery = h.service.get_pending_delivery("m-1").await.expect("tracked");
        assert_eq!(
            delivery.recipient_statuses.get("r1"),
            Some(&DeliveryStatus::Announced)
        );

        // Bounced is terminal; a later delivered ack is suppressed.
        h.service.handle_ack(&ack("m-1", "r1", AckStatus::Bounced)).await;
        h.service.handle_ack(&ack("m-1", "r1", AckStatus::Delivered)).await;
        let delivery = h.service.get_pending_delivery("m-1").await.expect("tracked");
        assert_eq!(
            delivery.recipient_statuses.get("r1"),
            Some(&DeliveryStatus::Bounced)
        );
        assert_eq!(h.store.updates().len(), 1, "only the bounce was recorded");
    }

    #[tokio::test]
    async fn test_stop_leaves_pending_map_intact() {
        let h = harness();
        track(&h, "m-1", &["r1"], 0).await;
        h.service.start().await;
        h.service.stop().await;
        assert_eq!(h.service.get_pending_count().await, 1);
        assert!(h.emitter.events().is_empty());
    }

    #[tokio::test]
    async fn test_independent_deliveries_tracked_separately() {
        let h = harness();
        track(&h, "m-1", &["r1"], 0).await;
        track(&h, "m-2", &["r1"], 0).await;
        assert_eq!(h.service.get_pending_count().await, 2);

        h.service.handle_ack(&ack("m-1", "r1", AckStatus::Delivered)).await;
        assert_eq!(h.service.get_pending_count().await, 1);
        assert!(h.service.get_pending_delivery("m-2").await.is_some());
    }
}

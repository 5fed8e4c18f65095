//! The BrightChain node facade.
//!
//! Composes a block store, the gossip service, and the retry service into
//! the end-to-end flows. The gossip service is shared by reference with
//! the retry service and outlives it; the store is the node's single
//! shared mutable resource, guarded for single-writer access.
//!
//! Inbound announcements are dispatched off the gossip receive path
//! through an unbounded channel so subscribers never re-enter the gossip
//! service while it holds its own state.

use std::collections::HashSet;
use std::sync::Arc;

use brightchain_crypto::random;
use brightchain_gossip::location::{BlockLocation, BlockLocationIndex, CblIndex};
use brightchain_gossip::retry::RetryService;
use brightchain_gossip::service::GossipService;
use brightchain_gossip::traits::{
    DeliveryStatusStore, MessageEventEmitter, MessageEventKind, NetworkTransport,
};
use brightchain_store::block::BlockStore;
use brightchain_store::cbl::{CblBlockRef, CblHeader};
use brightchain_store::file::{self, FileReceipt};
use brightchain_store::magnet::{self, MagnetLink};
use brightchain_store::whiten;
use brightchain_store::StoreError;
use brightchain_types::announcement::{
    AckStatus, AnnouncementKind, BlockAnnouncement, CblIndexEntry, DeliveryAckMetadata,
    MessageDeliveryMetadata, MessagePriority,
};
use brightchain_types::checksum::Checksum;
use brightchain_types::pool::PoolId;
use brightchain_types::CBL_VERSION;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::events::EventBus;
use crate::{NodeError, Result};

/// Reactions to inbound announcements, shared with the dispatch task.
#[derive(Clone)]
struct Dispatcher {
    node_id: String,
    gossip: Arc<GossipService>,
    retry: Arc<RetryService>,
    events: EventBus,
    location: Arc<Mutex<BlockLocationIndex>>,
    cbl_index: Arc<Mutex<CblIndex>>,
    seen_messages: Arc<Mutex<HashSet<String>>>,
}

impl Dispatcher {
    async fn dispatch(&self, announcement: BlockAnnouncement) {
        match announcement.kind {
            AnnouncementKind::Add => {
                self.location.lock().await.apply(&announcement);
                if let Some(metadata) = &announcement.message_delivery {
                    self.handle_message_announcement(&announcement, metadata).await;
                }
            }
            AnnouncementKind::Remove | AnnouncementKind::PoolDeleted => {
                self.location.lock().await.apply(&announcement);
            }
            AnnouncementKind::Ack => {
                if let Some(ack) = &announcement.delivery_ack {
                    if ack.original_sender_node == self.node_id {
                        self.retry.handle_ack(ack).await;
                    }
                }
            }
            AnnouncementKind::CblIndexUpdate | AnnouncementKind::CblIndexDelete => {
                self.cbl_index.lock().await.apply(&announcement);
            }
        }
    }

    /// React to a message-bearing announcement addressed to this node:
    /// emit `message:received` once per message and auto-ack delivery.
    async fn handle_message_announcement(
        &self,
        announcement: &BlockAnnouncement,
        metadata: &MessageDeliveryMetadata,
    ) {
        if !metadata.recipient_ids.iter().any(|r| r == &self.node_id) {
            return;
        }
        if !self
            .seen_messages
            .lock()
            .await
            .insert(metadata.message_id.clone())
        {
            return;
        }

        tracing::info!(
            message_id = %metadata.message_id,
            sender = %announcement.node_id,
            "message received"
        );
        self.events.emit(MessageEventKind::Received, metadata);

        if metadata.ack_required {
            self.gossip
                .send_delivery_ack(DeliveryAckMetadata {
                    message_id: metadata.message_id.clone(),
                    recipient_id: self.node_id.clone(),
                    status: AckStatus::Delivered,
                    original_sender_node: announcement.node_id.clone(),
                })
                .await;
        }
    }
}

/// A BrightChain node.
pub struct BrightChainNode {
    config: NodeConfig,
    store: Arc<Mutex<dyn BlockStore + Send>>,
    transport: Arc<dyn NetworkTransport>,
    dispatcher: Dispatcher,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<BlockAnnouncement>>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl BrightChainNode {
    /// Assemble a node from its injected collaborators.
    pub async fn new(
        config: NodeConfig,
        store: impl BlockStore + Send + 'static,
        transport: Arc<dyn NetworkTransport>,
        status_store: Arc<dyn DeliveryStatusStore>,
    ) -> Result<Self> {
        if !config.validate() {
            return Err(NodeError::ConfigInvalid(
                "node id, block size, and service configs must be valid".to_string(),
            ));
        }

        let events = EventBus::new(256);
        let gossip = Arc::new(GossipService::new(
            config.gossip.clone(),
            config.node_id.clone(),
            transport.clone(),
        )?);
        let retry = Arc::new(RetryService::new(
            config.retry,
            gossip.clone(),
            status_store,
            Arc::new(events.clone()),
        )?);

        let (tx, rx) = mpsc::unbounded_channel();
        gossip
            .on_announcement(Arc::new(move |announcement: &BlockAnnouncement| {
                // Receiver gone means the node stopped; drop silently.
                let _ = tx.send(announcement.clone());
            }))
            .await;

        let dispatcher = Dispatcher {
            node_id: config.node_id.clone(),
            gossip,
            retry,
            events,
            location: Arc::new(Mutex::new(BlockLocationIndex::new())),
            cbl_index: Arc::new(Mutex::new(CblIndex::new())),
            seen_messages: Arc::new(Mutex::new(HashSet::new())),
        };

        Ok(Self {
            config,
            store: Arc::new(Mutex::new(store)),
            transport,
            dispatcher,
            inbox: Mutex::new(Some(rx)),
            dispatch: Mutex::new(None),
        })
    }

    /// The node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The node's event bus.
    pub fn events(&self) -> &EventBus {
        &self.dispatcher.events
    }

    /// The node's gossip service.
    pub fn gossip(&self) -> &Arc<GossipService> {
        &self.dispatcher.gossip
    }

    /// The node's retry service.
    pub fn retry(&self) -> &Arc<RetryService> {
        &self.dispatcher.retry
    }

    /// Start the gossip tick, retry tick, and announcement dispatch.
    pub async fn start(&self) {
        self.dispatcher.gossip.start().await;
        self.dispatcher.retry.start().await;

        let mut dispatch = self.dispatch.lock().await;
        if dispatch.is_some() {
            return;
        }
        let Some(mut inbox) = self.inbox.lock().await.take() else {
            return;
        };
        let dispatcher = self.dispatcher.clone();
        *dispatch = Some(tokio::spawn(async move {
            while let Some(announcement) = inbox.recv().await {
                dispatcher.dispatch(announcement).await;
            }
        }));
        tracing::info!(node_id = %self.config.node_id, "node started");
    }

    /// Stop dispatch and both services. Tracked deliveries stay inspectable.
    pub async fn stop(&self) {
        if let Some(handle) = self.dispatch.lock().await.take() {
            handle.abort();
        }
        self.dispatcher.retry.stop().await;
        self.dispatcher.gossip.stop().await;
        tracing::info!(node_id = %self.config.node_id, "node stopped");
    }

    /// Feed an announcement received from the network into the node.
    pub async fn handle_announcement(&self, announcement: BlockAnnouncement) {
        self.dispatcher.gossip.handle_announcement(announcement).await;
    }

    /// Chop a file into pool blocks, announce them, and return a receipt.
    pub async fn store_file(&self, data: &[u8], file_name: &str) -> Result<FileReceipt> {
        let receipt = {
            let mut store = self.store.lock().await;
            file::store_file(&mut *store, data, file_name)?
        };

        let mut announced = HashSet::new();
        for block in &receipt.blocks {
            if announced.insert(block.id) {
                self.dispatcher.gossip.announce_block(&block.id).await;
            }
        }
        Ok(receipt)
    }

    /// Reassemble a file from a receipt.
    pub async fn retrieve_file(&self, receipt: &FileReceipt) -> Result<Vec<u8>> {
        let store = self.store.lock().await;
        Ok(file::retrieve_file(&*store, &receipt.header())?)
    }

    /// Remove a block from the pool and announce the removal.
    pub async fn delete_block(&self, block_id: &Checksum) -> Result<()> {
        {
            let mut store = self.store.lock().await;
            store.delete(block_id)?;
        }
        self.dispatcher.gossip.announce_removal(block_id).await;
        Ok(())
    }

    /// Announce deletion of an entire pool.
    pub async fn announce_pool_deletion(&self, pool_id: PoolId) {
        self.dispatcher.gossip.announce_pool_deletion(pool_id).await;
    }

    /// Store a file and whiten its CBL; returns the whitened-CBL magnet URL.
    pub async fn store_file_whitened(&self, data: &[u8], file_name: &str) -> Result<String> {
        let receipt = self.store_file(data, file_name).await?;
        let cbl_bytes = receipt.header().encode()?;

        let whitened = {
            let mut store = self.store.lock().await;
            whiten::encode_whitened(&mut *store, &cbl_bytes)?
        };

        self.dispatcher
            .gossip
            .announce_cbl_index_update(CblIndexEntry {
                magnet_url: whitened.magnet_url.clone(),
                block_id1: whitened.randomizer_ids[0].to_hex(),
                block_id2: whitened.whitened_ids[0].to_hex(),
            })
            .await;

        Ok(whitened.magnet_url)
    }

    /// Retrieve a file through either magnet grammar.
    pub async fn retrieve_by_magnet(&self, url: &str) -> Result<Vec<u8>> {
        match magnet::parse(url)? {
            MagnetLink::WhitenedCbl(link) => {
                let store = self.store.lock().await;
                let cbl_bytes = whiten::decode_whitened(
                    &*store,
                    &link.block1,
                    &link.block2,
                    &link.extra1,
                    &link.extra2,
                )?;
                let header = CblHeader::decode(&cbl_bytes)?;
                Ok(file::retrieve_file(&*store, &header)?)
            }
            MagnetLink::FileReceipt(link) => {
                let header = CblHeader {
                    version: CBL_VERSION,
                    file_name: link.file_name,
                    original_size: link.original_size,
                    block_count: link.blocks.len() as u32,
                    blocks: link
                        .blocks
                        .iter()
                        .map(|(id, size)| CblBlockRef {
                            id: id.to_hex(),
                            size: *size,
                        })
                        .collect(),
                };
                let store = self.store.lock().await;
                Ok(file::retrieve_file(&*store, &header)?)
            }
        }
    }

    /// Store a message's payload and CBL, announce it to recipients, and
    /// (when acks are required) begin delivery tracking.
    pub async fn send_message(
        &self,
        recipient_ids: Vec<String>,
        payload: &[u8],
        priority: MessagePriority,
        ack_required: bool,
    ) -> Result<String> {
        if payload.is_empty() {
            return Err(NodeError::Store(StoreError::InvalidFormat(
                "message payload must not be empty".to_string(),
            )));
        }

        let message_id = random::random_hex(16);
        let (receipt, cbl_ids) = {
            let mut store = self.store.lock().await;
            let receipt = file::store_file(&mut *store, payload, &format!("msg-{message_id}"))?;
            let cbl_bytes = receipt.header().encode()?;
            let cbl_ids = whiten::store_padded(&mut *store, &cbl_bytes)?;
            (receipt, cbl_ids)
        };
        if cbl_ids.len() != 1 {
            return Err(NodeError::Store(StoreError::InvalidFormat(
                "message CBL exceeds one block; use a larger block size".to_string(),
            )));
        }

        let block_ids: Vec<String> = receipt.blocks.iter().map(|b| b.id.to_hex()).collect();
        let metadata = MessageDeliveryMetadata {
            message_id: message_id.clone(),
            recipient_ids,
            priority,
            block_ids: block_ids.clone(),
            cbl_block_id: cbl_ids[0].to_hex(),
            ack_required,
        };

        self.dispatcher
            .gossip
            .announce_message(&block_ids, metadata.clone())
            .await;
        if ack_required {
            self.dispatcher
                .retry
                .track_delivery(&message_id, block_ids, metadata.clone())
                .await;
        }

        // Best-effort direct handoff to recipients that answer on the
        // transport. Gossip plus the retry machine remain authoritative
        // for delivery status; a failed handoff here is only logged.
        for recipient in &metadata.recipient_ids {
            if self.transport.is_node_reachable(recipient).await
                && !self.transport.send_to_node(recipient, &message_id).await
            {
                tracing::warn!(
                    message_id = %message_id,
                    recipient = %recipient,
                    "direct handoff failed, relying on gossip"
                );
            }
        }

        self.dispatcher.events.emit(MessageEventKind::Stored, &metadata);

        tracing::info!(
            message_id = %message_id,
            recipients = metadata.recipient_ids.len(),
            blocks = metadata.block_ids.len(),
            "message stored and announced"
        );
        Ok(message_id)
    }

    /// Load a message payload back out of the local pool via its CBL block.
    pub async fn load_message(&self, cbl_block_id: &str) -> Result<Vec<u8>> {
        let id = Checksum::from_hex(cbl_block_id)
            .map_err(|e| StoreError::InvalidFormat(e.to_string()))?;
        let store = self.store.lock().await;
        let cbl_bytes = whiten::load_padded(&*store, &[id])?;
        let header = CblHeader::decode(&cbl_bytes)?;
        Ok(file::retrieve_file(&*store, &header)?)
    }

    /// Known locations of a block, from gossip.
    pub async fn block_locations(&self, block_id: &str) -> Vec<BlockLocation> {
        self.dispatcher.location.lock().await.locations(block_id)
    }

    /// Known locations of a block within one pool.
    pub async fn block_locations_in_pool(
        &self,
        block_id: &str,
        pool_id: &PoolId,
    ) -> Vec<BlockLocation> {
        self.dispatcher
            .location
            .lock()
            .await
            .locations_in_pool(block_id, pool_id)
    }

    /// Magnet URL of an indexed whitened-CBL pair, from gossip.
    pub async fn cbl_magnet_for(&self, block_id1: &str, block_id2: &str) -> Option<String> {
        self.dispatcher
            .cbl_index
            .lock()
            .await
            .magnet_for(block_id1, block_id2)
            .map(str::to_string)
    }
}

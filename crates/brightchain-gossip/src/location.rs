//! In-memory block-location and CBL indexes fed by gossip.
//!
//! The location index answers "which nodes hold this block, in which
//! pools". Entries are keyed by the `(nodeId, poolId)` composite, so the
//! same node may hold a block in several pools and a pool-scoped query
//! returns only that pool's entries. `pool_deleted` announcements drop an
//! entire pool at once.
//!
//! The CBL index maps whitened block pairs to their magnet URLs, fed by
//! `cbl_index_update`/`cbl_index_delete` announcements.
//!
//! Both indexes are in-memory views; durable location storage is a host
//! concern.

use std::collections::HashMap;

use brightchain_types::announcement::{AnnouncementKind, BlockAnnouncement, CblIndexEntry};
use brightchain_types::pool::PoolId;

/// Composite key of one block location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocationKey {
    /// The holding node.
    pub node_id: String,
    /// The pool the block belongs to on that node, if any.
    pub pool_id: Option<PoolId>,
}

/// One known location of a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLocation {
    /// The holding node.
    pub node_id: String,
    /// The pool the block belongs to on that node, if any.
    pub pool_id: Option<PoolId>,
    /// When the location was last announced, milliseconds since the epoch.
    pub announced_at: u64,
}

/// Block-location index keyed by block id, then `(nodeId, poolId)`.
#[derive(Debug, Default)]
pub struct BlockLocationIndex {
    blocks: HashMap<String, HashMap<LocationKey, u64>>,
}

impl BlockLocationIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a block location.
    pub fn record(
        &mut self,
        block_id: &str,
        node_id: &str,
        pool_id: Option<PoolId>,
        announced_at: u64,
    ) {
        let key = LocationKey {
            node_id: node_id.to_string(),
            pool_id,
        };
        self.blocks
            .entry(block_id.to_string())
            .or_default()
            .insert(key, announced_at);
    }

    /// Remove one block location. Returns whether an entry was removed.
    pub fn remove(&mut self, block_id: &str, node_id: &str, pool_id: Option<&PoolId>) -> bool {
        let Some(locations) = self.blocks.get_mut(block_id) else {
            return false;
        };
        let key = LocationKey {
            node_id: node_id.to_string(),
            pool_id: pool_id.cloned(),
        };
        let removed = locations.remove(&key).is_some();
        if locations.is_empty() {
            self.blocks.remove(block_id);
        }
        removed
    }

    /// Drop every location belonging to a pool.
    pub fn remove_pool(&mut self, pool_id: &PoolId) {
        self.blocks.retain(|_, locations| {
            locations.retain(|key, _| key.pool_id.as_ref() != Some(pool_id));
            !locations.is_empty()
        });
    }

    /// All known locations of a block.
    pub fn locations(&self, block_id: &str) -> Vec<BlockLocation> {
        self.blocks
            .get(block_id)
            .map(|locations| {
                locations
                    .iter()
                    .map(|(key, announced_at)| BlockLocation {
                        node_id: key.node_id.clone(),
                        pool_id: key.pool_id.clone(),
                        announced_at: *announced_at,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Locations of a block filtered to one pool.
    pub fn locations_in_pool(&self, block_id: &str, pool_id: &PoolId) -> Vec<BlockLocation> {
        self.locations(block_id)
            .into_iter()
            .filter(|location| location.pool_id.as_ref() == Some(pool_id))
            .collect()
    }

    /// Number of indexed blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Apply a validated gossip announcement to the index.
    pub fn apply(&mut self, announcement: &BlockAnnouncement) {
        match announcement.kind {
            AnnouncementKind::Add => {
                self.record(
                    &announcement.block_id,
                    &announcement.node_id,
                    announcement.pool_id.clone(),
                    announcement.timestamp,
                );
            }
            AnnouncementKind::Remove => {
                self.remove(
                    &announcement.block_id,
                    &announcement.node_id,
                    announcement.pool_id.as_ref(),
                );
            }
            AnnouncementKind::PoolDeleted => {
                if let Some(pool_id) = &announcement.pool_id {
                    self.remove_pool(pool_id);
                }
            }
            _ => {}
        }
    }
}

/// Index of whitened-CBL magnet URLs keyed by block pair.
#[derive(Debug, Default)]
pub struct CblIndex {
    entries: HashMap<(String, String), CblIndexEntry>,
}

impl CblIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an entry.
    pub fn upsert(&mut self, entry: CblIndexEntry) {
        self.entries
            .insert((entry.block_id1.clone(), entry.block_id2.clone()), entry);
    }

    /// Remove an entry by block pair. Returns whether it existed.
    pub fn remove(&mut self, block_id1: &str, block_id2: &str) -> bool {
        self.entries
            .remove(&(block_id1.to_string(), block_id2.to_string()))
            .is_some()
    }

    /// Look up the magnet URL of a block pair.
    pub fn magnet_for(&self, block_id1: &str, block_id2: &str) -> Option<&str> {
        self.entries
            .get(&(block_id1.to_string(), block_id2.to_string()))
            .map(|entry| entry.magnet_url.as_str())
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a validated gossip announcement to the index.
    pub fn apply(&mut self, announcement: &BlockAnnouncement) {
        let Some(entry) = &announcement.cbl_index_entry else {
            return;
        };
        match announcement.kind {
            AnnouncementKind::CblIndexUpdate => self.upsert(entry.clone()),
            AnnouncementKind::CblIndexDelete => {
                self.remove(&entry.block_id1, &entry.block_id2);
            }
            _ => {}
        }
    }
}

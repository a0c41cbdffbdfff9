//! Bounded append-only sync audit log.
//!
//! Ring-buffer semantics: once the configured capacity is reached the
//! oldest entry is evicted. Eviction is normal operation, not an error.

use crate::store::{ConfigStore, RecordKind};
use replica_common::SyncLogEntry;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

pub struct SyncLog {
    entries: RwLock<VecDeque<SyncLogEntry>>,
    capacity: usize,
    store: Arc<dyn ConfigStore>,
}

impl SyncLog {
    pub fn new(capacity: usize, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            store,
        }
    }

    /// Append one entry, evicting the oldest when over capacity
    pub async fn append(&self, entry: SyncLogEntry) {
        // write-through for restart recovery; failure only loses audit depth
        match serde_json::to_value(&entry) {
            Ok(record) => {
                if let Err(e) = self.store.insert(RecordKind::SyncLog, &entry.id, record).await {
                    warn!("Could not persist sync log entry {}: {}", entry.id, e);
                }
            }
            Err(e) => warn!("Could not encode sync log entry {}: {}", entry.id, e),
        }

        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            if let Some(evicted) = entries.pop_front() {
                if let Err(e) = self.store.remove(RecordKind::SyncLog, &evicted.id).await {
                    warn!("Could not drop evicted sync log entry {}: {}", evicted.id, e);
                }
            }
        }
        entries.push_back(entry);
    }

    /// Most recent `limit` entries, newest first, optionally filtered to
    /// those touching `instance_id` as source or target
    pub async fn recent(&self, instance_id: Option<&str>, limit: usize) -> Vec<SyncLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| instance_id.map_or(true, |id| e.touches(id)))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

//! Instance registry - authoritative table of known instances.
//!
//! Keyed by instance id, write-through persisted for restart recovery.
//! Status and telemetry updates on unknown ids are silent no-ops so
//! producers never need to know whether they have been evicted.

use crate::store::{ConfigStore, RecordKind};
use chrono::{DateTime, Duration, Utc};
use replica_common::{InstanceInfo, InstanceStatus, ReplicaError, Result, TelemetryPatch};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Aggregate instance counts for the system overview
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InstanceCounts {
    pub total: usize,
    pub active: usize,
    pub syncing: usize,
    pub offline: usize,
    /// Mean sync percentage across all instances; 0 when empty
    pub average_sync_percentage: f64,
}

pub struct InstanceRegistry {
    instances: Arc<RwLock<HashMap<String, InstanceInfo>>>,
    store: Arc<dyn ConfigStore>,
}

impl InstanceRegistry {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            store,
        }
    }

    /// Reload registry entries persisted by a previous run
    pub async fn restore(&self) -> Result<usize> {
        let records = self.store.query(RecordKind::Instance).await?;
        let mut instances = self.instances.write().await;
        let mut restored = 0;
        for record in records {
            match serde_json::from_value::<InstanceInfo>(record) {
                Ok(info) => {
                    instances.insert(info.id.clone(), info);
                    restored += 1;
                }
                Err(e) => warn!("Skipping unreadable instance record: {}", e),
            }
        }
        if restored > 0 {
            info!("Restored {} instance records", restored);
        }
        Ok(restored)
    }

    /// Upsert an instance; refreshes `last_seen`. Idempotent on id.
    pub async fn register(&self, mut info: InstanceInfo) -> Result<()> {
        info.last_seen = Utc::now();
        let record = serde_json::to_value(&info)
            .map_err(|e| ReplicaError::Persistence(format!("encode instance: {e}")))?;
        // Persist first so a store failure leaves no half-registered entry
        self.store.insert(RecordKind::Instance, &info.id, record).await?;

        info!("Registered instance {} ({})", info.id, info.name);
        self.instances.write().await.insert(info.id.clone(), info);
        Ok(())
    }

    /// Remove an entry entirely (distinct from deactivation).
    ///
    /// The durable record goes first: if the store rejects the removal the
    /// live entry stays put, instead of lingering in the store and
    /// resurrecting on the next restore.
    pub async fn unregister(&self, id: &str) -> Result<InstanceInfo> {
        if !self.instances.read().await.contains_key(id) {
            return Err(ReplicaError::not_found("instance", id));
        }
        self.store.remove(RecordKind::Instance, id).await?;
        match self.instances.write().await.remove(id) {
            Some(info) => {
                info!("Unregistered instance {}", id);
                Ok(info)
            }
            None => Err(ReplicaError::not_found("instance", id)),
        }
    }

    pub async fn get(&self, id: &str) -> Option<InstanceInfo> {
        self.instances.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.instances.read().await.contains_key(id)
    }

    /// All entries, optionally filtered by status. Order is unspecified.
    pub async fn list(&self, filter: Option<InstanceStatus>) -> Vec<InstanceInfo> {
        self.instances
            .read()
            .await
            .values()
            .filter(|i| filter.map_or(true, |s| i.status == s))
            .cloned()
            .collect()
    }

    pub async fn list_active(&self) -> Vec<InstanceInfo> {
        self.list(Some(InstanceStatus::Active)).await
    }

    /// Set status and refresh `last_seen`. Unknown id is a silent no-op.
    pub async fn update_status(&self, id: &str, status: InstanceStatus) {
        let mut instances = self.instances.write().await;
        let Some(info) = instances.get_mut(id) else {
            debug!("Status update for unknown instance {} ignored", id);
            return;
        };
        if !info.status.can_transition(status) {
            warn!(
                "Instance {} status {} -> {} is outside the expected lifecycle",
                id, info.status, status
            );
        }
        info.status = status;
        info.last_seen = Utc::now();
        let snapshot = info.clone();
        drop(instances);
        self.persist_best_effort(&snapshot).await;
    }

    /// Merge a telemetry patch and refresh `last_seen` (telemetry pushes
    /// count as heartbeats). Unknown id is a silent no-op.
    pub async fn update_telemetry(&self, id: &str, patch: &TelemetryPatch) {
        let mut instances = self.instances.write().await;
        let Some(info) = instances.get_mut(id) else {
            debug!("Telemetry for unknown instance {} ignored", id);
            return;
        };
        info.telemetry.apply(patch);
        info.last_seen = Utc::now();
        let snapshot = info.clone();
        drop(instances);
        self.persist_best_effort(&snapshot).await;
    }

    /// Sync-completion hook: record `last_sync` and full sync percentage
    pub async fn mark_synced(&self, id: &str, at: DateTime<Utc>) {
        let mut instances = self.instances.write().await;
        let Some(info) = instances.get_mut(id) else {
            return;
        };
        info.last_sync = Some(at);
        info.sync_percentage = 100;
        let snapshot = info.clone();
        drop(instances);
        self.persist_best_effort(&snapshot).await;
    }

    /// Demote entries silent for longer than `timeout` to offline.
    /// Returns the demoted ids. Only the status field changes; `last_seen`
    /// is deliberately left untouched so the silence stays observable.
    /// Revoked clones rest at inactive and never heartbeat, so they are
    /// exempt alongside entries already offline.
    pub async fn sweep_offline(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<String> {
        let mut demoted = Vec::new();
        let mut snapshots = Vec::new();
        {
            let mut instances = self.instances.write().await;
            for info in instances.values_mut() {
                if matches!(
                    info.status,
                    InstanceStatus::Offline | InstanceStatus::Inactive
                ) {
                    continue;
                }
                if now.signed_duration_since(info.last_seen) > timeout {
                    info.status = InstanceStatus::Offline;
                    demoted.push(info.id.clone());
                    snapshots.push(info.clone());
                }
            }
        }
        for snapshot in &snapshots {
            self.persist_best_effort(snapshot).await;
        }
        demoted
    }

    /// Aggregate counts for the system overview
    pub async fn counts(&self) -> InstanceCounts {
        let instances = self.instances.read().await;
        let total = instances.len();
        let mut counts = InstanceCounts {
            total,
            ..Default::default()
        };
        if total == 0 {
            return counts;
        }
        let mut percentage_sum: u64 = 0;
        for info in instances.values() {
            match info.status {
                InstanceStatus::Active => counts.active += 1,
                InstanceStatus::Syncing => counts.syncing += 1,
                InstanceStatus::Offline => counts.offline += 1,
                _ => {}
            }
            percentage_sum += info.sync_percentage as u64;
        }
        counts.average_sync_percentage = percentage_sum as f64 / total as f64;
        counts
    }

    /// Updates outside the registration path must not fail callers
    async fn persist_best_effort(&self, info: &InstanceInfo) {
        let record = match serde_json::to_value(info) {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not encode instance {}: {}", info.id, e);
                return;
            }
        };
        if let Err(e) = self.store.update(RecordKind::Instance, &info.id, record).await {
            warn!("Could not persist instance {}: {}", info.id, e);
        }
    }
}

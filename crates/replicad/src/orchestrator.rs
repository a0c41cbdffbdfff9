//! Composition of the orchestration core.
//!
//! Owns one registry, monitor, factory, and sync engine, wired together
//! over a shared durable store. Constructed explicitly and passed by
//! reference; the only process-wide instance lives in the daemon binary.

use crate::cache::LocalCache;
use crate::collectors::{CollectorSet, Identity};
use crate::factory::SnapshotFactory;
use crate::monitor::HealthMonitor;
use crate::registry::{InstanceCounts, InstanceRegistry};
use crate::store::ConfigStore;
use crate::sync::SyncEngine;
use crate::synclog::SyncLog;
use chrono::{DateTime, Utc};
use replica_common::{ModelParameters, ReplicaConfig, ReplicaError, Result, SyncLogEntry};
use std::sync::Arc;

/// Per-instance synchronization status
#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncStatusReport {
    pub instance_id: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub sync_percentage: u8,
    /// Operations for this instance not yet terminal
    pub active_operations: usize,
    /// The 10 most recent log entries touching this instance
    pub recent_logs: Vec<SyncLogEntry>,
}

/// Aggregate system counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct SystemOverview {
    pub instances: InstanceCounts,
    pub pending_operations: usize,
    pub completed_operations: usize,
}

pub struct Orchestrator {
    registry: Arc<InstanceRegistry>,
    monitor: HealthMonitor,
    factory: SnapshotFactory,
    engine: SyncEngine,
}

impl Orchestrator {
    pub fn new(
        config: &ReplicaConfig,
        store: Arc<dyn ConfigStore>,
        cache: Arc<LocalCache>,
        collectors: CollectorSet,
        identity: Arc<dyn Identity>,
    ) -> Self {
        let registry = Arc::new(InstanceRegistry::new(Arc::clone(&store)));
        let log = Arc::new(SyncLog::new(config.sync.log_capacity, Arc::clone(&store)));
        let monitor = HealthMonitor::new(Arc::clone(&registry), config.heartbeat.clone());
        let engine = SyncEngine::new(
            Arc::clone(&registry),
            log,
            Arc::clone(&store),
            Arc::clone(&identity),
            config.sync.clone(),
        );
        let factory = SnapshotFactory::new(
            collectors,
            identity,
            store,
            cache,
            Arc::clone(&registry),
            config.snapshot.clone(),
            ModelParameters::default(),
        );

        Self {
            registry,
            monitor,
            factory,
            engine,
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    pub fn factory(&self) -> &SnapshotFactory {
        &self.factory
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Reload persisted registry entries after a restart
    pub async fn restore(&self) -> Result<usize> {
        self.registry.restore().await
    }

    /// Sync status for one instance. The only strict registry read:
    /// unknown ids fail with `NotFound`.
    pub async fn get_sync_status(&self, instance_id: &str) -> Result<SyncStatusReport> {
        let info = self
            .registry
            .get(instance_id)
            .await
            .ok_or_else(|| ReplicaError::not_found("instance", instance_id))?;

        Ok(SyncStatusReport {
            instance_id: info.id,
            last_sync: info.last_sync,
            sync_percentage: info.sync_percentage,
            active_operations: self.engine.non_terminal_count(instance_id).await,
            recent_logs: self.engine.get_sync_logs(Some(instance_id), 10).await,
        })
    }

    /// Aggregate counts across instances and operations. All zeros (and a
    /// zero average) on an empty registry.
    pub async fn get_system_overview(&self) -> SystemOverview {
        let instances = self.registry.counts().await;
        let (pending_operations, completed_operations) = self.engine.operation_counts().await;
        SystemOverview {
            instances,
            pending_operations,
            completed_operations,
        }
    }
}

//! Snapshot & clone factory.
//!
//! Captures point-in-time configurations of the running system and derives
//! deployable clone configurations from them. Persistence ordering matters:
//! a clone is written to the durable store and the local cache before its
//! instance record enters the live registry, so a store failure never
//! leaves a half-registered instance.

use crate::cache::LocalCache;
use crate::collectors::{CollectorSet, Identity};
use crate::registry::InstanceRegistry;
use crate::store::{ConfigStore, RecordKind};
use chrono::Utc;
use replica_common::config::SnapshotSettings;
use replica_common::{
    CloneConfiguration, CloneOptions, CloneSnapshot, Deployment, InstanceCapabilities,
    InstanceInfo, InstanceStatus, ModelParameters, ReplicaError, Result, SnapshotContext,
    SnapshotMeta, SNAPSHOT_SCHEMA_VERSION,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct SnapshotFactory {
    collectors: CollectorSet,
    identity: Arc<dyn Identity>,
    store: Arc<dyn ConfigStore>,
    cache: Arc<LocalCache>,
    registry: Arc<InstanceRegistry>,
    settings: SnapshotSettings,
    model: ModelParameters,
}

impl SnapshotFactory {
    pub fn new(
        collectors: CollectorSet,
        identity: Arc<dyn Identity>,
        store: Arc<dyn ConfigStore>,
        cache: Arc<LocalCache>,
        registry: Arc<InstanceRegistry>,
        settings: SnapshotSettings,
        model: ModelParameters,
    ) -> Self {
        Self {
            collectors,
            identity,
            store,
            cache,
            registry,
            settings,
            model,
        }
    }

    /// Capture the current system configuration and context.
    ///
    /// A failing memory or preference source degrades to an empty field; a
    /// failing module source aborts the capture (`Collector`).
    pub async fn create_snapshot(&self, name: Option<&str>) -> Result<CloneSnapshot> {
        let outcome = self.collectors.gather(self.settings.memory_window)?;
        if !outcome.errors.is_empty() {
            warn!(
                "Snapshot captured with {} degraded source(s): {}",
                outcome.errors.len(),
                outcome.errors.join("; ")
            );
        }

        let snapshot = CloneSnapshot {
            id: format!("snap-{}", Uuid::new_v4()),
            name: name.map(str::to_string),
            created_at: Utc::now(),
            modules: outcome.modules,
            context: SnapshotContext {
                memories: outcome.memories,
                preferences: outcome.preferences,
                capabilities: outcome.capabilities,
            },
            model: self.model.clone(),
            meta: SnapshotMeta {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                environment: self.settings.environment.clone(),
                source_instance_id: self.identity.instance_id(),
            },
        };

        let record = serde_json::to_value(&snapshot)
            .map_err(|e| ReplicaError::Persistence(format!("encode snapshot: {e}")))?;
        self.store
            .insert(RecordKind::Snapshot, &snapshot.id, record)
            .await?;

        info!(
            "Snapshot {} captured: {} modules, {} memories",
            snapshot.id,
            snapshot.modules.len(),
            snapshot.context.memories.len()
        );
        Ok(snapshot)
    }

    /// Derive a clone configuration and register it as a new instance.
    ///
    /// Appends exactly one clone record and one instance entry (status
    /// active) per successful call.
    pub async fn create_clone(
        &self,
        snapshot: &CloneSnapshot,
        options: CloneOptions,
    ) -> Result<CloneConfiguration> {
        if options.name.trim().is_empty() {
            return Err(ReplicaError::Validation(
                "clone name must not be empty".to_string(),
            ));
        }

        let clone = CloneConfiguration::from_snapshot(
            snapshot,
            &options,
            self.settings.default_context_window,
        );

        // durable store first, then the clone's own working copy
        let record = serde_json::to_value(&clone)
            .map_err(|e| ReplicaError::Persistence(format!("encode clone: {e}")))?;
        self.store
            .insert(RecordKind::CloneConfig, &clone.id, record)
            .await?;

        let context = serde_json::to_value(&clone.context)
            .map_err(|e| ReplicaError::Persistence(format!("encode clone context: {e}")))?;
        self.cache.put(&clone.id, &context).await?;

        let info = InstanceInfo::new(clone.id.clone(), clone.name.clone(), Deployment::Local)
            .with_capabilities(InstanceCapabilities {
                ai_enabled: true,
                persistent_storage: true,
                offline_capable: false,
                max_context_window: clone.context_window,
                supported_modules: clone.modules.clone(),
            });
        self.registry.register(info).await?;

        info!(
            "Clone {} ({}) derived from snapshot {}",
            clone.id, clone.name, snapshot.id
        );
        Ok(clone)
    }

    /// Revoke a clone. The record is retained with status inactive for
    /// auditability, never deleted.
    pub async fn deactivate_clone(&self, id: &str) -> Result<()> {
        if !self.registry.contains(id).await {
            return Err(ReplicaError::not_found("instance", id));
        }
        self.registry
            .update_status(id, InstanceStatus::Inactive)
            .await;
        info!("Clone {} deactivated", id);
        Ok(())
    }
}

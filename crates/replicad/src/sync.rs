//! Sync operation engine.
//!
//! Creates and executes data-synchronization operations against registered
//! instances. Creation is fire-and-forget: the call returns the operation
//! id (plus the task handle for callers that want to await) before any
//! transfer happens; completion is observed by polling or via the sync log.
//!
//! Execution is serialized per instance through a per-instance lock, so
//! only one operation at a time drives a given instance's status.
//! Operations against different instances run concurrently.

use crate::collectors::Identity;
use crate::registry::InstanceRegistry;
use crate::store::{ConfigStore, RecordKind};
use crate::synclog::SyncLog;
use chrono::Utc;
use replica_common::config::SyncSettings;
use replica_common::{
    InstanceStatus, ReplicaError, Result, SyncDirection, SyncLogEntry, SyncOperation,
    SyncPriority, SyncStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Error text recorded on operations cancelled by the caller
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Text stored on failed operations and log entries: the bare transfer
/// failure message, without the error enum's Display framing
fn failure_text(error: &ReplicaError) -> String {
    match error {
        ReplicaError::Execution(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    operations: Arc<RwLock<HashMap<String, SyncOperation>>>,
    cancel_flags: Arc<RwLock<HashMap<String, Arc<AtomicBool>>>>,
    instance_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    registry: Arc<InstanceRegistry>,
    log: Arc<SyncLog>,
    store: Arc<dyn ConfigStore>,
    identity: Arc<dyn Identity>,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        log: Arc<SyncLog>,
        store: Arc<dyn ConfigStore>,
        identity: Arc<dyn Identity>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            operations: Arc::new(RwLock::new(HashMap::new())),
            cancel_flags: Arc::new(RwLock::new(HashMap::new())),
            instance_locks: Arc::new(Mutex::new(HashMap::new())),
            registry,
            log,
            store,
            identity,
            settings,
        }
    }

    /// Create a pending operation and schedule its execution.
    ///
    /// Returns before the transfer runs. The handle may be awaited for
    /// synchronous behavior or dropped; the task runs either way.
    pub async fn create_sync_operation(
        &self,
        instance_id: &str,
        direction: SyncDirection,
        categories: Vec<String>,
        priority: SyncPriority,
    ) -> Result<(String, JoinHandle<()>)> {
        if categories.is_empty() {
            return Err(ReplicaError::Validation(
                "at least one data category is required".to_string(),
            ));
        }
        if !self.registry.contains(instance_id).await {
            return Err(ReplicaError::not_found("instance", instance_id));
        }

        let total_bytes = categories
            .iter()
            .map(|c| self.settings.category_size(c))
            .sum();
        let operation =
            SyncOperation::new(instance_id, direction, categories, priority, total_bytes);
        let operation_id = operation.id.clone();

        self.persist_operation(&operation).await;
        self.cancel_flags
            .write()
            .await
            .insert(operation_id.clone(), Arc::new(AtomicBool::new(false)));
        self.operations
            .write()
            .await
            .insert(operation_id.clone(), operation);

        info!(
            "Scheduled {} sync {} for instance {} ({} bytes estimated)",
            direction, operation_id, instance_id, total_bytes
        );

        let engine = self.clone();
        let task_id = operation_id.clone();
        let handle = tokio::spawn(async move {
            engine.execute(&task_id).await;
        });

        Ok((operation_id, handle))
    }

    /// Push with priority pinned to high
    pub async fn force_push(
        &self,
        instance_id: &str,
        categories: Vec<String>,
    ) -> Result<(String, JoinHandle<()>)> {
        self.create_sync_operation(instance_id, SyncDirection::Push, categories, SyncPriority::High)
            .await
    }

    /// Pull with priority pinned to high
    pub async fn force_pull(
        &self,
        instance_id: &str,
        categories: Vec<String>,
    ) -> Result<(String, JoinHandle<()>)> {
        self.create_sync_operation(instance_id, SyncDirection::Pull, categories, SyncPriority::High)
            .await
    }

    /// Best-effort cooperative cancellation, chunk-granular.
    ///
    /// Only effective while the operation is in progress; terminal or
    /// unknown operations are left untouched.
    pub async fn cancel_sync_operation(&self, operation_id: &str) {
        let operations = self.operations.read().await;
        match operations.get(operation_id) {
            Some(op) if op.status == SyncStatus::InProgress => {
                if let Some(flag) = self.cancel_flags.read().await.get(operation_id) {
                    flag.store(true, Ordering::SeqCst);
                    info!("Cancellation requested for {}", operation_id);
                }
            }
            Some(op) => debug!(
                "Cancel ignored for {} in state {:?}",
                operation_id, op.status
            ),
            None => debug!("Cancel ignored for unknown operation {}", operation_id),
        }
    }

    pub async fn get_sync_operation(&self, operation_id: &str) -> Option<SyncOperation> {
        self.operations.read().await.get(operation_id).cloned()
    }

    /// Most recent log entries, newest first
    pub async fn get_sync_logs(
        &self,
        instance_id: Option<&str>,
        limit: usize,
    ) -> Vec<SyncLogEntry> {
        self.log.recent(instance_id, limit).await
    }

    /// Operations for one instance that have not reached a terminal state
    pub async fn non_terminal_count(&self, instance_id: &str) -> usize {
        self.operations
            .read()
            .await
            .values()
            .filter(|op| op.instance_id == instance_id && !op.status.is_terminal())
            .count()
    }

    /// Pending and completed counts across all operations
    pub async fn operation_counts(&self) -> (usize, usize) {
        let operations = self.operations.read().await;
        let pending = operations
            .values()
            .filter(|op| !op.status.is_terminal())
            .count();
        let completed = operations
            .values()
            .filter(|op| op.status == SyncStatus::Completed)
            .count();
        (pending, completed)
    }

    async fn execute(&self, operation_id: &str) {
        let (instance_id, categories) = {
            let operations = self.operations.read().await;
            let Some(op) = operations.get(operation_id) else {
                return;
            };
            (op.instance_id.clone(), op.categories.clone())
        };

        // Serialize per instance: one operation at a time drives its status
        let lock = self.instance_lock(&instance_id).await;
        let _guard = lock.lock().await;

        let started_at = Utc::now();
        {
            let mut operations = self.operations.write().await;
            if let Some(op) = operations.get_mut(operation_id) {
                op.status = SyncStatus::InProgress;
                op.started_at = Some(started_at);
            }
        }
        self.registry
            .update_status(&instance_id, InstanceStatus::Syncing)
            .await;

        let outcome = self.transfer(operation_id, &instance_id, &categories).await;

        let completed_at = Utc::now();
        let duration_ms = completed_at
            .signed_duration_since(started_at)
            .num_milliseconds()
            .max(0) as u64;

        let final_op = {
            let mut operations = self.operations.write().await;
            let Some(op) = operations.get_mut(operation_id) else {
                return;
            };
            op.completed_at = Some(completed_at);
            match &outcome {
                Ok(()) => {
                    op.status = SyncStatus::Completed;
                    op.progress = 100;
                }
                Err(e) => {
                    op.status = SyncStatus::Failed;
                    op.error = Some(failure_text(e));
                }
            }
            op.clone()
        };
        self.persist_operation(&final_op).await;
        self.cancel_flags.write().await.remove(operation_id);

        match outcome {
            Ok(()) => {
                self.registry.mark_synced(&instance_id, completed_at).await;
                self.registry
                    .update_status(&instance_id, InstanceStatus::Active)
                    .await;
                info!(
                    "Sync {} completed: {} bytes in {} ms",
                    operation_id, final_op.bytes_transferred, duration_ms
                );
            }
            Err(ref e) => {
                self.registry
                    .update_status(&instance_id, InstanceStatus::Error)
                    .await;
                warn!("Sync {} failed: {}", operation_id, e);
            }
        }

        self.log
            .append(SyncLogEntry {
                id: format!("log-{}", Uuid::new_v4()),
                timestamp: completed_at,
                source_instance_id: self.identity.instance_id(),
                target_instance_id: instance_id,
                direction: final_op.direction,
                categories: final_op.categories.clone(),
                success: outcome.is_ok(),
                duration_ms,
                bytes_transferred: final_op.bytes_transferred,
                errors: outcome
                    .err()
                    .map(|e| vec![failure_text(&e)])
                    .unwrap_or_default(),
            })
            .await;
    }

    /// Chunked transfer over the operation's category list.
    ///
    /// Bytes already transferred stay on the record when a later category
    /// fails; the operation as a whole is still marked failed.
    async fn transfer(
        &self,
        operation_id: &str,
        instance_id: &str,
        categories: &[String],
    ) -> Result<()> {
        let cancel_flag = self
            .cancel_flags
            .read()
            .await
            .get(operation_id)
            .cloned()
            .unwrap_or_default();
        let chunk_size = self.settings.chunk_size_bytes.max(1);

        for category in categories {
            let mut remaining = self.settings.category_size(category);
            debug!(
                "Transferring category {} ({} bytes) for {}",
                category, remaining, operation_id
            );

            while remaining > 0 {
                // cancellation is chunk-granular: a chunk mid-flight finishes
                if cancel_flag.load(Ordering::SeqCst) {
                    return Err(ReplicaError::Execution(CANCELLED_BY_USER.to_string()));
                }
                if !self.registry.contains(instance_id).await {
                    return Err(ReplicaError::Execution(format!(
                        "instance {instance_id} unregistered during transfer"
                    )));
                }

                if self.settings.chunk_pause_ms > 0 {
                    sleep(Duration::from_millis(self.settings.chunk_pause_ms)).await;
                }

                let chunk = chunk_size.min(remaining);
                remaining -= chunk;

                let mut operations = self.operations.write().await;
                if let Some(op) = operations.get_mut(operation_id) {
                    op.bytes_transferred += chunk;
                    if op.total_bytes > 0 {
                        op.progress = ((op.bytes_transferred * 100) / op.total_bytes)
                            .min(100) as u8;
                    }
                }
            }
        }

        Ok(())
    }

    async fn instance_lock(&self, instance_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.instance_locks.lock().await;
        locks
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn persist_operation(&self, operation: &SyncOperation) {
        match serde_json::to_value(operation) {
            Ok(record) => {
                if let Err(e) = self
                    .store
                    .update(RecordKind::Operation, &operation.id, record)
                    .await
                {
                    warn!("Could not persist operation {}: {}", operation.id, e);
                }
            }
            Err(e) => warn!("Could not encode operation {}: {}", operation.id, e),
        }
    }
}

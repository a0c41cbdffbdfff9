//! End-to-end lifecycle tests for the orchestration core.
//!
//! These run against the in-memory store with static collectors and a
//! zero chunk pause, so nothing here touches the network or depends on
//! wall-clock waits: offline detection is driven with explicit instants.

use chrono::{Duration as ChronoDuration, Utc};
use replica_common::{
    CloneOptions, Deployment, InstanceInfo, InstanceStatus, MemoryEntry, ModuleDescriptor,
    ReplicaConfig, ReplicaError, SyncDirection, SyncPriority, SyncStatus, TelemetryPatch,
};
use replicad::collectors::{
    CollectorSet, ProcessIdentity, StaticMemorySource, StaticModuleSource, StaticPreferenceSource,
};
use replicad::{ConfigStore, Identity, LocalCache, MemoryStore, Orchestrator};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn collectors() -> CollectorSet {
    CollectorSet {
        modules: Arc::new(StaticModuleSource {
            modules: vec![
                ModuleDescriptor {
                    name: "scheduler".to_string(),
                    version: "1.0".to_string(),
                },
                ModuleDescriptor {
                    name: "reports".to_string(),
                    version: "0.3".to_string(),
                },
            ],
        }),
        memory: Arc::new(StaticMemorySource {
            entries: vec![MemoryEntry {
                recorded_at: Utc::now(),
                content: "reviewed crew roster".to_string(),
            }],
        }),
        preferences: Arc::new(StaticPreferenceSource {
            preferences: HashMap::from([("locale".to_string(), "en-GB".to_string())]),
            capabilities: vec!["chat".to_string()],
        }),
    }
}

fn build_orchestrator(cache_dir: &TempDir) -> Orchestrator {
    let mut config = ReplicaConfig::default();
    // deterministic and fast: no pacing between chunks
    config.sync.chunk_pause_ms = 0;

    let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
    let cache = Arc::new(LocalCache::new(cache_dir.path()));
    let identity: Arc<dyn Identity> = Arc::new(ProcessIdentity::with_id("inst-authority"));

    Orchestrator::new(&config, store, cache, collectors(), identity)
}

fn remote_instance(id: &str) -> InstanceInfo {
    InstanceInfo::new(id, format!("edge {id}"), Deployment::Remote)
        .with_endpoint(format!("https://{id}.example.net"))
}

#[tokio::test]
async fn test_snapshot_clone_round_trip() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);

    let snapshot = orchestrator
        .factory()
        .create_snapshot(Some("pre-deploy"))
        .await
        .unwrap();
    let clone = orchestrator
        .factory()
        .create_clone(
            &snapshot,
            CloneOptions {
                name: "branch office".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(clone.modules, snapshot.module_names());
    assert_eq!(clone.context.memories.len(), 1);

    let instances = orchestrator.registry().list(None).await;
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].status, InstanceStatus::Active);
}

#[tokio::test]
async fn test_stale_instance_offline_after_tick() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);
    orchestrator
        .registry()
        .register(remote_instance("a"))
        .await
        .unwrap();

    // 61s of silence against a 60s timeout, single tick
    let demoted = orchestrator
        .monitor()
        .sweep_at(Utc::now() + ChronoDuration::seconds(61))
        .await;
    assert_eq!(demoted, vec!["a".to_string()]);

    let info = orchestrator.registry().get("a").await.unwrap();
    assert_eq!(info.status, InstanceStatus::Offline);

    // renewed heartbeat recovers the instance, caller driven
    orchestrator
        .registry()
        .update_status("a", InstanceStatus::Active)
        .await;
    assert_eq!(
        orchestrator.registry().get("a").await.unwrap().status,
        InstanceStatus::Active
    );
}

#[tokio::test]
async fn test_sync_against_unknown_instance_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);

    let result = orchestrator
        .engine()
        .create_sync_operation(
            "ghost",
            SyncDirection::Push,
            vec!["telemetry".to_string()],
            SyncPriority::Medium,
        )
        .await;
    assert!(matches!(result, Err(ReplicaError::NotFound { .. })));

    let overview = orchestrator.get_system_overview().await;
    assert_eq!(overview.pending_operations, 0);
    assert_eq!(overview.completed_operations, 0);
}

#[tokio::test]
async fn test_push_telemetry_completes_with_estimated_bytes() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);
    orchestrator
        .registry()
        .register(remote_instance("edge-1"))
        .await
        .unwrap();

    let (id, handle) = orchestrator
        .engine()
        .create_sync_operation(
            "edge-1",
            SyncDirection::Push,
            vec!["telemetry".to_string()],
            SyncPriority::Medium,
        )
        .await
        .unwrap();
    handle.await.unwrap();

    let op = orchestrator.engine().get_sync_operation(&id).await.unwrap();
    assert_eq!(op.status, SyncStatus::Completed);
    assert_eq!(op.bytes_transferred, 50 * 1024);
    assert_eq!(op.progress, 100);

    let status = orchestrator.get_sync_status("edge-1").await.unwrap();
    assert_eq!(status.sync_percentage, 100);
    assert!(status.last_sync.is_some());
    assert_eq!(status.active_operations, 0);
    assert_eq!(status.recent_logs.len(), 1);
    assert!(status.recent_logs[0].success);
}

#[tokio::test]
async fn test_sync_status_unknown_instance_is_strict() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);
    assert!(matches!(
        orchestrator.get_sync_status("ghost").await,
        Err(ReplicaError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_empty_overview_is_all_zeros() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);

    let overview = orchestrator.get_system_overview().await;
    assert_eq!(overview.instances.total, 0);
    assert_eq!(overview.instances.active, 0);
    assert_eq!(overview.instances.syncing, 0);
    assert_eq!(overview.instances.offline, 0);
    assert_eq!(overview.instances.average_sync_percentage, 0.0);
    assert_eq!(overview.pending_operations, 0);
    assert_eq!(overview.completed_operations, 0);
}

#[tokio::test]
async fn test_overview_counts_after_mixed_activity() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);
    orchestrator
        .registry()
        .register(remote_instance("a"))
        .await
        .unwrap();
    orchestrator
        .registry()
        .register(remote_instance("b"))
        .await
        .unwrap();

    let (_, handle) = orchestrator
        .engine()
        .force_push("a", vec!["preferences".to_string()])
        .await
        .unwrap();
    handle.await.unwrap();

    orchestrator
        .monitor()
        .sweep_at(Utc::now() + ChronoDuration::seconds(120))
        .await;

    let overview = orchestrator.get_system_overview().await;
    assert_eq!(overview.instances.total, 2);
    assert_eq!(overview.instances.offline, 2);
    assert_eq!(overview.completed_operations, 1);
    assert_eq!(overview.pending_operations, 0);
    // one instance fully synced, one untouched
    assert_eq!(overview.instances.average_sync_percentage, 50.0);
}

#[tokio::test]
async fn test_recent_logs_capped_at_ten() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);
    orchestrator
        .registry()
        .register(remote_instance("busy"))
        .await
        .unwrap();

    for _ in 0..12 {
        let (_, handle) = orchestrator
            .engine()
            .force_push("busy", vec!["preferences".to_string()])
            .await
            .unwrap();
        handle.await.unwrap();
    }

    let status = orchestrator.get_sync_status("busy").await.unwrap();
    assert_eq!(status.recent_logs.len(), 10);
    assert!(status.recent_logs.iter().all(|e| e.success));
}

#[tokio::test]
async fn test_telemetry_push_counts_as_heartbeat() {
    let dir = TempDir::new().unwrap();
    let orchestrator = build_orchestrator(&dir);
    orchestrator
        .registry()
        .register(remote_instance("a"))
        .await
        .unwrap();

    let before = orchestrator.registry().get("a").await.unwrap().last_seen;
    orchestrator
        .registry()
        .update_telemetry(
            "a",
            &TelemetryPatch {
                cpu_percent: Some(42.0),
                ..Default::default()
            },
        )
        .await;

    let info = orchestrator.registry().get("a").await.unwrap();
    assert!(info.last_seen >= before);
    assert_eq!(info.telemetry.cpu_percent, 42.0);
}

#[tokio::test]
async fn test_failed_sync_is_recorded_and_never_thrown() {
    let dir = TempDir::new().unwrap();

    // unregistering mid-transfer forces a failure; small chunks with a
    // real pause keep the operation in flight long enough to land it
    let mut config = ReplicaConfig::default();
    config.sync.chunk_size_bytes = 1024;
    config.sync.chunk_pause_ms = 15;
    let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
    let cache = Arc::new(LocalCache::new(dir.path()));
    let identity: Arc<dyn Identity> = Arc::new(ProcessIdentity::with_id("inst-authority"));
    let slow = Orchestrator::new(&config, store, cache, collectors(), identity);

    slow.registry().register(remote_instance("flaky")).await.unwrap();
    let (id, handle) = slow
        .engine()
        .create_sync_operation(
            "flaky",
            SyncDirection::Bidirectional,
            vec!["logs".to_string()],
            SyncPriority::Low,
        )
        .await
        .unwrap();

    slow.registry().unregister("flaky").await.unwrap();
    handle.await.unwrap();

    let op = slow.engine().get_sync_operation(&id).await.unwrap();
    assert_eq!(op.status, SyncStatus::Failed);
    assert!(op.error.is_some());

    let logs = slow.engine().get_sync_logs(Some("flaky"), 10).await;
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].success);
    assert!(!logs[0].errors.is_empty());
}

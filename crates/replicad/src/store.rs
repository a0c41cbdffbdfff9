//! Durable configuration store.
//!
//! Persists snapshots, clone configurations, registry entries, operations,
//! and sync log entries for restart recovery. Records are opaque JSON keyed
//! by (kind, key); the in-memory maps elsewhere in the daemon are the read
//! path, the store is write-through.

use async_trait::async_trait;
use replica_common::{ReplicaError, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Kind discriminator for stored records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Snapshot,
    CloneConfig,
    Instance,
    Operation,
    SyncLog,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::CloneConfig => "clone_config",
            Self::Instance => "instance",
            Self::Operation => "operation",
            Self::SyncLog => "sync_log",
        }
    }
}

/// Abstract durable store consumed by the core
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Insert or replace one record
    async fn insert(&self, kind: RecordKind, key: &str, record: serde_json::Value) -> Result<()>;

    /// Update an existing record; inserting when absent is acceptable
    async fn update(&self, kind: RecordKind, key: &str, record: serde_json::Value) -> Result<()>;

    /// Fetch one record by key
    async fn fetch(&self, kind: RecordKind, key: &str) -> Result<Option<serde_json::Value>>;

    /// All records of one kind, unspecified order
    async fn query(&self, kind: RecordKind) -> Result<Vec<serde_json::Value>>;

    /// Remove one record; absent keys are fine
    async fn remove(&self, kind: RecordKind, key: &str) -> Result<()>;
}

/// SQLite-backed store. Single connection behind a mutex; statements run on
/// the blocking pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ReplicaError::Persistence(format!("create store dir: {e}")))?;
        }

        info!("Opening replica store at {}", path.display());

        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path)
                .map_err(|e| ReplicaError::Persistence(format!("open store: {e}")))?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| ReplicaError::Persistence(format!("enable WAL: {e}")))?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(|e| ReplicaError::Persistence(format!("set synchronous: {e}")))?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS records (
                    kind TEXT NOT NULL,
                    key TEXT NOT NULL,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (kind, key)
                )",
                [],
            )
            .map_err(|e| ReplicaError::Persistence(format!("create schema: {e}")))?;

            Ok(conn)
        })
        .await
        .map_err(|e| ReplicaError::Persistence(format!("store task panicked: {e}")))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn upsert(&self, kind: RecordKind, key: &str, record: serde_json::Value) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let kind = kind.as_str();
        let key = key.to_string();
        let body = record.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        // Hold the lock across the blocking call so statements never interleave
        let guard = conn.lock_owned().await;
        tokio::task::spawn_blocking(move || {
            guard
                .execute(
                    "INSERT INTO records (kind, key, body, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (kind, key) DO UPDATE SET body = ?3, updated_at = ?4",
                    params![kind, key, body, now],
                )
                .map_err(|e| ReplicaError::Persistence(format!("write record: {e}")))?;
            debug!("Stored {} record {}", kind, key);
            Ok(())
        })
        .await
        .map_err(|e| ReplicaError::Persistence(format!("store task panicked: {e}")))?
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn insert(&self, kind: RecordKind, key: &str, record: serde_json::Value) -> Result<()> {
        self.upsert(kind, key, record).await
    }

    async fn update(&self, kind: RecordKind, key: &str, record: serde_json::Value) -> Result<()> {
        self.upsert(kind, key, record).await
    }

    async fn fetch(&self, kind: RecordKind, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = Arc::clone(&self.conn);
        let kind = kind.as_str();
        let key = key.to_string();

        let guard = conn.lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let mut stmt = guard
                .prepare("SELECT body FROM records WHERE kind = ?1 AND key = ?2")
                .map_err(|e| ReplicaError::Persistence(format!("prepare fetch: {e}")))?;
            let mut rows = stmt
                .query(params![kind, key])
                .map_err(|e| ReplicaError::Persistence(format!("run fetch: {e}")))?;

            match rows
                .next()
                .map_err(|e| ReplicaError::Persistence(format!("read row: {e}")))?
            {
                Some(row) => {
                    let body: String = row
                        .get(0)
                        .map_err(|e| ReplicaError::Persistence(format!("read body: {e}")))?;
                    let value = serde_json::from_str(&body)
                        .map_err(|e| ReplicaError::Persistence(format!("parse record: {e}")))?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| ReplicaError::Persistence(format!("store task panicked: {e}")))?
    }

    async fn query(&self, kind: RecordKind) -> Result<Vec<serde_json::Value>> {
        let conn = Arc::clone(&self.conn);
        let kind = kind.as_str();

        let guard = conn.lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let mut stmt = guard
                .prepare("SELECT body FROM records WHERE kind = ?1")
                .map_err(|e| ReplicaError::Persistence(format!("prepare query: {e}")))?;
            let rows = stmt
                .query_map(params![kind], |row| row.get::<_, String>(0))
                .map_err(|e| ReplicaError::Persistence(format!("run query: {e}")))?;

            let mut records = Vec::new();
            for body in rows {
                let body =
                    body.map_err(|e| ReplicaError::Persistence(format!("read row: {e}")))?;
                let value = serde_json::from_str(&body)
                    .map_err(|e| ReplicaError::Persistence(format!("parse record: {e}")))?;
                records.push(value);
            }
            Ok(records)
        })
        .await
        .map_err(|e| ReplicaError::Persistence(format!("store task panicked: {e}")))?
    }

    async fn remove(&self, kind: RecordKind, key: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let kind = kind.as_str();
        let key = key.to_string();

        let guard = conn.lock_owned().await;
        tokio::task::spawn_blocking(move || {
            guard
                .execute(
                    "DELETE FROM records WHERE kind = ?1 AND key = ?2",
                    params![kind, key],
                )
                .map_err(|e| ReplicaError::Persistence(format!("delete record: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| ReplicaError::Persistence(format!("store task panicked: {e}")))?
    }
}

/// In-memory store for tests and embedded callers
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(RecordKind, String), serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn insert(&self, kind: RecordKind, key: &str, record: serde_json::Value) -> Result<()> {
        self.records
            .write()
            .await
            .insert((kind, key.to_string()), record);
        Ok(())
    }

    async fn update(&self, kind: RecordKind, key: &str, record: serde_json::Value) -> Result<()> {
        self.insert(kind, key, record).await
    }

    async fn fetch(&self, kind: RecordKind, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(kind, key.to_string()))
            .cloned())
    }

    async fn query(&self, kind: RecordKind) -> Result<Vec<serde_json::Value>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn remove(&self, kind: RecordKind, key: &str) -> Result<()> {
        self.records.write().await.remove(&(kind, key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("store.db")).await.unwrap();

        store
            .insert(RecordKind::Instance, "inst-1", json!({"name": "edge"}))
            .await
            .unwrap();

        let fetched = store.fetch(RecordKind::Instance, "inst-1").await.unwrap();
        assert_eq!(fetched.unwrap()["name"], "edge");

        // kinds are isolated
        assert!(store
            .fetch(RecordKind::Snapshot, "inst-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sqlite_upsert_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("store.db")).await.unwrap();

        store
            .insert(RecordKind::Instance, "inst-1", json!({"v": 1}))
            .await
            .unwrap();
        store
            .update(RecordKind::Instance, "inst-1", json!({"v": 2}))
            .await
            .unwrap();

        let all = store.query(RecordKind::Instance).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["v"], 2);
    }

    #[tokio::test]
    async fn test_sqlite_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("store.db")).await.unwrap();

        store
            .insert(RecordKind::Operation, "op-1", json!({}))
            .await
            .unwrap();
        store.remove(RecordKind::Operation, "op-1").await.unwrap();
        store.remove(RecordKind::Operation, "op-1").await.unwrap();

        assert!(store
            .fetch(RecordKind::Operation, "op-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_memory_store_query_filters_by_kind() {
        let store = MemoryStore::new();
        store
            .insert(RecordKind::Snapshot, "a", json!({"id": "a"}))
            .await
            .unwrap();
        store
            .insert(RecordKind::Instance, "b", json!({"id": "b"}))
            .await
            .unwrap();

        let snapshots = store.query(RecordKind::Snapshot).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0]["id"], "a");
    }
}

//! Local durable cache.
//!
//! Process-local key -> JSON blob store, one file per key, so each clone's
//! working context stays available without a round trip to the durable
//! store. Keys are sanitized into file names; values are pretty-printed
//! JSON for operator inspection.

use replica_common::{ReplicaError, Result};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    pub async fn put(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ReplicaError::Persistence(format!("create cache dir: {e}")))?;

        let body = serde_json::to_string_pretty(value)
            .map_err(|e| ReplicaError::Persistence(format!("encode cache entry: {e}")))?;
        let path = self.path_for(key);
        fs::write(&path, body)
            .await
            .map_err(|e| ReplicaError::Persistence(format!("write cache entry: {e}")))?;

        debug!("Cached {} at {}", key, path.display());
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(body) => {
                let value = serde_json::from_str(&body)
                    .map_err(|e| ReplicaError::Persistence(format!("parse cache entry: {e}")))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReplicaError::Persistence(format!("read cache entry: {e}"))),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReplicaError::Persistence(format!("remove cache entry: {e}"))),
        }
    }
}

//! Replica daemon configuration.
//!
//! Configuration lives in /etc/replica/config.toml (override with the
//! REPLICA_CONFIG environment variable). Every field has a default so a
//! missing or partial file still yields a working daemon.

use crate::error::{ReplicaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/replica";
const CONFIG_FILE: &str = "config.toml";

/// Replica data directory (store, cache)
pub const DATA_DIR: &str = "/var/lib/replica";

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Human name reported for the local instance
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default)]
    pub heartbeat: HeartbeatSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub snapshot: SnapshotSettings,
}

/// Health monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    /// How often the monitor sweeps the registry (seconds)
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,

    /// Silence threshold after which an instance is demoted to offline
    #[serde(default = "default_offline_timeout")]
    pub offline_timeout_secs: u64,
}

/// Sync engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Fixed transfer chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,

    /// Pause between chunks in milliseconds (0 disables pacing)
    #[serde(default = "default_chunk_pause")]
    pub chunk_pause_ms: u64,

    /// Maximum retained sync log entries (oldest evicted first)
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Static per-category byte estimates. Categories are logical units,
    /// so sizes are estimates, not measured payloads.
    #[serde(default = "default_category_sizes")]
    pub category_sizes: HashMap<String, u64>,

    /// Estimate for categories missing from the table
    #[serde(default = "default_category_fallback")]
    pub category_fallback_bytes: u64,
}

/// Snapshot factory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSettings {
    /// How many recent memory entries a snapshot captures
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,

    /// Default context window limit for derived clones
    #[serde(default = "default_context_window")]
    pub default_context_window: u32,

    /// Environment tag stamped into snapshot metadata
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_instance_name() -> String {
    "replica-primary".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_offline_timeout() -> u64 {
    60
}

fn default_chunk_size() -> u64 {
    16 * 1024
}

fn default_chunk_pause() -> u64 {
    25
}

fn default_log_capacity() -> usize {
    500
}

fn default_category_fallback() -> u64 {
    64 * 1024
}

fn default_memory_window() -> usize {
    50
}

fn default_context_window() -> u32 {
    1000
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_category_sizes() -> HashMap<String, u64> {
    let mut sizes = HashMap::new();
    sizes.insert("configuration".to_string(), 256 * 1024);
    sizes.insert("memories".to_string(), 512 * 1024);
    sizes.insert("preferences".to_string(), 32 * 1024);
    sizes.insert("telemetry".to_string(), 50 * 1024);
    sizes.insert("logs".to_string(), 1024 * 1024);
    sizes.insert("learnings".to_string(), 128 * 1024);
    sizes
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            heartbeat: HeartbeatSettings::default(),
            sync: SyncSettings::default(),
            snapshot: SnapshotSettings::default(),
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
            offline_timeout_secs: default_offline_timeout(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size(),
            chunk_pause_ms: default_chunk_pause(),
            log_capacity: default_log_capacity(),
            category_sizes: default_category_sizes(),
            category_fallback_bytes: default_category_fallback(),
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            memory_window: default_memory_window(),
            default_context_window: default_context_window(),
            environment: default_environment(),
        }
    }
}

impl SyncSettings {
    /// Byte estimate for one data category
    pub fn category_size(&self, category: &str) -> u64 {
        self.category_sizes
            .get(category)
            .copied()
            .unwrap_or(self.category_fallback_bytes)
    }
}

impl ReplicaConfig {
    /// Resolve the config file path: REPLICA_CONFIG wins, then the system dir
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("REPLICA_CONFIG") {
            return PathBuf::from(path);
        }
        Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load from a TOML file, falling back to defaults when the file is
    /// missing. A present-but-malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| ReplicaError::Persistence(format!("read config: {e}")))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| ReplicaError::Validation(format!("parse config: {e}")))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ReplicaConfig::default();
        assert_eq!(config.heartbeat.interval_secs, 30);
        assert_eq!(config.heartbeat.offline_timeout_secs, 60);
        assert_eq!(config.snapshot.default_context_window, 1000);
        assert_eq!(config.sync.category_size("telemetry"), 50 * 1024);
    }

    #[test]
    fn test_unknown_category_uses_fallback() {
        let config = ReplicaConfig::default();
        assert_eq!(
            config.sync.category_size("no-such-category"),
            config.sync.category_fallback_bytes
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            instance_name = "edge-01"

            [heartbeat]
            offline_timeout_secs = 120
        "#;
        let config: ReplicaConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.instance_name, "edge-01");
        assert_eq!(config.heartbeat.offline_timeout_secs, 120);
        // untouched sections keep defaults
        assert_eq!(config.heartbeat.interval_secs, 30);
        assert_eq!(config.sync.log_capacity, 500);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReplicaConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.heartbeat.offline_timeout_secs, 60);
    }

    #[test]
    fn test_load_malformed_file_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "instance_name = [not toml").unwrap();
        assert!(matches!(
            ReplicaConfig::load(&path),
            Err(ReplicaError::Validation(_))
        ));
    }
}

//! Sync operation and sync log records.
//!
//! An operation gets exactly one execution attempt and is terminal once
//! completed or failed; the log is the append-only audit trail of those
//! attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Push,
    Pull,
    Bidirectional,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
            Self::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

/// Scheduling priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Lifecycle of a sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One scheduled data-reconciliation task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub instance_id: String,
    pub direction: SyncDirection,
    /// Ordered data-category tags, transferred in list order
    pub categories: Vec<String>,
    pub priority: SyncPriority,
    pub status: SyncStatus,
    /// 0-100
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl SyncOperation {
    pub fn new(
        instance_id: impl Into<String>,
        direction: SyncDirection,
        categories: Vec<String>,
        priority: SyncPriority,
        total_bytes: u64,
    ) -> Self {
        Self {
            id: format!("sync-{}", Uuid::new_v4()),
            instance_id: instance_id.into(),
            direction,
            categories,
            priority,
            status: SyncStatus::Pending,
            progress: 0,
            started_at: None,
            completed_at: None,
            error: None,
            bytes_transferred: 0,
            total_bytes,
        }
    }
}

/// Immutable audit record of one completed or failed sync attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source_instance_id: String,
    pub target_instance_id: String,
    pub direction: SyncDirection,
    pub categories: Vec<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub bytes_transferred: u64,
    pub errors: Vec<String>,
}

impl SyncLogEntry {
    /// Whether the given instance appears as source or target
    pub fn touches(&self, instance_id: &str) -> bool {
        self.source_instance_id == instance_id || self.target_instance_id == instance_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_operation_is_pending() {
        let op = SyncOperation::new(
            "inst-1",
            SyncDirection::Push,
            vec!["telemetry".to_string()],
            SyncPriority::Medium,
            50 * 1024,
        );
        assert_eq!(op.status, SyncStatus::Pending);
        assert_eq!(op.progress, 0);
        assert_eq!(op.bytes_transferred, 0);
        assert_eq!(op.total_bytes, 50 * 1024);
        assert!(op.id.starts_with("sync-"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SyncStatus::Pending.is_terminal());
        assert!(!SyncStatus::InProgress.is_terminal());
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(SyncPriority::Critical > SyncPriority::High);
        assert!(SyncPriority::High > SyncPriority::Medium);
        assert!(SyncPriority::Medium > SyncPriority::Low);
    }

    #[test]
    fn test_log_entry_touches_either_side() {
        let entry = SyncLogEntry {
            id: "log-1".to_string(),
            timestamp: Utc::now(),
            source_instance_id: "primary".to_string(),
            target_instance_id: "edge".to_string(),
            direction: SyncDirection::Pull,
            categories: vec![],
            success: true,
            duration_ms: 12,
            bytes_transferred: 1024,
            errors: vec![],
        };
        assert!(entry.touches("primary"));
        assert!(entry.touches("edge"));
        assert!(!entry.touches("other"));
    }
}

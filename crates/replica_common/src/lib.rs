//! Shared data model for the replica orchestration core.
//!
//! Defines the records moved between the registry, the sync engine, and the
//! snapshot factory, plus the error taxonomy and daemon configuration.

pub mod config;
pub mod error;
pub mod instance;
pub mod snapshot;
pub mod sync;
pub mod telemetry;

pub use config::ReplicaConfig;
pub use error::{ReplicaError, Result};
pub use instance::{Deployment, InstanceCapabilities, InstanceInfo, InstanceStatus};
pub use snapshot::{
    AiContext, CloneConfiguration, CloneOptions, CloneSnapshot, MemoryEntry, ModelParameters,
    ModuleDescriptor, SnapshotContext, SnapshotMeta, SNAPSHOT_SCHEMA_VERSION,
};
pub use sync::{SyncDirection, SyncLogEntry, SyncOperation, SyncPriority, SyncStatus};
pub use telemetry::{InstanceTelemetry, NetworkTelemetry, TelemetryPatch};

//! Replica daemon - mirror-instance orchestration core.
//!
//! Tracks distributed clone instances of the system, derives deployable
//! clone configurations from point-in-time snapshots, and reconciles data
//! between the central authority and each instance while watching liveness.

pub mod cache;
pub mod collectors;
pub mod factory;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod sync;
pub mod synclog;

pub use cache::LocalCache;
pub use collectors::{CollectorSet, Identity, MemorySource, ModuleSource, PreferenceSource};
pub use factory::SnapshotFactory;
pub use monitor::HealthMonitor;
pub use orchestrator::{Orchestrator, SyncStatusReport, SystemOverview};
pub use registry::{InstanceCounts, InstanceRegistry};
pub use store::{ConfigStore, MemoryStore, RecordKind, SqliteStore};
pub use sync::{SyncEngine, CANCELLED_BY_USER};
pub use synclog::SyncLog;

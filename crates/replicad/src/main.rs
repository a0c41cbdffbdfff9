//! Replica daemon - orchestrates mirror instances of the system.
//!
//! Loads configuration, opens the durable store, registers the local
//! instance, and runs the health monitor until shutdown.

use anyhow::Result;
use replica_common::{Deployment, InstanceInfo, InstanceTelemetry, ReplicaConfig};
use replicad::collectors::{
    CollectorSet, ProcessIdentity, StaticMemorySource, StaticModuleSource, StaticPreferenceSource,
};
use replicad::{Identity, LocalCache, Orchestrator, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Replica daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = ReplicaConfig::load(&ReplicaConfig::default_path())?;
    let data_dir = Path::new(replica_common::config::DATA_DIR);

    let store = Arc::new(SqliteStore::open(&data_dir.join("replica.db")).await?);
    let cache = Arc::new(LocalCache::new(data_dir.join("cache")));
    let identity: Arc<dyn Identity> = Arc::new(ProcessIdentity::new());

    // Collaborator wiring; a host embedding the core swaps in its own sources
    let collectors = CollectorSet {
        modules: Arc::new(StaticModuleSource {
            modules: Vec::new(),
        }),
        memory: Arc::new(StaticMemorySource {
            entries: Vec::new(),
        }),
        preferences: Arc::new(StaticPreferenceSource {
            preferences: Default::default(),
            capabilities: Vec::new(),
        }),
    };

    let orchestrator = Orchestrator::new(&config, store, cache, collectors, Arc::clone(&identity));
    let restored = orchestrator.restore().await?;
    info!("Restored {} instance(s) from the store", restored);

    // Register the local authority instance with sampled telemetry
    let mut local = InstanceInfo::new(
        identity.instance_id(),
        config.instance_name.clone(),
        Deployment::Local,
    );
    local.telemetry = InstanceTelemetry::collect_local();
    orchestrator.registry().register(local).await?;

    orchestrator.monitor().start_heartbeat().await;
    info!("Replica daemon ready");

    tokio::signal::ctrl_c().await?;
    orchestrator.monitor().stop_heartbeat().await;
    info!("Shutting down gracefully");

    Ok(())
}

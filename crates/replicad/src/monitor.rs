//! Health monitor - periodic liveness sweep over the registry.
//!
//! Demotes instances silent past the offline timeout; never promotes them
//! back. Offline recovery is caller-driven via re-registration or an
//! explicit status update. The sweep is pure in-memory comparison, so a
//! tick always completes well within the interval.

use crate::registry::InstanceRegistry;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use replica_common::config::HeartbeatSettings;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

pub struct HealthMonitor {
    registry: Arc<InstanceRegistry>,
    settings: HeartbeatSettings,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<InstanceRegistry>, settings: HeartbeatSettings) -> Self {
        Self {
            registry,
            settings,
            task: Mutex::new(None),
        }
    }

    /// Start the periodic sweep task. A second call replaces the previous
    /// task, so at most one ticker runs at a time.
    pub async fn start_heartbeat(&self) {
        let registry = Arc::clone(&self.registry);
        let interval_secs = self.settings.interval_secs;
        let timeout_secs = self.settings.offline_timeout_secs;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                let demoted =
                    sweep(&registry, Utc::now(), timeout_secs).await;
                if demoted.is_empty() {
                    debug!("Heartbeat sweep: all instances within timeout");
                }
            }
        });

        let mut task = self.task.lock().await;
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
        info!(
            "Health monitor started (interval {}s, offline timeout {}s)",
            interval_secs, timeout_secs
        );
    }

    /// Stop the sweep task. Idempotent; safe to call from teardown.
    pub async fn stop_heartbeat(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!("Health monitor stopped");
        }
    }

    /// One sweep at an explicit instant; the ticker calls this with the
    /// current time, tests drive it with simulated time.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Vec<String> {
        sweep(&self.registry, now, self.settings.offline_timeout_secs).await
    }
}

async fn sweep(
    registry: &InstanceRegistry,
    now: DateTime<Utc>,
    timeout_secs: u64,
) -> Vec<String> {
    let demoted = registry
        .sweep_offline(now, ChronoDuration::seconds(timeout_secs as i64))
        .await;
    for id in &demoted {
        warn!(
            "Instance {} silent for more than {}s, marked offline",
            id, timeout_secs
        );
    }
    demoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use replica_common::{Deployment, InstanceInfo, InstanceStatus};

    fn monitor() -> (HealthMonitor, Arc<InstanceRegistry>) {
        let registry = Arc::new(InstanceRegistry::new(Arc::new(MemoryStore::new())));
        let settings = HeartbeatSettings {
            interval_secs: 30,
            offline_timeout_secs: 60,
        };
        (HealthMonitor::new(Arc::clone(&registry), settings), registry)
    }

    #[tokio::test]
    async fn test_stale_instance_goes_offline_after_one_sweep() {
        let (monitor, registry) = monitor();
        registry
            .register(InstanceInfo::new("a", "edge", Deployment::Remote))
            .await
            .unwrap();

        let demoted = monitor.sweep_at(Utc::now() + ChronoDuration::seconds(61)).await;
        assert_eq!(demoted, vec!["a".to_string()]);
        assert_eq!(
            registry.get("a").await.unwrap().status,
            InstanceStatus::Offline
        );
    }

    #[tokio::test]
    async fn test_fresh_instance_survives_sweep() {
        let (monitor, registry) = monitor();
        registry
            .register(InstanceInfo::new("a", "edge", Deployment::Remote))
            .await
            .unwrap();

        let demoted = monitor.sweep_at(Utc::now() + ChronoDuration::seconds(59)).await;
        assert!(demoted.is_empty());
        assert_eq!(
            registry.get("a").await.unwrap().status,
            InstanceStatus::Active
        );
    }

    #[tokio::test]
    async fn test_monitor_never_promotes_offline() {
        let (monitor, registry) = monitor();
        registry
            .register(InstanceInfo::new("a", "edge", Deployment::Remote))
            .await
            .unwrap();
        monitor.sweep_at(Utc::now() + ChronoDuration::seconds(61)).await;

        // later sweeps leave the offline entry alone
        let demoted = monitor.sweep_at(Utc::now() + ChronoDuration::seconds(300)).await;
        assert!(demoted.is_empty());
        assert_eq!(
            registry.get("a").await.unwrap().status,
            InstanceStatus::Offline
        );

        // recovery is caller-driven
        registry.update_status("a", InstanceStatus::Active).await;
        assert_eq!(
            registry.get("a").await.unwrap().status,
            InstanceStatus::Active
        );
    }

    #[tokio::test]
    async fn test_stop_heartbeat_is_idempotent() {
        let (monitor, _registry) = monitor();
        monitor.start_heartbeat().await;
        monitor.stop_heartbeat().await;
        monitor.stop_heartbeat().await;
    }
}

//! Instance telemetry - resource and traffic counters pushed by instances.
//!
//! Producers send partial patches; the registry merges them field by field
//! so a sensor that only knows CPU does not clobber network counters.

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Network-facing counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkTelemetry {
    pub latency_ms: u32,
    pub bandwidth_kbps: u32,
    pub online: bool,
}

/// Telemetry snapshot for one instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceTelemetry {
    pub cpu_percent: f32,
    pub memory_mb: u64,
    pub storage_mb: u64,
    pub network: NetworkTelemetry,
    pub uptime_secs: u64,
    pub request_count: u64,
    pub error_count: u64,
}

/// Partial telemetry update; `None` fields leave the stored value untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryPatch {
    pub cpu_percent: Option<f32>,
    pub memory_mb: Option<u64>,
    pub storage_mb: Option<u64>,
    pub network: Option<NetworkTelemetry>,
    pub uptime_secs: Option<u64>,
    pub request_count: Option<u64>,
    pub error_count: Option<u64>,
}

impl InstanceTelemetry {
    /// Merge a partial update into this record
    pub fn apply(&mut self, patch: &TelemetryPatch) {
        if let Some(cpu) = patch.cpu_percent {
            self.cpu_percent = cpu;
        }
        if let Some(memory) = patch.memory_mb {
            self.memory_mb = memory;
        }
        if let Some(storage) = patch.storage_mb {
            self.storage_mb = storage;
        }
        if let Some(network) = &patch.network {
            self.network = network.clone();
        }
        if let Some(uptime) = patch.uptime_secs {
            self.uptime_secs = uptime;
        }
        if let Some(requests) = patch.request_count {
            self.request_count = requests;
        }
        if let Some(errors) = patch.error_count {
            self.error_count = errors;
        }
    }

    /// Sample the local host so a deployed instance can self-report
    pub fn collect_local() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();

        let cpu_percent = if sys.cpus().is_empty() {
            0.0
        } else {
            sys.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / sys.cpus().len() as f32
        };

        Self {
            cpu_percent,
            memory_mb: sys.used_memory() / (1024 * 1024),
            storage_mb: 0,
            network: NetworkTelemetry {
                latency_ms: 0,
                bandwidth_kbps: 0,
                online: true,
            },
            uptime_secs: System::uptime(),
            request_count: 0,
            error_count: 0,
        }
    }
}

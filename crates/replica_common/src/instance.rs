//! Instance records tracked by the registry.
//!
//! Status is a small state machine: `active` and `offline` are the only
//! rest states. `syncing` and `error` are transient and must resolve via
//! a sync completion, a new operation, or re-registration.

use crate::telemetry::InstanceTelemetry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Reachable and idle
    Active,
    /// A sync operation is currently driving this instance
    Syncing,
    /// Last sync attempt failed; needs a new operation or re-registration
    Error,
    /// No heartbeat within the offline timeout
    Offline,
    /// Revoked clone; record retained for audit
    Inactive,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Syncing => "syncing",
            Self::Error => "error",
            Self::Offline => "offline",
            Self::Inactive => "inactive",
        }
    }

    /// Whether the FSM permits moving from `self` to `next`.
    ///
    /// Any state may time out to offline; offline recovers only to active
    /// (caller-driven). Transient states resolve back to active or error.
    pub fn can_transition(&self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        match (self, next) {
            (_, Offline) => true,
            (Offline, Active) => true,
            (Active, Syncing) | (Active, Error) | (Active, Inactive) => true,
            (Syncing, Active) | (Syncing, Error) => true,
            (Error, Syncing) | (Error, Active) => true,
            (Inactive, Active) => true,
            (a, b) => *a == b,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an instance is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    Local,
    Remote,
}

/// Declared capabilities of an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceCapabilities {
    pub ai_enabled: bool,
    pub persistent_storage: bool,
    pub offline_capable: bool,
    /// Maximum context window the instance accepts
    pub max_context_window: u32,
    /// Module names the instance can run
    pub supported_modules: Vec<String>,
}

impl Default for InstanceCapabilities {
    fn default() -> Self {
        Self {
            ai_enabled: true,
            persistent_storage: true,
            offline_capable: false,
            max_context_window: 4096,
            supported_modules: Vec::new(),
        }
    }
}

/// Live registry record for one deployed instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: InstanceStatus,
    pub deployment: Deployment,
    /// Network endpoint, when remote
    pub endpoint: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
    /// 0-100, last known synchronization completeness
    pub sync_percentage: u8,
    pub capabilities: InstanceCapabilities,
    pub telemetry: InstanceTelemetry,
}

impl InstanceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, deployment: Deployment) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: InstanceStatus::Active,
            deployment,
            endpoint: None,
            last_seen: Utc::now(),
            last_sync: None,
            sync_percentage: 0,
            capabilities: InstanceCapabilities::default(),
            telemetry: InstanceTelemetry::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: InstanceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

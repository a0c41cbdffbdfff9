//! Snapshots and clone configurations.
//!
//! A snapshot is an immutable point-in-time capture of the running system;
//! a clone configuration is a named, deployable instance definition derived
//! from one. Snapshots are never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Schema version stamped into snapshot metadata
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

/// One active feature module at capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: String,
}

/// A single contextual memory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub content: String,
}

/// Model-configuration parameters captured with a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    pub model: String,
    pub temperature: f32,
    pub token_budget: u32,
    pub system_prompt: String,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: 0.7,
            token_budget: 4096,
            system_prompt: String::new(),
        }
    }
}

/// Context bundle captured with a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotContext {
    pub memories: Vec<MemoryEntry>,
    pub preferences: HashMap<String, String>,
    pub capabilities: Vec<String>,
}

/// Snapshot metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub schema_version: u32,
    pub environment: String,
    /// Instance that produced the capture
    pub source_instance_id: String,
}

/// Immutable point-in-time capture of the running system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneSnapshot {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modules: Vec<ModuleDescriptor>,
    pub context: SnapshotContext,
    pub model: ModelParameters,
    pub meta: SnapshotMeta,
}

impl CloneSnapshot {
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }
}

/// AI context seeded into a clone from its snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiContext {
    pub memories: Vec<MemoryEntry>,
    /// Accumulated learnings; empty for a freshly derived clone
    pub learnings: Vec<String>,
    pub preferences: HashMap<String, String>,
}

/// Caller-supplied overrides for clone derivation
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Required, non-empty
    pub name: String,
    /// Defaults to the factory's configured context window when `None`
    pub context_window: Option<u32>,
    /// Defaults to the snapshot's capability tags when `None`
    pub capabilities: Option<Vec<String>>,
    pub restrictions: Option<Vec<String>>,
    /// Informational deployment target tag
    pub target: Option<String>,
}

/// Named, deployable instance definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneConfiguration {
    pub id: String,
    pub name: String,
    pub modules: Vec<String>,
    pub context: AiContext,
    pub model: ModelParameters,
    pub context_window: u32,
    pub capabilities: Vec<String>,
    pub restrictions: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Provenance chain back to the producing instance
    pub parent_instance_id: Option<String>,
}

impl CloneConfiguration {
    /// Derive a configuration from a snapshot plus caller overrides.
    /// Name validation happens in the factory, before persistence.
    pub fn from_snapshot(
        snapshot: &CloneSnapshot,
        options: &CloneOptions,
        default_context_window: u32,
    ) -> Self {
        Self {
            id: format!("clone-{}", Uuid::new_v4()),
            name: options.name.clone(),
            modules: snapshot.module_names(),
            context: AiContext {
                memories: snapshot.context.memories.clone(),
                learnings: Vec::new(),
                preferences: snapshot.context.preferences.clone(),
            },
            model: snapshot.model.clone(),
            context_window: options.context_window.unwrap_or(default_context_window),
            capabilities: options
                .capabilities
                .clone()
                .unwrap_or_else(|| snapshot.context.capabilities.clone()),
            restrictions: options.restrictions.clone().unwrap_or_default(),
            created_at: Utc::now(),
            parent_instance_id: Some(snapshot.meta.source_instance_id.clone()),
        }
    }
}

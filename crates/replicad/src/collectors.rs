//! Snapshot collectors - the upstream collaborators a capture reads from.
//!
//! The module source is required: without it a capture cannot say what the
//! system was running. Memory and preference sources degrade gracefully -
//! a failing source yields an empty field plus a recorded error, because a
//! partial snapshot is still useful for disaster recovery.

use replica_common::error::Result;
use replica_common::{MemoryEntry, ModuleDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Supplies the set of currently active feature modules
pub trait ModuleSource: Send + Sync {
    fn active_modules(&self) -> Result<Vec<ModuleDescriptor>>;
}

/// Supplies recent contextual memory entries
pub trait MemorySource: Send + Sync {
    fn fetch_recent(&self, n: usize) -> Result<Vec<MemoryEntry>>;
}

/// Supplies current preferences and declared capability tags
pub trait PreferenceSource: Send + Sync {
    fn preferences(&self) -> Result<HashMap<String, String>>;
    fn capabilities(&self) -> Result<Vec<String>>;
}

/// Identity/session collaborator; the id is treated as an opaque string
pub trait Identity: Send + Sync {
    fn instance_id(&self) -> String;
}

/// Bundle of collaborators handed to the snapshot factory
#[derive(Clone)]
pub struct CollectorSet {
    pub modules: Arc<dyn ModuleSource>,
    pub memory: Arc<dyn MemorySource>,
    pub preferences: Arc<dyn PreferenceSource>,
}

/// What a capture gathered, with per-source failures recorded
#[derive(Debug, Default)]
pub struct CollectorOutcome {
    pub modules: Vec<ModuleDescriptor>,
    pub memories: Vec<MemoryEntry>,
    pub preferences: HashMap<String, String>,
    pub capabilities: Vec<String>,
    pub errors: Vec<String>,
}

impl CollectorOutcome {
    pub fn add_error(&mut self, err: impl Into<String>) {
        self.errors.push(err.into());
    }
}

impl CollectorSet {
    /// Gather everything a snapshot captures.
    ///
    /// Returns Err only when the required module source fails; any other
    /// source failure is recorded on the outcome and the field left empty.
    pub fn gather(&self, memory_window: usize) -> Result<CollectorOutcome> {
        let mut outcome = CollectorOutcome::default();

        outcome.modules = self.modules.active_modules()?;

        match self.memory.fetch_recent(memory_window) {
            Ok(memories) => outcome.memories = memories,
            Err(e) => {
                warn!("Memory source failed, capturing without memories: {}", e);
                outcome.add_error(format!("memory: {e}"));
            }
        }

        match self.preferences.preferences() {
            Ok(preferences) => outcome.preferences = preferences,
            Err(e) => {
                warn!("Preference source failed, capturing without preferences: {}", e);
                outcome.add_error(format!("preferences: {e}"));
            }
        }

        match self.preferences.capabilities() {
            Ok(capabilities) => outcome.capabilities = capabilities,
            Err(e) => {
                warn!("Capability lookup failed, capturing without capabilities: {}", e);
                outcome.add_error(format!("capabilities: {e}"));
            }
        }

        Ok(outcome)
    }
}

/// Config-seeded module source used by the daemon binary and tests
pub struct StaticModuleSource {
    pub modules: Vec<ModuleDescriptor>,
}

impl ModuleSource for StaticModuleSource {
    fn active_modules(&self) -> Result<Vec<ModuleDescriptor>> {
        Ok(self.modules.clone())
    }
}

/// Fixed memory source
pub struct StaticMemorySource {
    pub entries: Vec<MemoryEntry>,
}

impl MemorySource for StaticMemorySource {
    fn fetch_recent(&self, n: usize) -> Result<Vec<MemoryEntry>> {
        let skip = self.entries.len().saturating_sub(n);
        Ok(self.entries[skip..].to_vec())
    }
}

/// Fixed preference source
pub struct StaticPreferenceSource {
    pub preferences: HashMap<String, String>,
    pub capabilities: Vec<String>,
}

impl PreferenceSource for StaticPreferenceSource {
    fn preferences(&self) -> Result<HashMap<String, String>> {
        Ok(self.preferences.clone())
    }

    fn capabilities(&self) -> Result<Vec<String>> {
        Ok(self.capabilities.clone())
    }
}

/// Stable per-process identity
pub struct ProcessIdentity {
    id: String,
}

impl ProcessIdentity {
    pub fn new() -> Self {
        Self {
            id: format!("inst-{}", Uuid::new_v4()),
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for ProcessIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl Identity for ProcessIdentity {
    fn instance_id(&self) -> String {
        self.id.clone()
    }
}

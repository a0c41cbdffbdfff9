//! Error taxonomy for the orchestration core.
//!
//! Registration-path errors (`Validation`, `Persistence`) are fail-fast:
//! nothing enters the live registry when they fire. Telemetry and status
//! updates on unknown instances are deliberately *not* errors and never
//! surface here.

/// Errors produced by the orchestration core
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReplicaError {
    /// Bad caller input (empty name, unknown enum value)
    #[error("invalid input: {0}")]
    Validation(String),

    /// Referenced instance or operation does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Durable store unreachable or write rejected
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// An upstream data source for a snapshot failed
    #[error("collector '{collector}' failed: {reason}")]
    Collector { collector: String, reason: String },

    /// A sync transfer step failed, with its original cause text
    #[error("sync execution failed: {0}")]
    Execution(String),
}

impl ReplicaError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn collector(collector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Collector {
            collector: collector.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReplicaError>;

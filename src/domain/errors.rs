//! Domain errors for the vanguard orchestration engine.

use thiserror::Error;
use uuid::Uuid;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[Uuid]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Domain-level errors. All variants are recoverable at the request
/// boundary and are reported to the caller as structured failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Mission not found: {0}")]
    MissionNotFound(Uuid),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Task {task_id} exhausted its retries ({retry_count}/{max_retries}); audit required")]
    MaxRetriesExceeded {
        task_id: Uuid,
        retry_count: u32,
        max_retries: u32,
        needs_audit: bool,
    },

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<Uuid>),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("No eligible agent for role '{role}'")]
    NoEligibleAgent { role: String },

    #[error("Unknown audit decision: '{0}'")]
    UnknownAuditDecision(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether the failure should direct the caller to the audit protocol.
    pub fn needs_audit(&self) -> bool {
        matches!(self, Self::MaxRetriesExceeded { needs_audit: true, .. })
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

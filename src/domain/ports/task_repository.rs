use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskKind, TaskStatus};

/// Filters for querying tasks within a mission.
#[derive(Default, Debug, Clone)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub kind: Option<TaskKind>,
    pub assigned_to: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Repository port for task persistence.
///
/// All mutation goes through single-row updates; the guarded variants are
/// the compare-and-update primitives the orchestration protocol relies on.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task together with its dependency edges.
    async fn create(&self, task: &Task) -> DomainResult<()>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Update an existing task. Fails with `TaskNotFound` if absent.
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// Compare-and-update: persist `task` only if the stored row still has
    /// `expected` status. Returns whether the update was applied.
    async fn update_if_status(&self, task: &Task, expected: TaskStatus) -> DomainResult<bool>;

    /// Atomically claim a pending task for an agent.
    ///
    /// The claim applies only if the stored row is still `pending` and
    /// unassigned (or already assigned to this agent), transactionally
    /// moving it to `in_progress`. Returns whether this caller won the
    /// claim; losing a race is not an error.
    async fn try_claim(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<bool>;

    /// Delete a task by ID.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List a mission's tasks with optional filters.
    async fn list_by_mission(&self, mission_id: Uuid, filter: TaskFilter)
        -> DomainResult<Vec<Task>>;

    /// Add a dependency edge. Cycle validation happens in the service
    /// layer before this is called.
    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()>;

    /// Remove a dependency edge. Unconditional.
    async fn remove_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()>;

    /// Count a mission's tasks grouped by status.
    async fn count_by_status(&self, mission_id: Uuid)
        -> DomainResult<HashMap<TaskStatus, u64>>;

    /// Count tasks currently in progress for an agent.
    async fn count_active_for_agent(&self, agent_id: Uuid) -> DomainResult<u64>;
}

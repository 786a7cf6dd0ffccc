//! Task service: submission, dispatch, and dependency management.
//!
//! Dispatch is where the concurrency contract lives: claiming a task is a
//! single atomic conditional update, so two polling workers can never
//! execute the same task.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LogEntry, Task, TaskKind, TaskStatus};
use crate::domain::ports::{AgentRepository, MissionRepository, TaskFilter, TaskRepository};
use crate::services::dependency_graph::{BlockedTask, CriticalPath, DagView, MissionGraph};

/// Parameters for submitting a task directly (not via a plan).
#[derive(Debug, Clone, Default)]
pub struct TaskSubmission {
    pub title: String,
    pub description: String,
    pub kind: TaskKind,
    pub depends_on: Vec<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub estimated_duration_seconds: Option<i64>,
    pub max_retries: Option<u32>,
    pub input: Option<serde_json::Value>,
}

/// Task lifecycle operations and per-mission graph queries.
pub struct TaskService<T, M, A>
where
    T: TaskRepository,
    M: MissionRepository,
    A: AgentRepository,
{
    task_repo: Arc<T>,
    mission_repo: Arc<M>,
    agent_repo: Arc<A>,
    default_max_retries: u32,
}

impl<T, M, A> TaskService<T, M, A>
where
    T: TaskRepository,
    M: MissionRepository,
    A: AgentRepository,
{
    pub fn new(task_repo: Arc<T>, mission_repo: Arc<M>, agent_repo: Arc<A>) -> Self {
        Self {
            task_repo,
            mission_repo,
            agent_repo,
            default_max_retries: 3,
        }
    }

    /// Override the default retry budget applied to new tasks.
    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Submit a user-created task into a mission.
    ///
    /// Dependencies must reference existing tasks in the same mission and
    /// may not close a cycle; both are checked before anything persists.
    pub async fn submit(&self, mission_id: Uuid, submission: TaskSubmission) -> DomainResult<Task> {
        self.mission_repo
            .get(mission_id)
            .await?
            .ok_or(DomainError::MissionNotFound(mission_id))?;

        let existing = self
            .task_repo
            .list_by_mission(mission_id, TaskFilter::default())
            .await?;

        let mut task = Task::new(mission_id, submission.title, submission.description)
            .with_kind(submission.kind)
            .with_max_retries(
                submission.max_retries.unwrap_or(self.default_max_retries),
            );
        task.assigned_to = submission.assigned_to;
        task.estimated_duration_seconds = submission.estimated_duration_seconds;
        task.input = submission.input;

        for &dep in &submission.depends_on {
            if dep == task.id || submission.depends_on.iter().filter(|&&d| d == dep).count() > 1 {
                return Err(DomainError::ValidationFailed(
                    "duplicate or self-referencing dependency".to_string(),
                ));
            }
            if !existing.iter().any(|t| t.id == dep) {
                return Err(DomainError::TaskNotFound(dep));
            }
        }
        task.depends_on = submission.depends_on;
        task.validate()?;

        // A new node cannot close a cycle among existing tasks, but run the
        // whole-graph check anyway before persisting any edge.
        let mut snapshot = existing;
        snapshot.push(task.clone());
        if let Some(cycle) = MissionGraph::from_tasks(&snapshot).detect_cycle() {
            return Err(DomainError::DependencyCycle(cycle));
        }

        self.task_repo.create(&task).await?;
        self.mission_repo
            .append_log(
                mission_id,
                &LogEntry::new(
                    "task_created",
                    json!({"task_id": task.id, "title": task.title, "kind": task.kind.as_str()}),
                ),
            )
            .await?;
        Ok(task)
    }

    pub async fn get(&self, task_id: Uuid) -> DomainResult<Task> {
        self.task_repo
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    pub async fn list(&self, mission_id: Uuid, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        self.task_repo.list_by_mission(mission_id, filter).await
    }

    /// Delete a task. The only way a task ever leaves the system.
    pub async fn delete(&self, task_id: Uuid) -> DomainResult<()> {
        self.task_repo.delete(task_id).await
    }

    /// Claim a specific task for an agent.
    ///
    /// Verifies the mission allows dispatch and every dependency is
    /// completed, then performs the atomic conditional claim. Losing the
    /// race to another worker is a `ConcurrencyConflict`.
    pub async fn claim(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<Task> {
        let task = self.get(task_id).await?;
        let mission = self
            .mission_repo
            .get(task.mission_id)
            .await?
            .ok_or(DomainError::MissionNotFound(task.mission_id))?;

        if !mission.status.allows_dispatch() {
            return Err(DomainError::ValidationFailed(format!(
                "mission {} is {} and does not dispatch tasks",
                mission.id,
                mission.status.as_str()
            )));
        }

        let tasks = self
            .task_repo
            .list_by_mission(task.mission_id, TaskFilter::default())
            .await?;
        let graph = MissionGraph::from_tasks(&tasks);
        if !graph.executable().contains(&task_id) {
            return Err(DomainError::ValidationFailed(format!(
                "task {task_id} is not executable (pending, not under audit, dependencies completed)"
            )));
        }

        if !self.task_repo.try_claim(task_id, agent_id).await? {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: task_id.to_string(),
            });
        }

        self.mark_agent_busy(agent_id).await?;
        self.mission_repo
            .append_log(
                task.mission_id,
                &LogEntry::new(
                    "task_claimed",
                    json!({"task_id": task_id, "agent_id": agent_id}),
                ),
            )
            .await?;

        debug!(task_id = %task_id, agent_id = %agent_id, "task claimed");
        self.get(task_id).await
    }

    /// Claim the next executable task in a mission, if any.
    ///
    /// Walks the executable set in graph order; the first atomic claim
    /// that succeeds wins. Returns `None` when nothing is claimable.
    pub async fn claim_next(&self, mission_id: Uuid, agent_id: Uuid) -> DomainResult<Option<Task>> {
        let mission = self
            .mission_repo
            .get(mission_id)
            .await?
            .ok_or(DomainError::MissionNotFound(mission_id))?;
        if !mission.status.allows_dispatch() {
            return Ok(None);
        }

        let tasks = self
            .task_repo
            .list_by_mission(mission_id, TaskFilter::default())
            .await?;
        let graph = MissionGraph::from_tasks(&tasks);

        for candidate in graph.executable() {
            // Skip tasks reserved for someone else
            let reserved_for_other = tasks
                .iter()
                .find(|t| t.id == candidate)
                .and_then(|t| t.assigned_to)
                .map_or(false, |assignee| assignee != agent_id);
            if reserved_for_other {
                continue;
            }

            if self.task_repo.try_claim(candidate, agent_id).await? {
                self.mark_agent_busy(agent_id).await?;
                self.mission_repo
                    .append_log(
                        mission_id,
                        &LogEntry::new(
                            "task_claimed",
                            json!({"task_id": candidate, "agent_id": agent_id}),
                        ),
                    )
                    .await?;
                return Ok(Some(self.get(candidate).await?));
            }
        }
        Ok(None)
    }

    /// Mark an in-progress task completed and fold the duration into the
    /// executing agent's metrics.
    pub async fn complete(
        &self,
        task_id: Uuid,
        output: Option<serde_json::Value>,
    ) -> DomainResult<Task> {
        let mut task = self.get(task_id).await?;
        let agent_id = task.assigned_to;

        task.transition_to(TaskStatus::Completed)?;
        task.output = output;
        let applied = self
            .task_repo
            .update_if_status(&task, TaskStatus::InProgress)
            .await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: task.id.to_string(),
            });
        }

        if let Some(agent_id) = agent_id {
            self.record_agent_success(agent_id, &task).await?;
        }

        self.mission_repo
            .append_log(
                task.mission_id,
                &LogEntry::new("task_completed", json!({"task_id": task.id})),
            )
            .await?;
        Ok(task)
    }

    /// Add a dependency edge after eager cycle validation.
    pub async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<Task> {
        let task = self.get(task_id).await?;
        let dep = self.get(depends_on).await?;
        if dep.mission_id != task.mission_id {
            return Err(DomainError::ValidationFailed(
                "dependencies must reference tasks in the same mission".to_string(),
            ));
        }

        let tasks = self
            .task_repo
            .list_by_mission(task.mission_id, TaskFilter::default())
            .await?;
        MissionGraph::from_tasks(&tasks).validate_new_edge(task_id, depends_on)?;

        self.task_repo.add_dependency(task_id, depends_on).await?;
        self.mission_repo
            .append_log(
                task.mission_id,
                &LogEntry::new(
                    "dependency_added",
                    json!({"task_id": task_id, "depends_on": depends_on}),
                ),
            )
            .await?;
        self.get(task_id).await
    }

    /// Remove a dependency edge. Unconditional.
    pub async fn remove_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<Task> {
        let task = self.get(task_id).await?;
        self.task_repo.remove_dependency(task_id, depends_on).await?;
        self.mission_repo
            .append_log(
                task.mission_id,
                &LogEntry::new(
                    "dependency_removed",
                    json!({"task_id": task_id, "depends_on": depends_on}),
                ),
            )
            .await?;
        self.get(task_id).await
    }

    /// Tasks eligible for dispatch right now.
    pub async fn executable_tasks(&self, mission_id: Uuid) -> DomainResult<Vec<Task>> {
        let tasks = self
            .task_repo
            .list_by_mission(mission_id, TaskFilter::default())
            .await?;
        let executable = MissionGraph::from_tasks(&tasks).executable();
        Ok(tasks
            .into_iter()
            .filter(|t| executable.contains(&t.id))
            .collect())
    }

    /// Pending tasks held back by incomplete dependencies.
    pub async fn blocked_tasks(&self, mission_id: Uuid) -> DomainResult<Vec<BlockedTask>> {
        let tasks = self
            .task_repo
            .list_by_mission(mission_id, TaskFilter::default())
            .await?;
        Ok(MissionGraph::from_tasks(&tasks).blocked())
    }

    /// Serializable snapshot of the mission's DAG.
    pub async fn dag(&self, mission_id: Uuid) -> DomainResult<DagView> {
        self.mission_repo
            .get(mission_id)
            .await?
            .ok_or(DomainError::MissionNotFound(mission_id))?;
        let tasks = self
            .task_repo
            .list_by_mission(mission_id, TaskFilter::default())
            .await?;
        Ok(MissionGraph::from_tasks(&tasks).to_view())
    }

    /// Longest weighted path through the mission's DAG.
    pub async fn critical_path(&self, mission_id: Uuid) -> DomainResult<CriticalPath> {
        let tasks = self
            .task_repo
            .list_by_mission(mission_id, TaskFilter::default())
            .await?;
        MissionGraph::from_tasks(&tasks).critical_path()
    }

    async fn mark_agent_busy(&self, agent_id: Uuid) -> DomainResult<()> {
        let Some(mut agent) = self.agent_repo.get(agent_id).await? else {
            return Ok(());
        };
        agent.status = crate::domain::models::AgentStatus::Busy;
        agent.updated_at = Utc::now();
        self.agent_repo.update(&agent).await
    }

    async fn record_agent_success(&self, agent_id: Uuid, task: &Task) -> DomainResult<()> {
        let Some(mut agent) = self.agent_repo.get(agent_id).await? else {
            return Ok(());
        };
        let duration = match (task.started_at, task.completed_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };
        agent.record_success(duration.max(0.0));
        if agent.status == crate::domain::models::AgentStatus::Busy {
            agent.status = crate::domain::models::AgentStatus::Active;
        }
        self.agent_repo.update(&agent).await
    }
}

//! Orchestration coordinator.
//!
//! Materializes lead-agent plans into agents and tasks, routes failures
//! through the retry/audit protocol, and detects mission completion.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, LogEntry, MissionPlan, MissionStatus, Task, TaskKind, TaskStatus,
};
use crate::domain::ports::{AgentRepository, AgentScorer, MissionRepository, TaskRepository};
use crate::services::dependency_graph::MissionGraph;
use crate::services::retry_service::{FailureReport, RetryManager};

/// One plan item the coordinator could not materialize.
#[derive(Debug, Clone, Serialize)]
pub struct PlanItemFailure {
    /// Plan-local identifier (agent name or task local id)
    pub item: String,
    pub error: String,
}

/// Partial-success summary of plan processing.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub mission_id: Uuid,
    pub agents_created: Vec<Uuid>,
    pub agents_reused: Vec<Uuid>,
    pub tasks_created: Vec<Uuid>,
    pub failures: Vec<PlanItemFailure>,
}

/// Result of a completion check.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionStatus {
    pub mission_id: Uuid,
    pub completed: bool,
    pub total_tasks: u64,
    pub completed_tasks: u64,
}

/// Coordinates plan materialization, failure routing, and completion.
pub struct MissionCoordinator<T, M, A, S>
where
    T: TaskRepository,
    M: MissionRepository,
    A: AgentRepository,
    S: AgentScorer,
{
    task_repo: Arc<T>,
    mission_repo: Arc<M>,
    agent_repo: Arc<A>,
    scorer: Arc<S>,
    retry: RetryManager,
    /// Role the audit protocol addresses review tasks to
    auditor_role: String,
}

impl<T, M, A, S> MissionCoordinator<T, M, A, S>
where
    T: TaskRepository,
    M: MissionRepository,
    A: AgentRepository,
    S: AgentScorer,
{
    pub fn new(
        task_repo: Arc<T>,
        mission_repo: Arc<M>,
        agent_repo: Arc<A>,
        scorer: Arc<S>,
        auditor_role: impl Into<String>,
    ) -> Self {
        Self {
            task_repo,
            mission_repo,
            agent_repo,
            scorer,
            retry: RetryManager::new(),
            auditor_role: auditor_role.into(),
        }
    }

    /// Materialize a validated plan into agents and tasks.
    ///
    /// The plan document is untrusted: structural validation and a cycle
    /// check run before anything is persisted. A failure creating one
    /// entity is recorded and does not abort the remaining items.
    pub async fn process_plan(
        &self,
        mission_id: Uuid,
        lead_task_id: Option<Uuid>,
        raw_plan: &serde_json::Value,
    ) -> DomainResult<PlanSummary> {
        let mission = self
            .mission_repo
            .get(mission_id)
            .await?
            .ok_or(DomainError::MissionNotFound(mission_id))?;

        let plan = MissionPlan::from_json(raw_plan)?;

        // Stage tasks with their final ids so dependency references can be
        // resolved and cycle-checked before anything hits the store.
        let mut local_ids: HashMap<String, Uuid> = HashMap::new();
        for spec in &plan.tasks {
            local_ids.insert(spec.local_id.clone(), Uuid::new_v4());
        }

        let mut staged: Vec<Task> = Vec::with_capacity(plan.tasks.len());
        for spec in &plan.tasks {
            let mut task = Task::new(mission_id, spec.title.clone(), spec.description.clone())
                .with_kind(spec.kind);
            task.id = local_ids[&spec.local_id];
            task.depends_on = spec
                .dependencies
                .iter()
                .map(|dep| local_ids[dep])
                .collect();
            if let Some(seconds) = spec.estimated_duration_seconds {
                task.estimated_duration_seconds = Some(seconds);
            }
            if let Some(input) = &spec.input {
                task.input = Some(input.clone());
            }
            staged.push(task);
        }

        let graph = MissionGraph::from_tasks(&staged);
        if let Some(cycle) = graph.detect_cycle() {
            return Err(DomainError::DependencyCycle(cycle));
        }
        // Insert in dependency order so edges always point at existing rows
        let creation_order = graph.topological_order()?;

        let mut summary = PlanSummary {
            mission_id,
            agents_created: Vec::new(),
            agents_reused: Vec::new(),
            tasks_created: Vec::new(),
            failures: Vec::new(),
        };

        let mut agent_ids: HashMap<String, Uuid> = HashMap::new();
        for spec in &plan.agents {
            match self.create_or_reuse_agent(mission_id, &spec.name, &spec.role).await {
                Ok((agent, reused)) => {
                    agent_ids.insert(spec.name.clone(), agent.id);
                    if reused {
                        summary.agents_reused.push(agent.id);
                    } else {
                        summary.agents_created.push(agent.id);
                    }
                    self.append_log(
                        mission_id,
                        if reused { "agent_reused" } else { "agent_created" },
                        json!({"agent_id": agent.id, "name": agent.name, "role": agent.role}),
                    )
                    .await?;
                }
                Err(err) => {
                    warn!(agent = %spec.name, error = %err, "failed to materialize plan agent");
                    self.append_log(
                        mission_id,
                        "agent_creation_failed",
                        json!({"name": spec.name, "error": err.to_string()}),
                    )
                    .await?;
                    summary.failures.push(PlanItemFailure {
                        item: spec.name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let by_id: HashMap<Uuid, &Task> = staged.iter().map(|t| (t.id, t)).collect();
        let spec_by_id: HashMap<Uuid, &crate::domain::models::PlanTask> = plan
            .tasks
            .iter()
            .map(|spec| (local_ids[&spec.local_id], spec))
            .collect();
        let mut created: HashMap<Uuid, bool> = HashMap::new();

        for id in creation_order {
            let mut task = (*by_id[&id]).clone();
            let spec = spec_by_id[&id];

            if let Some(agent_name) = &spec.assigned_agent {
                task.assigned_to = agent_ids.get(agent_name).copied();
            }
            // Edges to plan items that failed to materialize cannot be
            // persisted; record the drop so it is visible in the log
            let dropped: Vec<Uuid> = task
                .depends_on
                .iter()
                .copied()
                .filter(|dep| !created.get(dep).copied().unwrap_or(false))
                .collect();
            if !dropped.is_empty() {
                task.depends_on.retain(|dep| !dropped.contains(dep));
                self.append_log(
                    mission_id,
                    "dependencies_dropped",
                    json!({"local_id": spec.local_id, "dropped": dropped}),
                )
                .await?;
            }

            match self.task_repo.create(&task).await {
                Ok(()) => {
                    created.insert(task.id, true);
                    summary.tasks_created.push(task.id);
                    self.append_log(
                        mission_id,
                        "task_created",
                        json!({"task_id": task.id, "title": task.title, "kind": task.kind.as_str()}),
                    )
                    .await?;
                }
                Err(err) => {
                    warn!(task = %spec.local_id, error = %err, "failed to materialize plan task");
                    created.insert(task.id, false);
                    self.append_log(
                        mission_id,
                        "task_creation_failed",
                        json!({"local_id": spec.local_id, "error": err.to_string()}),
                    )
                    .await?;
                    summary.failures.push(PlanItemFailure {
                        item: spec.local_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        self.append_log(
            mission_id,
            "plan_processed",
            json!({
                "lead_task_id": lead_task_id,
                "agents_created": summary.agents_created.len(),
                "agents_reused": summary.agents_reused.len(),
                "tasks_created": summary.tasks_created.len(),
                "failures": summary.failures.len(),
            }),
        )
        .await?;

        if let Some(lead_task_id) = lead_task_id {
            self.complete_lead_task(lead_task_id, &summary).await?;
        }

        info!(
            mission_id = %mission.id,
            tasks = summary.tasks_created.len(),
            agents = summary.agents_created.len() + summary.agents_reused.len(),
            failures = summary.failures.len(),
            "processed mission plan"
        );
        Ok(summary)
    }

    /// Route a task failure through the retry/audit protocol.
    ///
    /// When the retry budget is exhausted, an audit-review task is created
    /// (addressed to an auditor-role agent) and the task is parked under
    /// audit.
    pub async fn record_failure(
        &self,
        task_id: Uuid,
        error: &str,
        agent_id: Option<Uuid>,
    ) -> DomainResult<FailureReport> {
        let mut task = self
            .task_repo
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        let prior_status = task.status;
        let report = self.retry.record_failure(&mut task, error, agent_id)?;
        let applied = self.task_repo.update_if_status(&task, prior_status).await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: task.id.to_string(),
            });
        }

        if let Some(agent_id) = agent_id {
            self.record_agent_failure(agent_id).await?;
        }

        self.append_log(
            task.mission_id,
            "task_failed",
            json!({
                "task_id": task.id,
                "error": error,
                "retry_count": task.retry_count,
                "needs_audit": report.needs_audit,
            }),
        )
        .await?;

        if report.needs_audit {
            self.open_audit(&mut task).await?;
        }

        Ok(FailureReport {
            status: task.status,
            ..report
        })
    }

    /// Manual retry of a failed task; the `POST /tasks/:id/retry`
    /// analogue.
    pub async fn retry_task(&self, task_id: Uuid) -> DomainResult<Task> {
        let mut task = self
            .task_repo
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        self.retry.retry(&mut task)?;
        let applied = self
            .task_repo
            .update_if_status(&task, TaskStatus::Failed)
            .await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: task.id.to_string(),
            });
        }

        self.append_log(
            task.mission_id,
            "task_retried",
            json!({"task_id": task.id, "retry_count": task.retry_count}),
        )
        .await?;
        Ok(task)
    }

    /// Record a human's answer, unblocking the escalated task.
    pub async fn answer_human_task(
        &self,
        human_task_id: Uuid,
        response: serde_json::Value,
    ) -> DomainResult<Task> {
        let mut human_task = self
            .task_repo
            .get(human_task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(human_task_id))?;

        if human_task.kind != TaskKind::HumanInput {
            return Err(DomainError::ValidationFailed(format!(
                "task {human_task_id} is not a human-input task"
            )));
        }
        if human_task.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: human_task.status.as_str().to_string(),
                to: TaskStatus::Completed.as_str().to_string(),
                reason: "human task already answered".to_string(),
            });
        }

        let original_id = human_task
            .input
            .as_ref()
            .and_then(|input| input.get("original_task_id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| DomainError::ValidationFailed(
                "human task carries no original task reference".to_string(),
            ))?;

        if human_task.status == TaskStatus::Pending {
            human_task.transition_to(TaskStatus::InProgress)?;
        }
        human_task.transition_to(TaskStatus::Completed)?;
        human_task.output = Some(response);
        self.task_repo.update(&human_task).await?;

        let mut original = self
            .task_repo
            .get(original_id)
            .await?
            .ok_or(DomainError::TaskNotFound(original_id))?;
        original.transition_to(TaskStatus::Pending)?;
        original.human_task_id = None;
        let applied = self
            .task_repo
            .update_if_status(&original, TaskStatus::AwaitingHumanResponse)
            .await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: original.id.to_string(),
            });
        }

        if let Some(mut mission) = self.mission_repo.get(original.mission_id).await? {
            if mission.awaiting_human_task_id == Some(human_task_id) {
                mission.awaiting_human_task_id = None;
                mission.touch();
                self.mission_repo.update(&mission).await?;
            }
        }

        self.append_log(
            original.mission_id,
            "human_response_received",
            json!({"task_id": original.id, "human_task_id": human_task_id}),
        )
        .await?;
        Ok(original)
    }

    /// Check whether every task in the mission has finished; complete the
    /// mission and release its lead agent when so.
    ///
    /// Idempotent: checking an already-completed mission changes nothing
    /// and writes no log entries.
    pub async fn check_completion(&self, mission_id: Uuid) -> DomainResult<CompletionStatus> {
        let mission = self
            .mission_repo
            .get(mission_id)
            .await?
            .ok_or(DomainError::MissionNotFound(mission_id))?;

        let tasks = self
            .task_repo
            .list_by_mission(mission_id, Default::default())
            .await?;
        let total = tasks.len() as u64;
        let completed = tasks.iter().filter(|t| t.is_terminal()).count() as u64;

        if mission.status == MissionStatus::Completed {
            return Ok(CompletionStatus {
                mission_id,
                completed: true,
                total_tasks: total,
                completed_tasks: completed,
            });
        }

        let all_done = total > 0 && completed == total;
        if !all_done {
            return Ok(CompletionStatus {
                mission_id,
                completed: false,
                total_tasks: total,
                completed_tasks: completed,
            });
        }

        let prior_status = mission.status;
        let mut mission = mission;
        mission.status = MissionStatus::Completed;
        mission.touch();

        // Status-guarded update: exactly one caller wins the completion,
        // so the lead agent is never released twice.
        let applied = self
            .mission_repo
            .update_if_status(&mission, prior_status)
            .await?;
        if applied {
            if let Some(lead_id) = mission.lead_agent_id {
                self.release_lead_agent(lead_id).await?;
            }
            self.append_log(
                mission_id,
                "mission_completed",
                json!({"total_tasks": total}),
            )
            .await?;
            info!(mission_id = %mission_id, "mission completed");
        }

        Ok(CompletionStatus {
            mission_id,
            completed: true,
            total_tasks: total,
            completed_tasks: completed,
        })
    }

    async fn create_or_reuse_agent(
        &self,
        mission_id: Uuid,
        name: &str,
        role: &str,
    ) -> DomainResult<(Agent, bool)> {
        if let Some(mut existing) = self.agent_repo.get_by_name(name).await? {
            if existing.current_mission_id.is_none() {
                existing.current_mission_id = Some(mission_id);
                existing.status = crate::domain::models::AgentStatus::Active;
                existing.updated_at = chrono::Utc::now();
                self.agent_repo.update(&existing).await?;
            }
            return Ok((existing, true));
        }

        let agent = Agent::new(name, role).with_mission(mission_id);
        self.agent_repo.create(&agent).await?;
        Ok((agent, false))
    }

    /// Create the audit-review task and park the failed task under audit.
    async fn open_audit(&self, task: &mut Task) -> DomainResult<()> {
        let mut review = Task::new(
            task.mission_id,
            format!("Audit review: {}", task.title),
            format!(
                "Task '{}' failed {} times and exhausted its retries. \
                 Review the history and choose a recovery action.",
                task.title, task.retry_count
            ),
        )
        .with_kind(TaskKind::AuditReview)
        .with_input(json!({
            "failed_task_id": task.id,
            "failed_task_kind": task.kind.as_str(),
            "assigned_to": task.assigned_to,
            "error": task.error,
            "retry_history": task.retry_history,
        }));

        if let Some(auditor) = self.scorer.select_best(&self.auditor_role, task.mission_id).await? {
            review.assigned_to = Some(auditor.id);
        }
        self.task_repo.create(&review).await?;

        self.retry.request_audit(task, review.id)?;
        let applied = self
            .task_repo
            .update_if_status(task, TaskStatus::Failed)
            .await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: task.id.to_string(),
            });
        }

        self.append_log(
            task.mission_id,
            "audit_requested",
            json!({"task_id": task.id, "audit_task_id": review.id}),
        )
        .await?;
        Ok(())
    }

    /// Complete the lead agent's plan-analysis task with the summary as
    /// its output. Missing or already-finished lead tasks are tolerated.
    async fn complete_lead_task(
        &self,
        lead_task_id: Uuid,
        summary: &PlanSummary,
    ) -> DomainResult<()> {
        let Some(mut lead_task) = self.task_repo.get(lead_task_id).await? else {
            return Ok(());
        };
        if lead_task.is_terminal() {
            return Ok(());
        }
        if lead_task.status == TaskStatus::Pending {
            lead_task.transition_to(TaskStatus::InProgress)?;
        }
        lead_task.transition_to(TaskStatus::Completed)?;
        lead_task.output = Some(serde_json::to_value(summary)?);
        self.task_repo.update(&lead_task).await
    }

    async fn release_lead_agent(&self, agent_id: Uuid) -> DomainResult<()> {
        let Some(mut agent) = self.agent_repo.get(agent_id).await? else {
            return Ok(());
        };
        agent.release_from_mission();
        self.agent_repo.update(&agent).await
    }

    async fn record_agent_failure(&self, agent_id: Uuid) -> DomainResult<()> {
        let Some(mut agent) = self.agent_repo.get(agent_id).await? else {
            return Ok(());
        };
        agent.record_failure();
        if agent.status == crate::domain::models::AgentStatus::Busy {
            agent.status = crate::domain::models::AgentStatus::Active;
        }
        self.agent_repo.update(&agent).await
    }

    async fn append_log(
        &self,
        mission_id: Uuid,
        action: &str,
        details: serde_json::Value,
    ) -> DomainResult<()> {
        self.mission_repo
            .append_log(mission_id, &LogEntry::new(action, details))
            .await
    }
}

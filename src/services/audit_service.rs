//! Audit decision processor.
//!
//! Applies the recovery action chosen by a human or an auditor agent to a
//! task that exhausted its automatic retries.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LogEntry, Task, TaskStatus};
use crate::domain::ports::{AgentScorer, MissionRepository, TaskRepository};

/// The four recovery actions an auditor may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    /// Hand the task to a different agent
    Reassign,
    /// Rewrite the task description and requeue
    Refine,
    /// Ask a human and hold the task until they answer
    EscalateHuman,
    /// Grant one extra attempt and requeue
    Retry,
}

impl AuditDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reassign => "reassign",
            Self::Refine => "refine",
            Self::EscalateHuman => "escalate_human",
            Self::Retry => "retry",
        }
    }
}

impl FromStr for AuditDecision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reassign" => Ok(Self::Reassign),
            "refine" => Ok(Self::Refine),
            "escalate_human" => Ok(Self::EscalateHuman),
            "retry" => Ok(Self::Retry),
            other => Err(DomainError::UnknownAuditDecision(other.to_string())),
        }
    }
}

/// A decision together with its supporting arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditDecisionRequest {
    pub decision: AuditDecision,
    /// Why the auditor chose this action
    pub reason: String,
    /// Role to reassign to (`Reassign` only)
    #[serde(default)]
    pub suggested_agent_role: Option<String>,
    /// Replacement description (`Refine` only)
    #[serde(default)]
    pub refined_description: Option<String>,
    /// Question to put to the human (`EscalateHuman` only)
    #[serde(default)]
    pub question_for_human: Option<String>,
}

/// Result handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOutcome {
    pub decision: AuditDecision,
    pub message: String,
    /// Human-input task created by `EscalateHuman`
    pub human_task_id: Option<Uuid>,
}

/// Applies audit decisions against audited tasks.
pub struct AuditService<T, M, S>
where
    T: TaskRepository,
    M: MissionRepository,
    S: AgentScorer,
{
    task_repo: Arc<T>,
    mission_repo: Arc<M>,
    scorer: Arc<S>,
}

impl<T, M, S> AuditService<T, M, S>
where
    T: TaskRepository,
    M: MissionRepository,
    S: AgentScorer,
{
    pub fn new(task_repo: Arc<T>, mission_repo: Arc<M>, scorer: Arc<S>) -> Self {
        Self {
            task_repo,
            mission_repo,
            scorer,
        }
    }

    /// Apply one audit decision to a task under audit.
    ///
    /// The task document is mutated and persisted with a status-guarded
    /// update, so two concurrent decisions cannot both apply. The open
    /// audit-review task is resolved with the decision as its output.
    pub async fn apply_decision(
        &self,
        task_id: Uuid,
        request: AuditDecisionRequest,
    ) -> DomainResult<AuditOutcome> {
        let mut task = self
            .task_repo
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        if task.status != TaskStatus::UnderAudit {
            return Err(DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: TaskStatus::Pending.as_str().to_string(),
                reason: "audit decisions apply only to tasks under audit".to_string(),
            });
        }
        let review_task_id = task
            .auditor_review_id
            .ok_or_else(|| DomainError::ValidationFailed(
                "task under audit has no auditor review reference".to_string(),
            ))?;

        let outcome = match request.decision {
            AuditDecision::Reassign => self.apply_reassign(&mut task, &request).await?,
            AuditDecision::Refine => Self::apply_refine(&mut task, &request)?,
            AuditDecision::EscalateHuman => self.apply_escalate(&mut task, &request).await?,
            AuditDecision::Retry => Self::apply_retry(&mut task)?,
        };

        let applied = self
            .task_repo
            .update_if_status(&task, TaskStatus::UnderAudit)
            .await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: task.id.to_string(),
            });
        }

        self.resolve_review_task(review_task_id, &request).await?;

        self.mission_repo
            .append_log(
                task.mission_id,
                &LogEntry::new(
                    "audit_decision",
                    json!({
                        "task_id": task.id,
                        "decision": request.decision.as_str(),
                        "reason": request.reason,
                    }),
                ),
            )
            .await?;

        info!(
            task_id = %task.id,
            decision = request.decision.as_str(),
            "applied audit decision"
        );
        Ok(outcome)
    }

    async fn apply_reassign(
        &self,
        task: &mut Task,
        request: &AuditDecisionRequest,
    ) -> DomainResult<AuditOutcome> {
        let role = request
            .suggested_agent_role
            .as_deref()
            .ok_or_else(|| DomainError::ValidationFailed(
                "reassign requires suggested_agent_role".to_string(),
            ))?;

        let agent = self
            .scorer
            .select_best(role, task.mission_id)
            .await?
            .ok_or_else(|| DomainError::NoEligibleAgent {
                role: role.to_string(),
            })?;

        task.transition_to(TaskStatus::Pending)?;
        task.assigned_to = Some(agent.id);
        task.auditor_review_id = None;

        Ok(AuditOutcome {
            decision: AuditDecision::Reassign,
            message: format!("task reassigned to agent '{}'", agent.name),
            human_task_id: None,
        })
    }

    fn apply_refine(task: &mut Task, request: &AuditDecisionRequest) -> DomainResult<AuditOutcome> {
        let description = request
            .refined_description
            .as_deref()
            .ok_or_else(|| DomainError::ValidationFailed(
                "refine requires refined_description".to_string(),
            ))?;

        task.transition_to(TaskStatus::Pending)?;
        task.description = description.to_string();
        task.retry_count = 0;
        task.auditor_review_id = None;

        Ok(AuditOutcome {
            decision: AuditDecision::Refine,
            message: "task description refined and requeued".to_string(),
            human_task_id: None,
        })
    }

    async fn apply_escalate(
        &self,
        task: &mut Task,
        request: &AuditDecisionRequest,
    ) -> DomainResult<AuditOutcome> {
        let question = request
            .question_for_human
            .as_deref()
            .ok_or_else(|| DomainError::ValidationFailed(
                "escalate_human requires question_for_human".to_string(),
            ))?;

        // Create the human task first so the escalation link never dangles.
        let human_task = Task::new(
            task.mission_id,
            format!("Human input needed: {}", task.title),
            question,
        )
        .with_kind(crate::domain::models::TaskKind::HumanInput)
        .with_input(json!({
            "question": question,
            "original_task_id": task.id,
        }));
        self.task_repo.create(&human_task).await?;

        task.transition_to(TaskStatus::AwaitingHumanResponse)?;
        task.human_task_id = Some(human_task.id);
        task.auditor_review_id = None;

        if let Some(mut mission) = self.mission_repo.get(task.mission_id).await? {
            mission.awaiting_human_task_id = Some(human_task.id);
            mission.touch();
            self.mission_repo.update(&mission).await?;
        }

        Ok(AuditOutcome {
            decision: AuditDecision::EscalateHuman,
            message: "task escalated to a human".to_string(),
            human_task_id: Some(human_task.id),
        })
    }

    fn apply_retry(task: &mut Task) -> DomainResult<AuditOutcome> {
        task.transition_to(TaskStatus::Pending)?;
        task.retry_count = 0;
        // Exactly one extra attempt beyond the original budget
        task.max_retries += 1;
        task.auditor_review_id = None;

        Ok(AuditOutcome {
            decision: AuditDecision::Retry,
            message: format!(
                "retry budget reset with one extra attempt (max_retries now {})",
                task.max_retries
            ),
            human_task_id: None,
        })
    }

    /// Complete the open audit-review task, recording the decision as its
    /// output. The review task may still be pending when the decision came
    /// straight from a human.
    async fn resolve_review_task(
        &self,
        review_task_id: Uuid,
        request: &AuditDecisionRequest,
    ) -> DomainResult<()> {
        let Some(mut review) = self.task_repo.get(review_task_id).await? else {
            return Ok(());
        };
        if review.is_terminal() {
            return Ok(());
        }

        if review.status == TaskStatus::Pending {
            review.transition_to(TaskStatus::InProgress)?;
        }
        review.transition_to(TaskStatus::Completed)?;
        review.output = Some(serde_json::to_value(request)?);
        self.task_repo.update(&review).await
    }
}

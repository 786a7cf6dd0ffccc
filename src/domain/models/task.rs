//! Task domain model.
//!
//! Tasks are discrete units of work that agents execute within a mission.
//! They form a per-mission DAG through their dependency edges and carry the
//! full retry/audit history of every failed attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Status of a task in the orchestration pipeline.
///
/// `UnderAudit` and `AwaitingHumanResponse` are explicit states rather than
/// side flags on `Pending`, so dispatch can never pick up a task that is
/// waiting on an auditor or a human by forgetting a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is queued and dispatchable once its dependencies complete
    Pending,
    /// Retries exhausted; waiting on an auditor decision
    UnderAudit,
    /// Task is currently being executed by an agent
    InProgress,
    /// Task completed successfully
    Completed,
    /// Task failed during execution
    Failed,
    /// Escalated to a human; waiting on their answer
    AwaitingHumanResponse,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderAudit => "under_audit",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::AwaitingHumanResponse => "awaiting_human_response",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "under_audit" => Some(Self::UnderAudit),
            "in_progress" => Some(Self::InProgress),
            "complete" | "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "awaiting_human_response" => Some(Self::AwaitingHumanResponse),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no outgoing transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::InProgress],
            Self::InProgress => vec![Self::Completed, Self::Failed],
            Self::Failed => vec![Self::Pending, Self::UnderAudit],
            Self::UnderAudit => vec![Self::Pending, Self::AwaitingHumanResponse],
            Self::AwaitingHumanResponse => vec![Self::Pending],
            Self::Completed => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Kind of work a task represents.
///
/// A closed set: adding a kind is a compile-time exhaustive match, never a
/// string comparison scattered across handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Search,
    Analysis,
    Generation,
    Execution,
    Custom,
    /// Lead agent decomposing a mission into a plan
    PlanAnalysis,
    AgentCreation,
    Coordination,
    /// Question escalated to a human
    HumanInput,
    /// Auditor reviewing a task that exhausted its retries
    AuditReview,
}

impl Default for TaskKind {
    fn default() -> Self {
        Self::Custom
    }
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Analysis => "analysis",
            Self::Generation => "generation",
            Self::Execution => "execution",
            Self::Custom => "custom",
            Self::PlanAnalysis => "plan_analysis",
            Self::AgentCreation => "agent_creation",
            Self::Coordination => "coordination",
            Self::HumanInput => "human_input",
            Self::AuditReview => "audit_review",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "search" => Some(Self::Search),
            "analysis" => Some(Self::Analysis),
            "generation" => Some(Self::Generation),
            "execution" => Some(Self::Execution),
            "custom" => Some(Self::Custom),
            "plan_analysis" => Some(Self::PlanAnalysis),
            "agent_creation" => Some(Self::AgentCreation),
            "coordination" => Some(Self::Coordination),
            "human_input" => Some(Self::HumanInput),
            "audit_review" => Some(Self::AuditReview),
            _ => None,
        }
    }
}

/// One recorded failure of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    /// Error message reported by the executing agent
    pub error: String,
    /// When the failure was recorded
    pub timestamp: DateTime<Utc>,
    /// Agent that executed the failed attempt
    pub agent_id: Option<Uuid>,
}

/// A discrete unit of work executed by an agent inside a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Mission this task belongs to
    pub mission_id: Uuid,
    /// Human-readable title
    pub title: String,
    /// Detailed description/instructions
    pub description: String,
    /// Kind of work
    pub kind: TaskKind,
    /// Current status
    pub status: TaskStatus,
    /// Assigned agent, if any
    pub assigned_to: Option<Uuid>,
    /// Same-mission task IDs this task depends on
    pub depends_on: Vec<Uuid>,
    /// Failed attempts so far
    pub retry_count: u32,
    /// Maximum automatic retries before audit
    pub max_retries: u32,
    /// Ordered record of every failed attempt
    pub retry_history: Vec<RetryAttempt>,
    /// Open audit-review task, present only while under audit
    pub auditor_review_id: Option<Uuid>,
    /// Escalation human-input task, present only while awaiting a human
    pub human_task_id: Option<Uuid>,
    /// Opaque input payload
    pub input: Option<serde_json::Value>,
    /// Opaque output payload
    pub output: Option<serde_json::Value>,
    /// Last failure message
    pub error: Option<String>,
    /// Estimated duration, used as the critical-path weight
    pub estimated_duration_seconds: Option<i64>,
    /// Version for optimistic locking
    pub version: u64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// When execution started
    pub started_at: Option<DateTime<Utc>>,
    /// When completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task in a mission.
    pub fn new(mission_id: Uuid, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mission_id,
            title: title.into(),
            description: description.into(),
            kind: TaskKind::default(),
            status: TaskStatus::default(),
            assigned_to: None,
            depends_on: Vec::new(),
            retry_count: 0,
            max_retries: 3,
            retry_history: Vec::new(),
            auditor_review_id: None,
            human_task_id: None,
            input: None,
            output: None,
            error: None,
            estimated_duration_seconds: None,
            version: 1,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Set the task kind.
    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a dependency. Self-references and duplicates are ignored.
    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.depends_on.contains(&task_id) && task_id != self.id {
            self.depends_on.push(task_id);
        }
        self
    }

    /// Assign to an agent.
    pub fn with_assignee(mut self, agent_id: Uuid) -> Self {
        self.assigned_to = Some(agent_id);
        self
    }

    /// Set the input payload.
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = Some(input);
        self
    }

    /// Set the estimated duration.
    pub fn with_estimated_duration(mut self, seconds: i64) -> Self {
        self.estimated_duration_seconds = Some(seconds);
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check if the transition is legal from the current state.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, enforcing the state machine table.
    ///
    /// The retry/audit guards are enforced here as well: a failed task may
    /// only return to `Pending` while it has retries left, and may only move
    /// `UnderAudit` once they are exhausted.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> DomainResult<()> {
        if !self.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "transition not in state machine table".to_string(),
            });
        }

        match (self.status, new_status) {
            (TaskStatus::Failed, TaskStatus::Pending) if self.retry_count >= self.max_retries => {
                return Err(DomainError::MaxRetriesExceeded {
                    task_id: self.id,
                    retry_count: self.retry_count,
                    max_retries: self.max_retries,
                    needs_audit: true,
                });
            }
            (TaskStatus::Failed, TaskStatus::UnderAudit) if self.retry_count < self.max_retries => {
                return Err(DomainError::InvalidStateTransition {
                    from: self.status.as_str().to_string(),
                    to: new_status.as_str().to_string(),
                    reason: format!(
                        "audit requires exhausted retries ({}/{} used)",
                        self.retry_count, self.max_retries
                    ),
                });
            }
            _ => {}
        }

        self.status = new_status;
        self.touch();

        match new_status {
            TaskStatus::InProgress => self.started_at = Some(Utc::now()),
            TaskStatus::Completed => self.completed_at = Some(Utc::now()),
            _ => {}
        }

        Ok(())
    }

    /// Bump `updated_at` and the optimistic-lock version.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Check if the task has reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether normal dispatch may consider this task at all.
    ///
    /// Dependency satisfaction is a separate, graph-level check.
    pub fn is_dispatchable(&self) -> bool {
        self.status == TaskStatus::Pending && self.auditor_review_id.is_none()
    }

    /// Validate internal consistency.
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "task title cannot be empty".to_string(),
            ));
        }
        if self.depends_on.contains(&self.id) {
            return Err(DomainError::ValidationFailed(
                "task cannot depend on itself".to_string(),
            ));
        }
        if self.retry_count > self.max_retries {
            return Err(DomainError::ValidationFailed(format!(
                "retry_count {} exceeds max_retries {}",
                self.retry_count, self.max_retries
            )));
        }
        if (self.status == TaskStatus::UnderAudit) != self.auditor_review_id.is_some() {
            return Err(DomainError::ValidationFailed(
                "auditor_review_id must be set exactly while under audit".to_string(),
            ));
        }
        if (self.status == TaskStatus::AwaitingHumanResponse) != self.human_task_id.is_some() {
            return Err(DomainError::ValidationFailed(
                "human_task_id must be set exactly while awaiting a human".to_string(),
            ));
        }
        Ok(())
    }
}

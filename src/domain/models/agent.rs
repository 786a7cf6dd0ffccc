//! Agent domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::DomainError;

/// Agent status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Registered and available for work
    Idle,
    /// Currently executing a task
    Busy,
    /// Participating in a mission but between tasks
    Active,
    /// Deliberately taken out of rotation
    Inactive,
    /// Not reachable
    Offline,
}

impl AgentStatus {
    /// Whether the agent may be handed new work.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle | Self::Active)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AgentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "offline" => Ok(Self::Offline),
            _ => Err(DomainError::ValidationFailed(format!(
                "invalid agent status: {s}"
            ))),
        }
    }
}

/// A worker identity that claims and executes tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier
    pub id: Uuid,
    /// Unique name; plans reuse agents by name
    pub name: String,
    /// Role the agent fills, e.g. "researcher", "auditor"
    pub role: String,
    /// Current status
    pub status: AgentStatus,
    /// Mission the agent is currently attached to
    pub current_mission_id: Option<Uuid>,
    /// Missions the agent has been released from
    pub mission_history: Vec<Uuid>,
    /// Cumulative completed-task count
    pub tasks_completed: u64,
    /// Cumulative failed-task count
    pub tasks_failed: u64,
    /// Completed / (completed + failed), 0.0 when no history
    pub success_rate: f64,
    /// Rolling mean task duration in seconds
    pub average_duration_seconds: f64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
            status: AgentStatus::Idle,
            current_mission_id: None,
            mission_history: Vec::new(),
            tasks_completed: 0,
            tasks_failed: 0,
            success_rate: 0.0,
            average_duration_seconds: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach to a mission.
    pub fn with_mission(mut self, mission_id: Uuid) -> Self {
        self.current_mission_id = Some(mission_id);
        self.status = AgentStatus::Active;
        self
    }

    /// Record a successful task, folding its duration into the mean.
    pub fn record_success(&mut self, duration_seconds: f64) {
        self.average_duration_seconds = if self.tasks_completed == 0 {
            duration_seconds
        } else {
            (self.average_duration_seconds * self.tasks_completed as f64 + duration_seconds)
                / (self.tasks_completed + 1) as f64
        };
        self.tasks_completed += 1;
        self.recompute_success_rate();
        self.updated_at = Utc::now();
    }

    /// Record a failed task.
    pub fn record_failure(&mut self) {
        self.tasks_failed += 1;
        self.recompute_success_rate();
        self.updated_at = Utc::now();
    }

    /// Release the agent from its current mission, archiving the mission id.
    pub fn release_from_mission(&mut self) {
        if let Some(mission_id) = self.current_mission_id.take() {
            if !self.mission_history.contains(&mission_id) {
                self.mission_history.push(mission_id);
            }
        }
        self.status = AgentStatus::Idle;
        self.updated_at = Utc::now();
    }

    fn recompute_success_rate(&mut self) {
        let total = self.tasks_completed + self.tasks_failed;
        self.success_rate = if total == 0 {
            0.0
        } else {
            self.tasks_completed as f64 / total as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_defaults() {
        let agent = Agent::new("scout-1", "researcher");
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.success_rate, 0.0);
        assert!(agent.current_mission_id.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("idle".parse::<AgentStatus>().unwrap(), AgentStatus::Idle);
        assert_eq!("BUSY".parse::<AgentStatus>().unwrap(), AgentStatus::Busy);
        assert!("unknown".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut agent = Agent::new("worker-1", "executor");

        agent.record_success(10.0);
        agent.record_success(20.0);
        agent.record_failure();

        assert_eq!(agent.tasks_completed, 2);
        assert_eq!(agent.tasks_failed, 1);
        assert!((agent.success_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert!((agent.average_duration_seconds - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_release_from_mission() {
        let mission_id = Uuid::new_v4();
        let mut agent = Agent::new("lead-1", "lead").with_mission(mission_id);
        assert_eq!(agent.status, AgentStatus::Active);

        agent.release_from_mission();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_mission_id.is_none());
        assert_eq!(agent.mission_history, vec![mission_id]);

        // Releasing again is a no-op
        agent.release_from_mission();
        assert_eq!(agent.mission_history, vec![mission_id]);
    }
}

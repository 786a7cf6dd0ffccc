//! Mission domain model.
//!
//! A mission is the container for one goal: a set of tasks, a lead agent,
//! and an append-only orchestration log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// Mission is being drafted; no dispatch happens
    Draft,
    /// Mission is live; tasks may be claimed
    Active,
    /// Dispatch is suspended; in-flight work is not interrupted
    Paused,
    /// Every task finished; the lead agent has been released
    Completed,
}

impl Default for MissionStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether tasks of this mission may be dispatched.
    pub fn allows_dispatch(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One append-only orchestration log entry.
///
/// Entries are written once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Short machine-readable action tag, e.g. `task_created`
    pub action: String,
    /// Structured context for the action
    pub details: serde_json::Value,
}

impl LogEntry {
    pub fn new(action: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            details,
        }
    }
}

/// A goal container holding a set of tasks and an assigned lead agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable title
    pub title: String,
    /// What the mission is trying to achieve
    pub objective: String,
    /// Current status
    pub status: MissionStatus,
    /// Lead agent that decomposes the mission into a plan
    pub lead_agent_id: Option<Uuid>,
    /// Open human-input task blocking the mission, if any
    pub awaiting_human_task_id: Option<Uuid>,
    /// Version for optimistic locking
    pub version: u64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    pub fn new(title: impl Into<String>, objective: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            objective: objective.into(),
            status: MissionStatus::default(),
            lead_agent_id: None,
            awaiting_human_task_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign the lead agent.
    pub fn with_lead_agent(mut self, agent_id: Uuid) -> Self {
        self.lead_agent_id = Some(agent_id);
        self
    }

    /// Bump `updated_at` and the optimistic-lock version.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mission_defaults() {
        let mission = Mission::new("Ship the feature", "Implement and verify the feature");
        assert_eq!(mission.status, MissionStatus::Draft);
        assert!(mission.lead_agent_id.is_none());
        assert!(mission.awaiting_human_task_id.is_none());
    }

    #[test]
    fn test_dispatch_only_when_active() {
        assert!(!MissionStatus::Draft.allows_dispatch());
        assert!(MissionStatus::Active.allows_dispatch());
        assert!(!MissionStatus::Paused.allows_dispatch());
        assert!(!MissionStatus::Completed.allows_dispatch());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            MissionStatus::Draft,
            MissionStatus::Active,
            MissionStatus::Paused,
            MissionStatus::Completed,
        ] {
            assert_eq!(MissionStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_log_entry_shape() {
        let entry = LogEntry::new("task_created", serde_json::json!({"task_id": "x"}));
        assert_eq!(entry.action, "task_created");
        assert_eq!(entry.details["task_id"], "x");
    }
}

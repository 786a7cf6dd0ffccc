//! Mission plan document produced by a lead agent.
//!
//! Plans arrive as JSON from an upstream LLM-backed source and are treated
//! as untrusted input: full structural validation happens before any entity
//! is persisted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::task::TaskKind;

/// Agent specification inside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAgent {
    /// Unique agent name; existing agents are reused by name
    pub name: String,
    /// Role the agent fills
    pub role: String,
}

/// Task specification inside a plan.
///
/// `local_id` and `dependencies` use plan-local identifiers; the
/// coordinator resolves them to persisted task ids during materialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTask {
    /// Plan-local identifier, referenced by other tasks' dependencies
    #[serde(alias = "id")]
    pub local_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: TaskKind,
    /// Name of the agent this task is assigned to
    #[serde(default)]
    pub assigned_agent: Option<String>,
    /// Plan-local ids of prerequisite tasks
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub estimated_duration_seconds: Option<i64>,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

/// A structured mission plan: the tasks to run and the agents to run them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionPlan {
    pub tasks: Vec<PlanTask>,
    pub agents: Vec<PlanAgent>,
}

impl MissionPlan {
    /// Parse and validate a raw plan document.
    ///
    /// Malformed JSON and structural violations are both `InvalidPlan`; the
    /// caller treats them as a normal failure of the plan-analysis task.
    pub fn from_json(raw: &serde_json::Value) -> DomainResult<Self> {
        let plan: Self = serde_json::from_value(raw.clone())
            .map_err(|e| DomainError::InvalidPlan(format!("malformed plan document: {e}")))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Structural validation: non-empty arrays, unique local ids, resolvable
    /// dependency references, no self-dependencies.
    ///
    /// Cycle detection over the plan graph is the dependency graph engine's
    /// job and runs before the coordinator persists any edge.
    pub fn validate(&self) -> DomainResult<()> {
        if self.tasks.is_empty() {
            return Err(DomainError::InvalidPlan(
                "plan has no tasks".to_string(),
            ));
        }
        if self.agents.is_empty() {
            return Err(DomainError::InvalidPlan(
                "plan has no agents".to_string(),
            ));
        }

        let mut local_ids = HashSet::new();
        for task in &self.tasks {
            if task.local_id.trim().is_empty() {
                return Err(DomainError::InvalidPlan(
                    "plan task with empty local id".to_string(),
                ));
            }
            if task.title.trim().is_empty() {
                return Err(DomainError::InvalidPlan(format!(
                    "plan task '{}' has an empty title",
                    task.local_id
                )));
            }
            if !local_ids.insert(task.local_id.as_str()) {
                return Err(DomainError::InvalidPlan(format!(
                    "duplicate plan task id '{}'",
                    task.local_id
                )));
            }
        }

        let mut agent_names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() || agent.role.trim().is_empty() {
                return Err(DomainError::InvalidPlan(
                    "plan agent with empty name or role".to_string(),
                ));
            }
            if !agent_names.insert(agent.name.as_str()) {
                return Err(DomainError::InvalidPlan(format!(
                    "duplicate plan agent name '{}'",
                    agent.name
                )));
            }
        }

        for task in &self.tasks {
            for dep in &task.dependencies {
                if dep == &task.local_id {
                    return Err(DomainError::InvalidPlan(format!(
                        "plan task '{}' depends on itself",
                        task.local_id
                    )));
                }
                if !local_ids.contains(dep.as_str()) {
                    return Err(DomainError::InvalidPlan(format!(
                        "plan task '{}' references unknown dependency '{dep}'",
                        task.local_id
                    )));
                }
            }
            if let Some(agent) = &task.assigned_agent {
                if !agent_names.contains(agent.as_str()) {
                    return Err(DomainError::InvalidPlan(format!(
                        "plan task '{}' assigned to unknown agent '{agent}'",
                        task.local_id
                    )));
                }
            }
        }

        Ok(())
    }
}

//! Agent scoring.
//!
//! Default `AgentScorer` implementation used by audit reassignment and by
//! the coordinator when addressing audit-review tasks.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentStatus};
use crate::domain::ports::{AgentFilter, AgentRepository, AgentScorer, TaskRepository};

/// Availability, mission affinity, and history folded into one number.
/// Role match is a hard filter applied before scoring.
fn base_score(agent: &Agent, mission_id: Uuid) -> f64 {
    let availability = match agent.status {
        AgentStatus::Idle => 2.0,
        AgentStatus::Active => 1.0,
        // Filtered out before scoring
        AgentStatus::Busy | AgentStatus::Inactive | AgentStatus::Offline => 0.0,
    };
    let affinity = match agent.current_mission_id {
        Some(current) if current == mission_id => 1.0,
        // Unattached agents are cheap to pull in
        None => 0.5,
        Some(_) => 0.0,
    };
    availability + affinity + agent.success_rate * 2.0
}

/// Scores candidates on availability, mission affinity, historical
/// success rate, and current workload.
pub struct CompositeAgentScorer<A, T>
where
    A: AgentRepository,
    T: TaskRepository,
{
    agent_repo: Arc<A>,
    task_repo: Arc<T>,
}

impl<A, T> CompositeAgentScorer<A, T>
where
    A: AgentRepository,
    T: TaskRepository,
{
    pub fn new(agent_repo: Arc<A>, task_repo: Arc<T>) -> Self {
        Self {
            agent_repo,
            task_repo,
        }
    }
}

#[async_trait]
impl<A, T> AgentScorer for CompositeAgentScorer<A, T>
where
    A: AgentRepository,
    T: TaskRepository,
{
    async fn select_best(&self, role: &str, mission_id: Uuid) -> DomainResult<Option<Agent>> {
        let candidates = self
            .agent_repo
            .list(AgentFilter {
                role: Some(role.to_string()),
                ..Default::default()
            })
            .await?;

        let available: Vec<Agent> = candidates
            .into_iter()
            .filter(|agent| agent.status.is_available())
            .collect();
        if available.is_empty() {
            return Ok(None);
        }

        let workloads = try_join_all(
            available
                .iter()
                .map(|agent| self.task_repo.count_active_for_agent(agent.id)),
        )
        .await?;

        let mut best: Option<(f64, Agent)> = None;
        for (agent, workload) in available.into_iter().zip(workloads) {
            let score = base_score(&agent, mission_id) - 0.5 * workload as f64;
            debug!(agent = %agent.name, role, score, workload, "scored candidate agent");
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, agent));
            }
        }
        Ok(best.map(|(_, agent)| agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with(status: AgentStatus, success_rate: f64) -> Agent {
        let mut agent = Agent::new("a", "r");
        agent.status = status;
        agent.success_rate = success_rate;
        agent
    }

    #[test]
    fn test_idle_beats_active_at_equal_history() {
        let mission = Uuid::new_v4();
        let idle = agent_with(AgentStatus::Idle, 0.5);
        let active = agent_with(AgentStatus::Active, 0.5);
        assert!(base_score(&idle, mission) > base_score(&active, mission));
    }

    #[test]
    fn test_success_rate_breaks_ties() {
        let mission = Uuid::new_v4();
        let strong = agent_with(AgentStatus::Idle, 0.9);
        let weak = agent_with(AgentStatus::Idle, 0.2);
        assert!(base_score(&strong, mission) > base_score(&weak, mission));
    }

    #[test]
    fn test_mission_affinity_ordering() {
        let mission = Uuid::new_v4();
        let mut attached_here = agent_with(AgentStatus::Idle, 0.5);
        attached_here.current_mission_id = Some(mission);
        let unattached = agent_with(AgentStatus::Idle, 0.5);
        let mut attached_elsewhere = agent_with(AgentStatus::Idle, 0.5);
        attached_elsewhere.current_mission_id = Some(Uuid::new_v4());

        let here = base_score(&attached_here, mission);
        let free = base_score(&unattached, mission);
        let elsewhere = base_score(&attached_elsewhere, mission);
        assert!(here > free && free > elsewhere);
    }
}

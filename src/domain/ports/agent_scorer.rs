use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Agent;

/// Port for selecting the best agent for a role.
///
/// Used by the audit `reassign` decision. Implementations score on role
/// match, availability, historical success rate, and current workload.
#[async_trait]
pub trait AgentScorer: Send + Sync {
    /// Pick the best available agent for `role` in the context of a
    /// mission, or `None` when no agent is eligible.
    async fn select_best(&self, role: &str, mission_id: Uuid) -> DomainResult<Option<Agent>>;
}

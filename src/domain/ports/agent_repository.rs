use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentStatus};

/// Filters for querying agents.
#[derive(Default, Debug, Clone)]
pub struct AgentFilter {
    pub role: Option<String>,
    pub status: Option<AgentStatus>,
    pub mission_id: Option<Uuid>,
}

/// Repository port for agent persistence.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Insert a new agent. Names are unique.
    async fn create(&self, agent: &Agent) -> DomainResult<()>;

    /// Get an agent by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>>;

    /// Get an agent by its unique name.
    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Agent>>;

    /// Update an existing agent. Fails with `AgentNotFound` if absent.
    async fn update(&self, agent: &Agent) -> DomainResult<()>;

    /// List agents with optional filters.
    async fn list(&self, filter: AgentFilter) -> DomainResult<Vec<Agent>>;
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LogEntry, Mission, MissionStatus};

/// Repository port for mission persistence and the orchestration log.
#[async_trait]
pub trait MissionRepository: Send + Sync {
    /// Insert a new mission.
    async fn create(&self, mission: &Mission) -> DomainResult<()>;

    /// Get a mission by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Mission>>;

    /// Update an existing mission. Fails with `MissionNotFound` if absent.
    async fn update(&self, mission: &Mission) -> DomainResult<()>;

    /// Compare-and-update: persist `mission` only if the stored row still
    /// has `expected` status. Returns whether the update was applied.
    async fn update_if_status(
        &self,
        mission: &Mission,
        expected: MissionStatus,
    ) -> DomainResult<bool>;

    /// List missions, optionally by status.
    async fn list(&self, status: Option<MissionStatus>) -> DomainResult<Vec<Mission>>;

    /// Append one entry to the mission's orchestration log.
    ///
    /// The log is append-only; entries are never mutated or removed.
    async fn append_log(&self, mission_id: Uuid, entry: &LogEntry) -> DomainResult<()>;

    /// Read the mission's orchestration log in insertion order.
    async fn list_log(&self, mission_id: Uuid) -> DomainResult<Vec<LogEntry>>;
}

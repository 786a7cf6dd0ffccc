//! Mission lifecycle service.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LogEntry, Mission, MissionStatus};
use crate::domain::ports::MissionRepository;

/// Creation and status transitions for missions.
///
/// Pausing only stops new dispatch; it never interrupts in-flight work.
pub struct MissionService<M>
where
    M: MissionRepository,
{
    mission_repo: Arc<M>,
}

impl<M> MissionService<M>
where
    M: MissionRepository,
{
    pub fn new(mission_repo: Arc<M>) -> Self {
        Self { mission_repo }
    }

    pub async fn create(
        &self,
        title: impl Into<String>,
        objective: impl Into<String>,
        lead_agent_id: Option<Uuid>,
    ) -> DomainResult<Mission> {
        let mut mission = Mission::new(title, objective);
        mission.lead_agent_id = lead_agent_id;
        self.mission_repo.create(&mission).await?;
        self.mission_repo
            .append_log(
                mission.id,
                &LogEntry::new("mission_created", json!({"title": mission.title})),
            )
            .await?;
        Ok(mission)
    }

    pub async fn get(&self, mission_id: Uuid) -> DomainResult<Mission> {
        self.mission_repo
            .get(mission_id)
            .await?
            .ok_or(DomainError::MissionNotFound(mission_id))
    }

    pub async fn list(&self, status: Option<MissionStatus>) -> DomainResult<Vec<Mission>> {
        self.mission_repo.list(status).await
    }

    /// Start dispatching: `Draft` or `Paused` -> `Active`.
    pub async fn activate(&self, mission_id: Uuid) -> DomainResult<Mission> {
        self.transition(
            mission_id,
            &[MissionStatus::Draft, MissionStatus::Paused],
            MissionStatus::Active,
            "mission_activated",
        )
        .await
    }

    /// Suspend dispatching: `Active` -> `Paused`.
    pub async fn pause(&self, mission_id: Uuid) -> DomainResult<Mission> {
        self.transition(
            mission_id,
            &[MissionStatus::Active],
            MissionStatus::Paused,
            "mission_paused",
        )
        .await
    }

    pub async fn log(&self, mission_id: Uuid) -> DomainResult<Vec<LogEntry>> {
        self.get(mission_id).await?;
        self.mission_repo.list_log(mission_id).await
    }

    async fn transition(
        &self,
        mission_id: Uuid,
        allowed_from: &[MissionStatus],
        to: MissionStatus,
        log_action: &str,
    ) -> DomainResult<Mission> {
        let mut mission = self.get(mission_id).await?;
        if !allowed_from.contains(&mission.status) {
            return Err(DomainError::InvalidStateTransition {
                from: mission.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: "mission status transition not allowed".to_string(),
            });
        }

        let prior = mission.status;
        mission.status = to;
        mission.touch();
        let applied = self.mission_repo.update_if_status(&mission, prior).await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict {
                entity: "mission".to_string(),
                id: mission_id.to_string(),
            });
        }

        self.mission_repo
            .append_log(mission_id, &LogEntry::new(log_action, json!({})))
            .await?;
        Ok(mission)
    }
}

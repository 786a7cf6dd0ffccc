//! SQLite implementation of the MissionRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LogEntry, Mission, MissionStatus};
use crate::domain::ports::MissionRepository;

#[derive(Clone)]
pub struct SqliteMissionRepository {
    pool: SqlitePool,
}

impl SqliteMissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MissionRepository for SqliteMissionRepository {
    async fn create(&self, mission: &Mission) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO missions (id, title, objective, status, lead_agent_id,
               awaiting_human_task_id, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(mission.id.to_string())
        .bind(&mission.title)
        .bind(&mission.objective)
        .bind(mission.status.as_str())
        .bind(mission.lead_agent_id.map(|id| id.to_string()))
        .bind(mission.awaiting_human_task_id.map(|id| id.to_string()))
        .bind(mission.version as i64)
        .bind(mission.created_at.to_rfc3339())
        .bind(mission.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Mission>> {
        let row: Option<MissionRow> = sqlx::query_as("SELECT * FROM missions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, mission: &Mission) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE missions SET title = ?, objective = ?, status = ?, lead_agent_id = ?,
               awaiting_human_task_id = ?, version = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(&mission.title)
        .bind(&mission.objective)
        .bind(mission.status.as_str())
        .bind(mission.lead_agent_id.map(|id| id.to_string()))
        .bind(mission.awaiting_human_task_id.map(|id| id.to_string()))
        .bind(mission.version as i64)
        .bind(mission.updated_at.to_rfc3339())
        .bind(mission.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::MissionNotFound(mission.id));
        }
        Ok(())
    }

    async fn update_if_status(
        &self,
        mission: &Mission,
        expected: MissionStatus,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"UPDATE missions SET title = ?, objective = ?, status = ?, lead_agent_id = ?,
               awaiting_human_task_id = ?, version = ?, updated_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(&mission.title)
        .bind(&mission.objective)
        .bind(mission.status.as_str())
        .bind(mission.lead_agent_id.map(|id| id.to_string()))
        .bind(mission.awaiting_human_task_id.map(|id| id.to_string()))
        .bind(mission.version as i64)
        .bind(mission.updated_at.to_rfc3339())
        .bind(mission.id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, status: Option<MissionStatus>) -> DomainResult<Vec<Mission>> {
        let rows: Vec<MissionRow> = match status {
            Some(status) => {
                sqlx::query_as("SELECT * FROM missions WHERE status = ? ORDER BY created_at DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM missions ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn append_log(&self, mission_id: Uuid, entry: &LogEntry) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO mission_log (mission_id, timestamp, action, details) VALUES (?, ?, ?, ?)",
        )
        .bind(mission_id.to_string())
        .bind(entry.timestamp.to_rfc3339())
        .bind(&entry.action)
        .bind(serde_json::to_string(&entry.details)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_log(&self, mission_id: Uuid) -> DomainResult<Vec<LogEntry>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT timestamp, action, details FROM mission_log WHERE mission_id = ? ORDER BY id ASC",
        )
        .bind(mission_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(timestamp, action, details)| {
                let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp)
                    .map(|d| d.with_timezone(&chrono::Utc))
                    .map_err(|e| DomainError::SerializationError(e.to_string()))?;
                Ok(LogEntry {
                    timestamp,
                    action,
                    details: serde_json::from_str(&details)?,
                })
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct MissionRow {
    id: String,
    title: String,
    objective: String,
    status: String,
    lead_agent_id: Option<String>,
    awaiting_human_task_id: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MissionRow> for Mission {
    type Error = DomainError;

    fn try_from(row: MissionRow) -> Result<Self, Self::Error> {
        let parse_uuid = |s: &str| {
            Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
        };
        let parse_time = |s: &str| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&chrono::Utc))
                .map_err(|e| DomainError::SerializationError(e.to_string()))
        };

        let status = MissionStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("invalid mission status: {}", row.status))
        })?;

        Ok(Mission {
            id: parse_uuid(&row.id)?,
            title: row.title,
            objective: row.objective,
            status,
            lead_agent_id: row.lead_agent_id.as_deref().map(parse_uuid).transpose()?,
            awaiting_human_task_id: row
                .awaiting_human_task_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?,
            version: row.version as u64,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

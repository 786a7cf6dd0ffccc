//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentStatus};
use crate::domain::ports::{AgentFilter, AgentRepository};

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> DomainResult<()> {
        let mission_history_json = serde_json::to_string(&agent.mission_history)?;
        sqlx::query(
            r#"INSERT INTO agents (id, name, role, status, current_mission_id, mission_history,
               tasks_completed, tasks_failed, success_rate, average_duration_seconds,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(agent.id.to_string())
        .bind(&agent.name)
        .bind(&agent.role)
        .bind(agent.status.to_string())
        .bind(agent.current_mission_id.map(|id| id.to_string()))
        .bind(&mission_history_json)
        .bind(agent.tasks_completed as i64)
        .bind(agent.tasks_failed as i64)
        .bind(agent.success_rate)
        .bind(agent.average_duration_seconds)
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, agent: &Agent) -> DomainResult<()> {
        let mission_history_json = serde_json::to_string(&agent.mission_history)?;
        let result = sqlx::query(
            r#"UPDATE agents SET name = ?, role = ?, status = ?, current_mission_id = ?,
               mission_history = ?, tasks_completed = ?, tasks_failed = ?, success_rate = ?,
               average_duration_seconds = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(&agent.name)
        .bind(&agent.role)
        .bind(agent.status.to_string())
        .bind(agent.current_mission_id.map(|id| id.to_string()))
        .bind(&mission_history_json)
        .bind(agent.tasks_completed as i64)
        .bind(agent.tasks_failed as i64)
        .bind(agent.success_rate)
        .bind(agent.average_duration_seconds)
        .bind(agent.updated_at.to_rfc3339())
        .bind(agent.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(agent.id.to_string()));
        }
        Ok(())
    }

    async fn list(&self, filter: AgentFilter) -> DomainResult<Vec<Agent>> {
        let mut query = String::from("SELECT * FROM agents WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(role) = &filter.role {
            query.push_str(" AND role = ?");
            bindings.push(role.clone());
        }
        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.to_string());
        }
        if let Some(mission_id) = &filter.mission_id {
            query.push_str(" AND current_mission_id = ?");
            bindings.push(mission_id.to_string());
        }

        query.push_str(" ORDER BY name ASC");

        let mut q = sqlx::query_as::<_, AgentRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<AgentRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    name: String,
    role: String,
    status: String,
    current_mission_id: Option<String>,
    mission_history: String,
    tasks_completed: i64,
    tasks_failed: i64,
    success_rate: f64,
    average_duration_seconds: f64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let parse_uuid = |s: &str| {
            Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
        };
        let parse_time = |s: &str| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&chrono::Utc))
                .map_err(|e| DomainError::SerializationError(e.to_string()))
        };

        let status: AgentStatus = row
            .status
            .parse()
            .map_err(|_| DomainError::SerializationError(format!(
                "invalid agent status: {}",
                row.status
            )))?;

        let mission_history: Vec<Uuid> = serde_json::from_str(&row.mission_history)?;

        Ok(Agent {
            id: parse_uuid(&row.id)?,
            name: row.name,
            role: row.role,
            status,
            current_mission_id: row
                .current_mission_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?,
            mission_history,
            tasks_completed: row.tasks_completed as u64,
            tasks_failed: row.tasks_failed as u64,
            success_rate: row.success_rate,
            average_duration_seconds: row.average_duration_seconds,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RetryAttempt, Task, TaskKind, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_dependencies(&self, task: &mut Task) -> DomainResult<()> {
        let deps: Vec<(String,)> =
            sqlx::query_as("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
                .bind(task.id.to_string())
                .fetch_all(&self.pool)
                .await?;

        task.depends_on = deps
            .into_iter()
            .filter_map(|(id,)| Uuid::parse_str(&id).ok())
            .collect();
        Ok(())
    }

    async fn hydrate(&self, rows: Vec<TaskRow>) -> DomainResult<Vec<Task>> {
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let mut task: Task = row.try_into()?;
            self.load_dependencies(&mut task).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let retry_history_json = serde_json::to_string(&task.retry_history)?;
        let input_json = task.input.as_ref().map(serde_json::to_string).transpose()?;
        let output_json = task.output.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO tasks (id, mission_id, title, description, kind, status,
               assigned_to, retry_count, max_retries, retry_history, auditor_review_id,
               human_task_id, input, output, error, estimated_duration_seconds, version,
               created_at, updated_at, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.mission_id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.kind.as_str())
        .bind(task.status.as_str())
        .bind(task.assigned_to.map(|id| id.to_string()))
        .bind(task.retry_count as i64)
        .bind(task.max_retries as i64)
        .bind(&retry_history_json)
        .bind(task.auditor_review_id.map(|id| id.to_string()))
        .bind(task.human_task_id.map(|id| id.to_string()))
        .bind(&input_json)
        .bind(&output_json)
        .bind(&task.error)
        .bind(task.estimated_duration_seconds)
        .bind(task.version as i64)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        for dep_id in &task.depends_on {
            self.add_dependency(task.id, *dep_id).await?;
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let mut task = r.try_into()?;
                self.load_dependencies(&mut task).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let result = update_query(task, None).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }
        Ok(())
    }

    async fn update_if_status(&self, task: &Task, expected: TaskStatus) -> DomainResult<bool> {
        let result = update_query(task, Some(expected)).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_claim(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<bool> {
        // The whole claim is one conditional UPDATE; the rows_affected
        // check is what makes concurrent claimants safe.
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"UPDATE tasks SET
                   status = 'in_progress',
                   assigned_to = ?,
                   started_at = ?,
                   updated_at = ?,
                   version = version + 1
               WHERE id = ?
                 AND status = 'pending'
                 AND auditor_review_id IS NULL
                 AND (assigned_to IS NULL OR assigned_to = ?)"#,
        )
        .bind(agent_id.to_string())
        .bind(&now)
        .bind(&now)
        .bind(task_id.to_string())
        .bind(agent_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }
        Ok(())
    }

    async fn list_by_mission(
        &self,
        mission_id: Uuid,
        filter: TaskFilter,
    ) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE mission_id = ?");
        let mut bindings: Vec<String> = vec![mission_id.to_string()];

        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(kind) = &filter.kind {
            query.push_str(" AND kind = ?");
            bindings.push(kind.as_str().to_string());
        }
        if let Some(assigned_to) = &filter.assigned_to {
            query.push_str(" AND assigned_to = ?");
            bindings.push(assigned_to.to_string());
        }

        query.push_str(" ORDER BY created_at ASC");
        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
            .bind(task_id.to_string())
            .bind(depends_on.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM task_dependencies WHERE task_id = ? AND depends_on_id = ?")
            .bind(task_id.to_string())
            .bind(depends_on.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_by_status(&self, mission_id: Uuid) -> DomainResult<HashMap<TaskStatus, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks WHERE mission_id = ? GROUP BY status")
                .bind(mission_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HashMap::new();
        for (status_str, count) in rows {
            if let Some(status) = TaskStatus::from_str(&status_str) {
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }

    async fn count_active_for_agent(&self, agent_id: Uuid) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks WHERE assigned_to = ? AND status = 'in_progress'",
        )
        .bind(agent_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }
}

/// Shared UPDATE builder; `expected` adds the compare-and-update guard.
fn update_query(
    task: &Task,
    expected: Option<TaskStatus>,
) -> sqlx::query::Query<'static, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'static>> {
    let retry_history_json =
        serde_json::to_string(&task.retry_history).unwrap_or_else(|_| "[]".to_string());
    let input_json = task
        .input
        .as_ref()
        .and_then(|v| serde_json::to_string(v).ok());
    let output_json = task
        .output
        .as_ref()
        .and_then(|v| serde_json::to_string(v).ok());

    let sql = if expected.is_some() {
        r#"UPDATE tasks SET title = ?, description = ?, kind = ?, status = ?,
           assigned_to = ?, retry_count = ?, max_retries = ?, retry_history = ?,
           auditor_review_id = ?, human_task_id = ?, input = ?, output = ?, error = ?,
           estimated_duration_seconds = ?, version = ?, updated_at = ?, started_at = ?,
           completed_at = ? WHERE id = ? AND status = ?"#
    } else {
        r#"UPDATE tasks SET title = ?, description = ?, kind = ?, status = ?,
           assigned_to = ?, retry_count = ?, max_retries = ?, retry_history = ?,
           auditor_review_id = ?, human_task_id = ?, input = ?, output = ?, error = ?,
           estimated_duration_seconds = ?, version = ?, updated_at = ?, started_at = ?,
           completed_at = ? WHERE id = ?"#
    };

    let mut q = sqlx::query(sql)
        .bind(task.title.clone())
        .bind(task.description.clone())
        .bind(task.kind.as_str())
        .bind(task.status.as_str())
        .bind(task.assigned_to.map(|id| id.to_string()))
        .bind(task.retry_count as i64)
        .bind(task.max_retries as i64)
        .bind(retry_history_json)
        .bind(task.auditor_review_id.map(|id| id.to_string()))
        .bind(task.human_task_id.map(|id| id.to_string()))
        .bind(input_json)
        .bind(output_json)
        .bind(task.error.clone())
        .bind(task.estimated_duration_seconds)
        .bind(task.version as i64)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.id.to_string());

    if let Some(expected) = expected {
        q = q.bind(expected.as_str());
    }
    q
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    mission_id: String,
    title: String,
    description: String,
    kind: String,
    status: String,
    assigned_to: Option<String>,
    retry_count: i64,
    max_retries: i64,
    retry_history: String,
    auditor_review_id: Option<String>,
    human_task_id: Option<String>,
    input: Option<String>,
    output: Option<String>,
    error: Option<String>,
    estimated_duration_seconds: Option<i64>,
    version: i64,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let parse_uuid = |s: &str| {
            Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
        };
        let parse_opt_uuid = |s: Option<&String>| {
            s.map(|v| parse_uuid(v)).transpose()
        };
        let parse_time = |s: &str| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&chrono::Utc))
                .map_err(|e| DomainError::SerializationError(e.to_string()))
        };

        let status = TaskStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("invalid task status: {}", row.status))
        })?;
        let kind = TaskKind::from_str(&row.kind).ok_or_else(|| {
            DomainError::SerializationError(format!("invalid task kind: {}", row.kind))
        })?;

        let retry_history: Vec<RetryAttempt> = serde_json::from_str(&row.retry_history)?;
        let input = row
            .input
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let output = row
            .output
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            mission_id: parse_uuid(&row.mission_id)?,
            title: row.title,
            description: row.description,
            kind,
            status,
            assigned_to: parse_opt_uuid(row.assigned_to.as_ref())?,
            depends_on: Vec::new(), // Loaded separately
            retry_count: row.retry_count as u32,
            max_retries: row.max_retries as u32,
            retry_history,
            auditor_review_id: parse_opt_uuid(row.auditor_review_id.as_ref())?,
            human_task_id: parse_opt_uuid(row.human_task_id.as_ref())?,
            input,
            output,
            error: row.error,
            estimated_duration_seconds: row.estimated_duration_seconds,
            version: row.version as u64,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
            started_at: row.started_at.as_deref().map(parse_time).transpose()?,
            completed_at: row.completed_at.as_deref().map(parse_time).transpose()?,
        })
    }
}

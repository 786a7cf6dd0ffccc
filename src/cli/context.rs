//! CLI wiring: config, pool, repositories, and services.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::sqlite::{
    all_embedded_migrations, create_pool, Migrator, PoolConfig, SqliteAgentRepository,
    SqliteMissionRepository, SqliteTaskRepository,
};
use crate::domain::models::Config;
use crate::infrastructure::ConfigLoader;
use crate::services::{
    AuditService, CompositeAgentScorer, MissionCoordinator, MissionService, TaskService,
};

type Scorer = CompositeAgentScorer<SqliteAgentRepository, SqliteTaskRepository>;

/// Everything a command handler needs, built once per invocation.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub task_repo: Arc<SqliteTaskRepository>,
    pub mission_repo: Arc<SqliteMissionRepository>,
    pub agent_repo: Arc<SqliteAgentRepository>,
    pub scorer: Arc<Scorer>,
}

impl AppContext {
    /// Load config, open the pool, and run pending migrations.
    pub async fn init() -> Result<Self> {
        let config = ConfigLoader::load()?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let database_url = format!("sqlite://{}", config.database.path);
        let pool = create_pool(
            &database_url,
            Some(PoolConfig {
                max_connections: config.database.max_connections,
                ..Default::default()
            }),
        )
        .await
        .context("Failed to open database")?;

        Migrator::new(pool.clone())
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .context("Failed to run database migrations")?;

        let task_repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let mission_repo = Arc::new(SqliteMissionRepository::new(pool.clone()));
        let agent_repo = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let scorer = Arc::new(CompositeAgentScorer::new(
            agent_repo.clone(),
            task_repo.clone(),
        ));

        Ok(Self {
            config,
            pool,
            task_repo,
            mission_repo,
            agent_repo,
            scorer,
        })
    }

    pub fn mission_service(&self) -> MissionService<SqliteMissionRepository> {
        MissionService::new(self.mission_repo.clone())
    }

    pub fn task_service(
        &self,
    ) -> TaskService<SqliteTaskRepository, SqliteMissionRepository, SqliteAgentRepository> {
        TaskService::new(
            self.task_repo.clone(),
            self.mission_repo.clone(),
            self.agent_repo.clone(),
        )
        .with_default_max_retries(self.config.orchestration.default_max_retries)
    }

    pub fn coordinator(
        &self,
    ) -> MissionCoordinator<
        SqliteTaskRepository,
        SqliteMissionRepository,
        SqliteAgentRepository,
        Scorer,
    > {
        MissionCoordinator::new(
            self.task_repo.clone(),
            self.mission_repo.clone(),
            self.agent_repo.clone(),
            self.scorer.clone(),
            self.config.orchestration.auditor_role.clone(),
        )
    }

    pub fn audit_service(
        &self,
    ) -> AuditService<SqliteTaskRepository, SqliteMissionRepository, Scorer> {
        AuditService::new(
            self.task_repo.clone(),
            self.mission_repo.clone(),
            self.scorer.clone(),
        )
    }
}

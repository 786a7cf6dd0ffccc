//! Shared test helpers.

use sqlx::SqlitePool;
use std::sync::Arc;

use vanguard::adapters::sqlite::{
    all_embedded_migrations, create_test_pool, Migrator, SqliteAgentRepository,
    SqliteMissionRepository, SqliteTaskRepository,
};

/// In-memory database with the full schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = create_test_pool()
        .await
        .expect("failed to create test pool");
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("failed to run migrations");
    pool
}

pub struct TestRepos {
    pub tasks: Arc<SqliteTaskRepository>,
    pub missions: Arc<SqliteMissionRepository>,
    pub agents: Arc<SqliteAgentRepository>,
}

pub async fn setup_repos() -> (SqlitePool, TestRepos) {
    let pool = setup_test_db().await;
    let repos = TestRepos {
        tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
        missions: Arc::new(SqliteMissionRepository::new(pool.clone())),
        agents: Arc::new(SqliteAgentRepository::new(pool.clone())),
    };
    (pool, repos)
}

//! SQLite adapters implementing the repository ports.

pub mod agent_repository;
pub mod connection;
pub mod migrations;
pub mod mission_repository;
pub mod task_repository;

pub use agent_repository::SqliteAgentRepository;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use mission_repository::SqliteMissionRepository;
pub use task_repository::SqliteTaskRepository;

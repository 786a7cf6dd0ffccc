//! Vanguard - Mission Orchestration Engine
//!
//! Vanguard coordinates AI agents executing work items (tasks) inside
//! missions, with automatic recovery from failures: a task state machine,
//! a retry/audit escalation protocol, and a per-mission dependency DAG
//! that determines execution order and parallelism.
//!
//! # Architecture
//!
//! The crate follows Clean Architecture / Hexagonal Architecture:
//!
//! - **Domain Layer** (`domain`): models, state machine, repository ports
//! - **Service Layer** (`services`): graph engine, retry manager, audit
//!   processor, orchestration coordinator
//! - **Adapters** (`adapters`): SQLite implementations of the ports
//! - **Infrastructure** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use vanguard::cli::context::AppContext;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = AppContext::init().await?;
//!     let mission = ctx.mission_service().create("Ship it", "", None).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Agent, AgentStatus, Config, LogEntry, Mission, MissionPlan, MissionStatus, RetryAttempt, Task,
    TaskKind, TaskStatus,
};
pub use domain::ports::{
    AgentFilter, AgentRepository, AgentScorer, MissionRepository, TaskFilter, TaskRepository,
};
pub use infrastructure::{ConfigError, ConfigLoader};
pub use services::{
    AuditDecision, AuditDecisionRequest, AuditService, CompletionStatus, FailureReport,
    MissionCoordinator, MissionGraph, MissionService, RetryManager, TaskService,
};

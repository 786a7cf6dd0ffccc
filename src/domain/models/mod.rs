//! Domain models for the vanguard orchestration engine.

pub mod agent;
pub mod config;
pub mod mission;
pub mod plan;
pub mod task;

pub use agent::{Agent, AgentStatus};
pub use config::{Config, DatabaseConfig, LoggingConfig, OrchestrationConfig};
pub use mission::{LogEntry, Mission, MissionStatus};
pub use plan::{MissionPlan, PlanAgent, PlanTask};
pub use task::{RetryAttempt, Task, TaskKind, TaskStatus};

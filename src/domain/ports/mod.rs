//! Repository and collaborator ports.
//!
//! The concrete transport behind these traits is out of scope for the
//! orchestration core; the SQLite adapters are the default implementation.

pub mod agent_repository;
pub mod agent_scorer;
pub mod mission_repository;
pub mod task_repository;

pub use agent_repository::{AgentFilter, AgentRepository};
pub use agent_scorer::AgentScorer;
pub use mission_repository::MissionRepository;
pub use task_repository::{TaskFilter, TaskRepository};

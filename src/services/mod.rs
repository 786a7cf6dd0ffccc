//! Service layer: the orchestration engine's business logic.

pub mod audit_service;
pub mod dependency_graph;
pub mod mission_service;
pub mod orchestrator;
pub mod retry_service;
pub mod scoring;
pub mod task_service;

pub use audit_service::{AuditDecision, AuditDecisionRequest, AuditOutcome, AuditService};
pub use dependency_graph::{
    BlockedTask, BlockingDependency, CriticalPath, DagEdge, DagNode, DagView, MissionGraph,
};
pub use mission_service::MissionService;
pub use orchestrator::{CompletionStatus, MissionCoordinator, PlanItemFailure, PlanSummary};
pub use retry_service::{FailureReport, RetryManager};
pub use scoring::CompositeAgentScorer;
pub use task_service::{TaskService, TaskSubmission};

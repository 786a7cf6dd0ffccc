//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};
use serde_json::json;

use crate::domain::errors::DomainError;

/// Mission orchestration for AI agent squads.
#[derive(Parser)]
#[command(name = "vanguard", version, about, long_about = None)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the project-local .vanguard directory and database
    Init(commands::init::InitArgs),
    /// Manage missions: create, activate, inspect the DAG, check completion
    Mission(commands::mission::MissionArgs),
    /// Manage tasks: submit, claim, complete, fail, retry, audit
    Task(commands::task::TaskArgs),
    /// Manage agents: register and inspect
    Agent(commands::agent::AgentArgs),
}

/// Report an error and exit non-zero.
///
/// Domain errors carry structured detail (`needs_audit`, the offending
/// cycle, the reason) so callers can act without re-deriving state.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let body = match err.downcast_ref::<DomainError>() {
            Some(DomainError::MaxRetriesExceeded {
                task_id,
                retry_count,
                max_retries,
                needs_audit,
            }) => json!({
                "error": err.to_string(),
                "task_id": task_id,
                "retry_count": retry_count,
                "max_retries": max_retries,
                "needs_audit": needs_audit,
            }),
            Some(DomainError::DependencyCycle(cycle)) => json!({
                "error": err.to_string(),
                "cycle": cycle,
            }),
            Some(DomainError::InvalidStateTransition { from, to, reason }) => json!({
                "error": err.to_string(),
                "from": from,
                "to": to,
                "reason": reason,
            }),
            Some(DomainError::NoEligibleAgent { role }) => json!({
                "error": err.to_string(),
                "role": role,
            }),
            _ => json!({"error": err.to_string()}),
        };
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}

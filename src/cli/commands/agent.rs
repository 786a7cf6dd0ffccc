//! `vanguard agent` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::table::format_agent_table;
use crate::domain::errors::DomainError;
use crate::domain::models::{Agent, AgentStatus};
use crate::domain::ports::{AgentFilter, AgentRepository};

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommands,
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Register a new agent
    Register {
        /// Unique agent name
        name: String,
        /// Role the agent fills (e.g. researcher, executor, auditor)
        #[arg(long)]
        role: String,
    },
    /// List agents
    List {
        /// Filter by role
        #[arg(long)]
        role: Option<String>,
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one agent by id or name
    Show { agent: String },
    /// Set an agent's status (idle, busy, active, inactive, offline)
    SetStatus {
        agent: String,
        #[arg(long)]
        status: String,
    },
}

pub async fn execute(args: AgentArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        AgentCommands::Register { name, role } => {
            if ctx.agent_repo.get_by_name(&name).await?.is_some() {
                anyhow::bail!("agent '{name}' already exists");
            }
            let agent = Agent::new(name, role);
            ctx.agent_repo.create(&agent).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agent)?);
            } else {
                println!("Agent registered: {} ({})", agent.name, agent.id);
            }
        }
        AgentCommands::List { role, status } => {
            let status = status
                .as_deref()
                .map(str::parse::<AgentStatus>)
                .transpose()?;
            let agents = ctx
                .agent_repo
                .list(AgentFilter {
                    role,
                    status,
                    ..Default::default()
                })
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
            } else if agents.is_empty() {
                println!("No agents found.");
            } else {
                println!("{}", format_agent_table(&agents));
            }
        }
        AgentCommands::Show { agent } => {
            let agent = resolve_agent(&ctx, &agent).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agent)?);
            } else {
                println!("Agent {}", agent.id);
                println!("  Name: {}", agent.name);
                println!("  Role: {}", agent.role);
                println!("  Status: {}", agent.status);
                if let Some(mission) = agent.current_mission_id {
                    println!("  Current mission: {mission}");
                }
                println!(
                    "  Completed: {} | Failed: {} | Success rate: {:.0}%",
                    agent.tasks_completed,
                    agent.tasks_failed,
                    agent.success_rate * 100.0
                );
            }
        }
        AgentCommands::SetStatus { agent, status } => {
            let status: AgentStatus = status.parse()?;
            let mut agent = resolve_agent(&ctx, &agent).await?;
            agent.status = status;
            agent.updated_at = chrono::Utc::now();
            ctx.agent_repo.update(&agent).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agent)?);
            } else {
                println!("Agent {} is now {}.", agent.name, agent.status);
            }
        }
    }
    Ok(())
}

/// Look an agent up by UUID first, then by name.
async fn resolve_agent(ctx: &AppContext, reference: &str) -> Result<Agent> {
    let found = match Uuid::parse_str(reference) {
        Ok(id) => ctx.agent_repo.get(id).await?,
        Err(_) => ctx.agent_repo.get_by_name(reference).await?,
    };
    found
        .ok_or_else(|| DomainError::AgentNotFound(reference.to_string()))
        .context("agent lookup failed")
}

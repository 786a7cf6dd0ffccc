//! `vanguard mission` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::table::{format_dag_table, format_log_table, format_mission_table};
use crate::domain::models::MissionStatus;

#[derive(Args)]
pub struct MissionArgs {
    #[command(subcommand)]
    pub command: MissionCommands,
}

#[derive(Subcommand)]
pub enum MissionCommands {
    /// Create a new mission in draft status
    Create {
        /// Mission title
        title: String,
        /// What the mission should achieve
        #[arg(long, default_value = "")]
        objective: String,
        /// Lead agent id
        #[arg(long)]
        lead_agent: Option<Uuid>,
    },
    /// List missions
    List {
        /// Filter by status (draft, active, paused, completed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one mission
    Show { id: Uuid },
    /// Start dispatching tasks
    Activate { id: Uuid },
    /// Stop dispatching without interrupting in-flight work
    Pause { id: Uuid },
    /// Print the mission's dependency DAG
    Dag { id: Uuid },
    /// Print the critical path through the DAG
    CriticalPath { id: Uuid },
    /// Check whether the mission is complete; completes it when so
    Check { id: Uuid },
    /// Print the orchestration log
    Log { id: Uuid },
    /// Materialize a lead agent's plan document into tasks and agents
    Plan {
        id: Uuid,
        /// Path to the plan JSON file
        #[arg(long)]
        file: PathBuf,
        /// Plan-analysis task that produced this plan
        #[arg(long)]
        lead_task: Option<Uuid>,
    },
}

pub async fn execute(args: MissionArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    let missions = ctx.mission_service();

    match args.command {
        MissionCommands::Create {
            title,
            objective,
            lead_agent,
        } => {
            let mission = missions.create(title, objective, lead_agent).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&mission)?);
            } else {
                println!("Mission created: {}", mission.id);
            }
        }
        MissionCommands::List { status } => {
            let status = status
                .as_deref()
                .map(|s| {
                    MissionStatus::from_str(s)
                        .with_context(|| format!("invalid mission status: {s}"))
                })
                .transpose()?;
            let list = missions.list(status).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if list.is_empty() {
                println!("No missions found.");
            } else {
                println!("{}", format_mission_table(&list));
            }
        }
        MissionCommands::Show { id } => {
            let mission = missions.get(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&mission)?);
            } else {
                println!("Mission {}", mission.id);
                println!("  Title: {}", mission.title);
                println!("  Status: {}", mission.status.as_str());
                if !mission.objective.is_empty() {
                    println!("  Objective: {}", mission.objective);
                }
                if let Some(lead) = mission.lead_agent_id {
                    println!("  Lead agent: {lead}");
                }
                if let Some(waiting) = mission.awaiting_human_task_id {
                    println!("  Awaiting human task: {waiting}");
                }
            }
        }
        MissionCommands::Activate { id } => {
            let mission = missions.activate(id).await?;
            report_status(&mission, json)?;
        }
        MissionCommands::Pause { id } => {
            let mission = missions.pause(id).await?;
            report_status(&mission, json)?;
        }
        MissionCommands::Dag { id } => {
            let view = ctx.task_service().dag(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                if view.has_cycles {
                    println!("WARNING: dependency cycles present:");
                    for cycle in &view.cycles {
                        let ids: Vec<String> = cycle.iter().map(Uuid::to_string).collect();
                        println!("  {}", ids.join(" -> "));
                    }
                }
                println!("{}", format_dag_table(&view));
            }
        }
        MissionCommands::CriticalPath { id } => {
            let path = ctx.task_service().critical_path(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&path)?);
            } else {
                println!(
                    "Critical path ({} tasks, estimated {}s):",
                    path.path.len(),
                    path.total_duration_seconds
                );
                for task_id in &path.path {
                    println!("  {task_id}");
                }
            }
        }
        MissionCommands::Check { id } => {
            let status = ctx.coordinator().check_completion(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else if status.completed {
                println!(
                    "Mission {} is complete ({} tasks).",
                    id, status.total_tasks
                );
            } else {
                println!(
                    "Mission {} is not complete: {}/{} tasks finished.",
                    id, status.completed_tasks, status.total_tasks
                );
            }
        }
        MissionCommands::Log { id } => {
            let entries = missions.log(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No log entries.");
            } else {
                println!("{}", format_log_table(&entries));
            }
        }
        MissionCommands::Plan {
            id,
            file,
            lead_task,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read plan file {}", file.display()))?;
            let plan: serde_json::Value =
                serde_json::from_str(&raw).context("plan file is not valid JSON")?;

            let summary = ctx.coordinator().process_plan(id, lead_task, &plan).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Plan processed: {} tasks, {} new agents, {} reused, {} failures.",
                    summary.tasks_created.len(),
                    summary.agents_created.len(),
                    summary.agents_reused.len(),
                    summary.failures.len()
                );
                for failure in &summary.failures {
                    println!("  failed: {} ({})", failure.item, failure.error);
                }
            }
        }
    }
    Ok(())
}

fn report_status(mission: &crate::domain::models::Mission, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(mission)?);
    } else {
        println!("Mission {} is now {}.", mission.id, mission.status.as_str());
    }
    Ok(())
}

//! `vanguard task` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::table::{format_blocked_table, format_task_table};
use crate::domain::models::{TaskKind, TaskStatus};
use crate::domain::ports::TaskFilter;
use crate::services::{AuditDecisionRequest, TaskSubmission};

#[derive(Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Submit a new task into a mission
    Submit {
        /// Mission to add the task to
        mission: Uuid,
        /// Task title
        title: String,
        /// Detailed description
        #[arg(long, default_value = "")]
        description: String,
        /// Task kind (search, analysis, generation, execution, custom, ...)
        #[arg(long, default_value = "custom")]
        kind: String,
        /// Prerequisite task ids (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<Uuid>,
        /// Assign to an agent
        #[arg(long)]
        assign: Option<Uuid>,
        /// Estimated duration in seconds (critical-path weight)
        #[arg(long)]
        duration: Option<i64>,
        /// Automatic retry budget
        #[arg(long)]
        max_retries: Option<u32>,
        /// Input payload as JSON
        #[arg(long)]
        input: Option<String>,
    },
    /// List a mission's tasks
    List {
        mission: Uuid,
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one task
    Show { id: Uuid },
    /// Claim a specific task for an agent
    Claim {
        id: Uuid,
        #[arg(long)]
        agent: Uuid,
    },
    /// Claim the next executable task in a mission
    ClaimNext {
        mission: Uuid,
        #[arg(long)]
        agent: Uuid,
    },
    /// Mark an in-progress task completed
    Complete {
        id: Uuid,
        /// Output payload as JSON
        #[arg(long)]
        output: Option<String>,
    },
    /// Record a task failure; routes through the retry/audit protocol
    Fail {
        id: Uuid,
        /// Failure message
        #[arg(long)]
        error: String,
        /// Agent that executed the failed attempt
        #[arg(long)]
        agent: Option<Uuid>,
    },
    /// Return a failed task to the queue for another attempt
    Retry { id: Uuid },
    /// Apply an auditor decision to a task under audit
    AuditDecision {
        id: Uuid,
        /// One of: reassign, refine, escalate_human, retry
        #[arg(long)]
        decision: String,
        /// Why the auditor chose this action
        #[arg(long)]
        reason: String,
        /// Role to reassign to
        #[arg(long)]
        suggested_agent_role: Option<String>,
        /// Replacement description
        #[arg(long)]
        refined_description: Option<String>,
        /// Question to put to the human
        #[arg(long)]
        question_for_human: Option<String>,
    },
    /// Answer a human-input task, unblocking the escalated task
    Answer {
        /// The human-input task id
        id: Uuid,
        /// Response payload as JSON (or a plain string)
        #[arg(long)]
        response: String,
    },
    /// Add a dependency edge (rejected if it would close a cycle)
    AddDependency {
        id: Uuid,
        /// Task this one should depend on
        depends_on: Uuid,
    },
    /// Remove a dependency edge
    RemoveDependency { id: Uuid, depends_on: Uuid },
    /// Tasks eligible for dispatch right now
    Executable { mission: Uuid },
    /// Pending tasks held back by incomplete dependencies
    Blocked { mission: Uuid },
    /// Delete a task
    Delete { id: Uuid },
}

#[allow(clippy::too_many_lines)]
pub async fn execute(args: TaskArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    let tasks = ctx.task_service();

    match args.command {
        TaskCommands::Submit {
            mission,
            title,
            description,
            kind,
            depends_on,
            assign,
            duration,
            max_retries,
            input,
        } => {
            let kind = TaskKind::from_str(&kind)
                .with_context(|| format!("invalid task kind: {kind}"))?;
            let input = input
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("input is not valid JSON")?;

            let task = tasks
                .submit(
                    mission,
                    TaskSubmission {
                        title,
                        description,
                        kind,
                        depends_on,
                        assigned_to: assign,
                        estimated_duration_seconds: duration,
                        max_retries,
                        input,
                    },
                )
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("Task submitted: {}", task.id);
            }
        }
        TaskCommands::List { mission, status } => {
            let status = status
                .as_deref()
                .map(|s| {
                    TaskStatus::from_str(s).with_context(|| format!("invalid task status: {s}"))
                })
                .transpose()?;
            let list = tasks
                .list(
                    mission,
                    TaskFilter {
                        status,
                        ..Default::default()
                    },
                )
                .await?;
            print_tasks(&list, json)?;
        }
        TaskCommands::Show { id } => {
            let task = tasks.get(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                print_task_details(&task);
            }
        }
        TaskCommands::Claim { id, agent } => {
            let task = tasks.claim(id, agent).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("Task {} claimed by agent {}.", task.id, agent);
            }
        }
        TaskCommands::ClaimNext { mission, agent } => {
            match tasks.claim_next(mission, agent).await? {
                Some(task) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&task)?);
                    } else {
                        println!("Claimed task {}: {}", task.id, task.title);
                    }
                }
                None => {
                    if json {
                        println!("null");
                    } else {
                        println!("No executable tasks available.");
                    }
                }
            }
        }
        TaskCommands::Complete { id, output } => {
            let output = output
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("output is not valid JSON")?;
            let task = tasks.complete(id, output).await?;
            // Completion may have been the mission's last open task
            let completion = ctx.coordinator().check_completion(task.mission_id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "task": task,
                        "mission_completed": completion.completed,
                    }))?
                );
            } else {
                println!("Task {} completed.", task.id);
                if completion.completed {
                    println!("Mission {} is now complete.", task.mission_id);
                }
            }
        }
        TaskCommands::Fail { id, error, agent } => {
            let report = ctx.coordinator().record_failure(id, &error, agent).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Failure recorded: status={}, retry_count={}{}",
                    report.status.as_str(),
                    report.retry_count,
                    if report.needs_audit {
                        ", audit requested"
                    } else {
                        ""
                    }
                );
            }
        }
        TaskCommands::Retry { id } => {
            let task = ctx.coordinator().retry_task(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!(
                    "Task {} requeued (attempt {} of {}).",
                    task.id,
                    task.retry_count + 1,
                    task.max_retries + 1
                );
            }
        }
        TaskCommands::AuditDecision {
            id,
            decision,
            reason,
            suggested_agent_role,
            refined_description,
            question_for_human,
        } => {
            let decision = decision.parse()?;
            let outcome = ctx
                .audit_service()
                .apply_decision(
                    id,
                    AuditDecisionRequest {
                        decision,
                        reason,
                        suggested_agent_role,
                        refined_description,
                        question_for_human,
                    },
                )
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.message);
            }
        }
        TaskCommands::Answer { id, response } => {
            let response = serde_json::from_str(&response)
                .unwrap_or(serde_json::Value::String(response));
            let task = ctx.coordinator().answer_human_task(id, response).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("Task {} unblocked and requeued.", task.id);
            }
        }
        TaskCommands::AddDependency { id, depends_on } => {
            let task = tasks.add_dependency(id, depends_on).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("Task {} now depends on {}.", id, depends_on);
            }
        }
        TaskCommands::RemoveDependency { id, depends_on } => {
            let task = tasks.remove_dependency(id, depends_on).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("Dependency removed from task {}.", task.id);
            }
        }
        TaskCommands::Executable { mission } => {
            let list = tasks.executable_tasks(mission).await?;
            print_tasks(&list, json)?;
        }
        TaskCommands::Blocked { mission } => {
            let blocked = tasks.blocked_tasks(mission).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&blocked)?);
            } else if blocked.is_empty() {
                println!("No blocked tasks.");
            } else {
                println!("{}", format_blocked_table(&blocked));
            }
        }
        TaskCommands::Delete { id } => {
            tasks.delete(id).await?;
            if json {
                println!("{}", serde_json::json!({"deleted": id}));
            } else {
                println!("Task {id} deleted.");
            }
        }
    }
    Ok(())
}

fn print_tasks(tasks: &[crate::domain::models::Task], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tasks)?);
    } else if tasks.is_empty() {
        println!("No tasks found.");
    } else {
        println!("{}", format_task_table(tasks));
        println!("\nShowing {} task(s)", tasks.len());
    }
    Ok(())
}

fn print_task_details(task: &crate::domain::models::Task) {
    println!("Task {}", task.id);
    println!("  Title: {}", task.title);
    println!("  Kind: {}", task.kind.as_str());
    println!("  Status: {}", task.status.as_str());
    println!("  Mission: {}", task.mission_id);
    println!("  Retries: {}/{}", task.retry_count, task.max_retries);
    if let Some(assignee) = task.assigned_to {
        println!("  Assigned to: {assignee}");
    }
    if let Some(review) = task.auditor_review_id {
        println!("  Under audit: {review}");
    }
    if let Some(human) = task.human_task_id {
        println!("  Awaiting human task: {human}");
    }
    if let Some(error) = &task.error {
        println!("  Last error: {error}");
    }
    if !task.depends_on.is_empty() {
        println!("  Dependencies:");
        for dep in &task.depends_on {
            println!("    - {dep}");
        }
    }
    if !task.retry_history.is_empty() {
        println!("  Retry history:");
        for attempt in &task.retry_history {
            println!(
                "    #{} at {}: {}",
                attempt.attempt,
                attempt.timestamp.format("%Y-%m-%d %H:%M:%S"),
                attempt.error
            );
        }
    }
}

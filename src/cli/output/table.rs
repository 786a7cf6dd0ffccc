//! Table formatting for terminal output.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use console::style;

use crate::domain::models::{Agent, LogEntry, Mission, Task, TaskStatus};
use crate::services::{BlockedTask, DagView};

fn status_cell(status: TaskStatus) -> Cell {
    let text = status.as_str();
    let styled = match status {
        TaskStatus::Completed => style(text).green(),
        TaskStatus::Failed => style(text).red(),
        TaskStatus::InProgress => style(text).cyan(),
        TaskStatus::UnderAudit | TaskStatus::AwaitingHumanResponse => style(text).yellow(),
        TaskStatus::Pending => style(text).dim(),
    };
    Cell::new(styled.to_string())
}

fn base_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.to_vec());
    table
}

pub fn format_task_table(tasks: &[Task]) -> String {
    let mut table = base_table(&["ID", "Title", "Kind", "Status", "Retries", "Deps"]);
    for task in tasks {
        table.add_row(vec![
            Cell::new(short_id(&task.id.to_string())),
            Cell::new(&task.title),
            Cell::new(task.kind.as_str()),
            status_cell(task.status),
            Cell::new(format!("{}/{}", task.retry_count, task.max_retries)),
            Cell::new(task.depends_on.len().to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_mission_table(missions: &[Mission]) -> String {
    let mut table = base_table(&["ID", "Title", "Status", "Lead agent"]);
    for mission in missions {
        table.add_row(vec![
            Cell::new(short_id(&mission.id.to_string())),
            Cell::new(&mission.title),
            Cell::new(mission.status.as_str()),
            Cell::new(
                mission
                    .lead_agent_id
                    .map(|id| short_id(&id.to_string()))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    table.to_string()
}

pub fn format_agent_table(agents: &[Agent]) -> String {
    let mut table = base_table(&["ID", "Name", "Role", "Status", "Done", "Failed", "Success"]);
    for agent in agents {
        table.add_row(vec![
            Cell::new(short_id(&agent.id.to_string())),
            Cell::new(&agent.name),
            Cell::new(&agent.role),
            Cell::new(agent.status.to_string()),
            Cell::new(agent.tasks_completed.to_string()),
            Cell::new(agent.tasks_failed.to_string()),
            Cell::new(format!("{:.0}%", agent.success_rate * 100.0)),
        ]);
    }
    table.to_string()
}

pub fn format_log_table(entries: &[LogEntry]) -> String {
    let mut table = base_table(&["Timestamp", "Action", "Details"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(&entry.action),
            Cell::new(entry.details.to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_dag_table(view: &DagView) -> String {
    let mut table = base_table(&["Level", "Task", "Status", "Depends on"]);

    let mut nodes: Vec<_> = view.nodes.iter().collect();
    nodes.sort_by_key(|n| (n.level.unwrap_or(u32::MAX), n.task_id));

    for node in nodes {
        let deps: Vec<String> = view
            .edges
            .iter()
            .filter(|e| e.to == node.task_id)
            .map(|e| short_id(&e.from.to_string()))
            .collect();
        table.add_row(vec![
            Cell::new(
                node.level
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "?".to_string()),
            ),
            Cell::new(format!("{} ({})", node.title, short_id(&node.task_id.to_string()))),
            status_cell(node.status),
            Cell::new(if deps.is_empty() {
                "-".to_string()
            } else {
                deps.join(", ")
            }),
        ]);
    }
    table.to_string()
}

pub fn format_blocked_table(blocked: &[BlockedTask]) -> String {
    let mut table = base_table(&["Task", "Blocked by", "Blocker status"]);
    for entry in blocked {
        for blocker in &entry.blocking {
            table.add_row(vec![
                Cell::new(short_id(&entry.task_id.to_string())),
                Cell::new(short_id(&blocker.task_id.to_string())),
                status_cell(blocker.status),
            ]);
        }
    }
    table.to_string()
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

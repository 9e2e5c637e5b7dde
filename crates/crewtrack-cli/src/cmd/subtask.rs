use crate::output::{print_json, print_table};
use crate::session::{block_on, parse_date, Session};
use anyhow::Context;
use clap::Subcommand;
use crewtrack_core::query;
use crewtrack_core::types::SubtaskStatus;
use crewtrack_core::workspace::NewSubtask;
use std::path::Path;

#[derive(Subcommand)]
pub enum SubtaskSubcommand {
    /// Add a subtask to a task (manager)
    Add {
        task_id: String,
        name: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
    },
    /// List the subtasks of a task
    List {
        task_id: String,
        /// Only subtasks in this status
        #[arg(long)]
        status: Option<SubtaskStatus>,
        /// Only incomplete subtasks past their due date
        #[arg(long)]
        overdue: bool,
    },
    /// Change a subtask's status (member). Completing after the due date
    /// records a late delivery.
    Status {
        id: String,
        /// pending, in_progress, completed or late_delivery
        status: SubtaskStatus,
        #[arg(long, short = 'm')]
        comment: String,
    },
    /// Delete a subtask (manager)
    Delete { id: String },
}

pub fn run(root: &Path, user: Option<&str>, subcmd: SubtaskSubcommand, json: bool) -> anyhow::Result<()> {
    let session = Session::open(root, user)?;
    match subcmd {
        SubtaskSubcommand::Add { task_id, name, due } => {
            block_on(add(&session, &task_id, name, due.as_deref(), json))
        }
        SubtaskSubcommand::List {
            task_id,
            status,
            overdue,
        } => block_on(list(&session, &task_id, status, overdue, json)),
        SubtaskSubcommand::Status {
            id,
            status,
            comment,
        } => block_on(change_status(&session, &id, status, &comment, json)),
        SubtaskSubcommand::Delete { id } => block_on(delete(&session, &id, json)),
    }
}

async fn add(session: &Session, task_id: &str, name: String, due: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let subtask = ws
        .create_subtask(
            &actor,
            task_id,
            NewSubtask {
                name,
                due_date: due.map(parse_date).transpose()?,
            },
        )
        .await
        .context("failed to add subtask")?;

    if json {
        print_json(&subtask)?;
    } else {
        println!("Added subtask '{}' [{}]", subtask.name, subtask.id);
    }
    Ok(())
}

async fn list(
    session: &Session,
    task_id: &str,
    status: Option<SubtaskStatus>,
    overdue: bool,
    json: bool,
) -> anyhow::Result<()> {
    let ws = session.workspace();
    let subtasks = ws.subtasks_of(task_id).await?;
    let mut shown: Vec<_> = match status {
        Some(s) => query::with_status(&subtasks, s),
        None => subtasks.iter().collect(),
    };
    if overdue {
        let late: Vec<_> = query::overdue(&subtasks, chrono::Utc::now())
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        shown.retain(|s| late.contains(&s.id.as_str()));
    }

    if json {
        print_json(&shown)?;
        return Ok(());
    }
    if shown.is_empty() {
        println!("No subtasks.");
        return Ok(());
    }
    let rows = shown
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.name.clone(),
                s.status.to_string(),
                s.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "STATUS", "DUE"], rows);
    Ok(())
}

async fn change_status(
    session: &Session,
    id: &str,
    status: SubtaskStatus,
    comment: &str,
    json: bool,
) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let outcome = ws
        .change_subtask_status(&actor, id, status, comment)
        .await
        .with_context(|| format!("failed to change status of subtask '{id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "subtask_id": outcome.change.subtask.id,
            "previous": outcome.change.previous,
            "status": outcome.change.effective,
            "late": outcome.change.was_late(),
            "task_progress": outcome.task_progress,
            "project_progress": outcome.project_progress,
            "audited": outcome.audit.is_some(),
        }))?;
        return Ok(());
    }

    println!(
        "Subtask [{}]: {} -> {}",
        outcome.change.subtask.id, outcome.change.previous, outcome.change.effective
    );
    if outcome.change.was_late() {
        println!("  completed after the due date; recorded as late delivery");
    }
    match (outcome.task_progress, outcome.project_progress) {
        (Some(task), Some(project)) => {
            println!("Task progress: {task}%  Project progress: {project}%")
        }
        (Some(task), None) => println!("Task progress: {task}%  (project no longer exists)"),
        _ => println!("  parent task no longer exists; no progress recomputed"),
    }
    Ok(())
}

async fn delete(session: &Session, id: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let removal = ws
        .delete_subtask(&actor, id)
        .await
        .with_context(|| format!("failed to delete subtask '{id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "deleted": removal.subtask.id,
            "task_progress": removal.task_progress,
            "project_progress": removal.project_progress,
        }))?;
    } else {
        println!("Deleted subtask '{}' [{}]", removal.subtask.name, removal.subtask.id);
    }
    Ok(())
}

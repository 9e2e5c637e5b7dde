use crate::output::{print_json, print_table};
use crate::session::{block_on, Session};
use anyhow::Context;
use clap::Subcommand;
use crewtrack_core::audit::HistoryQuery;
use crewtrack_core::model::AuditEntry;
use std::path::Path;

#[derive(Subcommand)]
pub enum HistorySubcommand {
    /// Delete every history entry (manager, password required)
    Purge {
        #[arg(long)]
        password: String,
    },
}

/// Filters given on `crewtrack history` itself.
#[derive(Debug, Default)]
pub struct HistoryFilter {
    pub project: Option<String>,
    pub task: Option<String>,
    pub subtask: Option<String>,
    pub limit: Option<usize>,
}

pub fn run(
    root: &Path,
    user: Option<&str>,
    subcmd: Option<HistorySubcommand>,
    filter: HistoryFilter,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::open(root, user)?;
    match subcmd {
        Some(HistorySubcommand::Purge { password }) => block_on(purge(&session, &password, json)),
        None => block_on(list(&session, filter, json)),
    }
}

async fn list(session: &Session, filter: HistoryFilter, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let query = HistoryQuery {
        project_id: filter.project,
        task_id: filter.task,
        subtask_id: filter.subtask,
        actor_id: None,
        limit: Some(filter.limit.unwrap_or(session.config.history.default_limit)),
    };
    let entries = ws
        .history(&actor, &query)
        .await
        .context("failed to read history")?;

    if json {
        print_json(&entries)?;
        return Ok(());
    }
    if entries.is_empty() {
        println!("No history.");
        return Ok(());
    }
    let rows = entries.iter().map(row).collect();
    print_table(&["WHEN", "WHO", "ACTION", "CHANGE", "COMMENT"], rows);
    Ok(())
}

fn row(entry: &AuditEntry) -> Vec<String> {
    let change = match (&entry.previous_state, &entry.new_state) {
        (Some(prev), Some(new)) => format!("{prev} -> {new}"),
        (None, Some(new)) => format!("+ {new}"),
        (Some(prev), None) => format!("- {prev}"),
        (None, None) => String::new(),
    };
    vec![
        entry.timestamp.format("%Y-%m-%d %H:%M").to_string(),
        entry.actor_username.clone(),
        entry.action.to_string(),
        change,
        entry.comment.clone().unwrap_or_default(),
    ]
}

async fn purge(session: &Session, password: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let removed = ws
        .purge_history(&actor, password)
        .await
        .context("failed to purge history")?;

    if json {
        print_json(&serde_json::json!({ "removed": removed }))?;
    } else {
        println!("Removed {removed} history entries");
    }
    Ok(())
}

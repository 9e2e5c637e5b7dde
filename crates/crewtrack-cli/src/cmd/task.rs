use crate::output::{print_json, print_table};
use crate::session::{block_on, parse_date, Session};
use anyhow::Context;
use clap::Subcommand;
use crewtrack_core::query;
use crewtrack_core::workspace::{NewTask, TaskChanges};
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Add a task to a project (manager)
    Create {
        project_id: String,
        name: String,
        /// Due date, YYYY-MM-DD (default: the project's)
        #[arg(long)]
        due: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List the tasks of a project
    List { project_id: String },
    /// Show a task with its subtasks
    Show { id: String },
    /// Edit task fields (manager)
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// New due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
    },
    /// Delete a task (manager, password required)
    Delete {
        id: String,
        #[arg(long)]
        password: String,
    },
    /// Assign a project member to the task (manager)
    Assign { id: String, username: String },
    /// Take a user off the task (manager)
    Unassign { id: String, username: String },
}

pub fn run(root: &Path, user: Option<&str>, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    let session = Session::open(root, user)?;
    match subcmd {
        TaskSubcommand::Create {
            project_id,
            name,
            due,
            description,
        } => block_on(create(&session, &project_id, name, due.as_deref(), description, json)),
        TaskSubcommand::List { project_id } => block_on(list(&session, &project_id, json)),
        TaskSubcommand::Show { id } => block_on(show(&session, &id, json)),
        TaskSubcommand::Edit {
            id,
            name,
            description,
            due,
        } => block_on(edit(&session, &id, name, description, due.as_deref(), json)),
        TaskSubcommand::Delete { id, password } => block_on(delete(&session, &id, &password, json)),
        TaskSubcommand::Assign { id, username } => block_on(assign(&session, &id, &username, true, json)),
        TaskSubcommand::Unassign { id, username } => {
            block_on(assign(&session, &id, &username, false, json))
        }
    }
}

async fn create(
    session: &Session,
    project_id: &str,
    name: String,
    due: Option<&str>,
    description: String,
    json: bool,
) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let task = ws
        .create_task(
            &actor,
            project_id,
            NewTask {
                name,
                description,
                due_date: due.map(parse_date).transpose()?,
                members: Vec::new(),
            },
        )
        .await
        .context("failed to create task")?;

    if json {
        print_json(&task)?;
    } else {
        println!("Created task '{}' [{}]", task.name, task.id);
    }
    Ok(())
}

async fn list(session: &Session, project_id: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let project = ws
        .project(project_id)
        .await
        .with_context(|| format!("project '{project_id}' not found"))?;
    let tasks = ws.tasks_of(project_id).await?;

    if json {
        print_json(&tasks)?;
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks in '{}'.", project.name);
        return Ok(());
    }
    let rows = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.name.clone(),
                t.effective_due_date(&project).to_string(),
                format!("{}%", t.progress),
                t.members.len().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "DUE", "PROGRESS", "MEMBERS"], rows);
    Ok(())
}

async fn show(session: &Session, id: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let task = ws
        .task(id)
        .await
        .with_context(|| format!("task '{id}' not found"))?;
    let subtasks = ws.subtasks_of(id).await?;

    if json {
        print_json(&serde_json::json!({
            "task": task,
            "subtasks": subtasks,
            "counts": query::status_counts(&subtasks),
        }))?;
        return Ok(());
    }

    println!("Task: {} [{}]", task.name, task.id);
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    if let Some(due) = task.due_date {
        println!("Due:      {due}");
    }
    println!("Progress: {}% ({})", task.progress, query::summarize(&subtasks));
    if subtasks.is_empty() {
        return Ok(());
    }
    println!();
    let rows = subtasks
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
    print_table(&["ID", "SUBTASK", "STATUS", "DUE"], rows);
    Ok(())
}

async fn edit(
    session: &Session,
    id: &str,
    name: Option<String>,
    description: Option<String>,
    due: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let changes = TaskChanges {
        name,
        description,
        due_date: due.map(parse_date).transpose()?,
    };
    let task = ws
        .edit_task(&actor, id, changes)
        .await
        .with_context(|| format!("failed to edit task '{id}'"))?;

    if json {
        print_json(&task)?;
    } else {
        println!("Updated task '{}' [{}]", task.name, task.id);
    }
    Ok(())
}

async fn delete(session: &Session, id: &str, password: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let removal = ws
        .delete_task(&actor, id, password)
        .await
        .with_context(|| format!("failed to delete task '{id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "deleted": removal.task.id,
            "name": removal.task.name,
            "project_progress": removal.project_progress,
        }))?;
    } else {
        println!("Deleted task '{}' [{}]", removal.task.name, removal.task.id);
        if let Some(pct) = removal.project_progress {
            println!("Project progress: {pct}%");
        }
    }
    Ok(())
}

async fn assign(session: &Session, id: &str, username: &str, add: bool, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let user_id = session.user_id(username).await?;
    let task = if add {
        ws.assign_task_member(&actor, id, &user_id).await
    } else {
        ws.remove_task_member(&actor, id, &user_id).await
    }
    .with_context(|| format!("failed to update members of task '{id}'"))?;

    if json {
        print_json(&task)?;
    } else if add {
        println!("Assigned {username} to '{}'", task.name);
    } else {
        println!("Unassigned {username} from '{}'", task.name);
    }
    Ok(())
}

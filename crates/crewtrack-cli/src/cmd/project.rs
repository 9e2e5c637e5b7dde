use crate::output::{print_json, print_table};
use crate::session::{block_on, parse_date, Session};
use anyhow::Context;
use clap::Subcommand;
use crewtrack_core::query;
use crewtrack_core::workspace::{NewProject, ProjectChanges};
use std::path::Path;

#[derive(Subcommand)]
pub enum ProjectSubcommand {
    /// Create a project (manager)
    Create {
        name: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List projects
    List {
        /// Only projects whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a project with its tasks
    Show { id: String },
    /// Edit project fields (manager)
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
    /// Delete a project (manager, password required)
    Delete {
        id: String,
        #[arg(long)]
        password: String,
    },
    /// Add a user to the project (manager)
    Assign { id: String, username: String },
    /// Remove a user from the project (manager)
    Unassign { id: String, username: String },
    /// Recompute every task's progress and then the project's
    Refresh { id: String },
}

pub fn run(root: &Path, user: Option<&str>, subcmd: ProjectSubcommand, json: bool) -> anyhow::Result<()> {
    let session = Session::open(root, user)?;
    match subcmd {
        ProjectSubcommand::Create {
            name,
            due,
            description,
        } => block_on(create(&session, name, &due, description, json)),
        ProjectSubcommand::List { search } => block_on(list(&session, search.as_deref(), json)),
        ProjectSubcommand::Show { id } => block_on(show(&session, &id, json)),
        ProjectSubcommand::Edit {
            id,
            name,
            description,
            due,
        } => block_on(edit(&session, &id, name, description, due.as_deref(), json)),
        ProjectSubcommand::Delete { id, password } => block_on(delete(&session, &id, &password, json)),
        ProjectSubcommand::Assign { id, username } => {
            block_on(assign(&session, &id, &username, true, json))
        }
        ProjectSubcommand::Unassign { id, username } => {
            block_on(assign(&session, &id, &username, false, json))
        }
        ProjectSubcommand::Refresh { id } => block_on(refresh(&session, &id, json)),
    }
}

async fn create(session: &Session, name: String, due: &str, description: String, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let project = ws
        .create_project(
            &actor,
            NewProject {
                name,
                description,
                due_date: parse_date(due)?,
                members: Vec::new(),
            },
        )
        .await
        .context("failed to create project")?;

    if json {
        print_json(&project)?;
    } else {
        println!("Created project '{}' [{}] due {}", project.name, project.id, project.due_date);
    }
    Ok(())
}

async fn list(session: &Session, search: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let projects = ws.projects().await?;
    let shown = query::search(&projects, search.unwrap_or_default());

    if json {
        print_json(&shown)?;
        return Ok(());
    }
    if shown.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    let rows = shown
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.name.clone(),
                p.due_date.to_string(),
                format!("{}%", p.progress),
                p.members.len().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "DUE", "PROGRESS", "MEMBERS"], rows);
    Ok(())
}

async fn show(session: &Session, id: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let project = ws
        .project(id)
        .await
        .with_context(|| format!("project '{id}' not found"))?;
    let tasks = ws.tasks_of(id).await?;

    if json {
        print_json(&serde_json::json!({ "project": project, "tasks": tasks }))?;
        return Ok(());
    }

    println!("Project: {} [{}]", project.name, project.id);
    if !project.description.is_empty() {
        println!("  {}", project.description);
    }
    println!("Due:      {}", project.due_date);
    println!("Progress: {}%", project.progress);
    println!("Members:  {}", project.members.len());
    if tasks.is_empty() {
        println!("\nNo tasks.");
        return Ok(());
    }
    println!();
    let rows = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.name.clone(),
                t.effective_due_date(&project).to_string(),
                format!("{}%", t.progress),
            ]
        })
        .collect();
    print_table(&["ID", "TASK", "DUE", "PROGRESS"], rows);
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
    let changes = ProjectChanges {
        name,
        description,
        due_date: due.map(parse_date).transpose()?,
    };
    let project = ws
        .edit_project(&actor, id, changes)
        .await
        .with_context(|| format!("failed to edit project '{id}'"))?;

    if json {
        print_json(&project)?;
    } else {
        println!("Updated project '{}' [{}]", project.name, project.id);
    }
    Ok(())
}

async fn delete(session: &Session, id: &str, password: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let project = ws
        .delete_project(&actor, id, password)
        .await
        .with_context(|| format!("failed to delete project '{id}'"))?;

    if json {
        print_json(&serde_json::json!({ "deleted": project.id, "name": project.name }))?;
    } else {
        println!("Deleted project '{}' [{}]", project.name, project.id);
    }
    Ok(())
}

async fn assign(session: &Session, id: &str, username: &str, add: bool, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let actor = session.actor(&ws).await?;
    let user_id = session.user_id(username).await?;
    let project = if add {
        ws.assign_project_member(&actor, id, &user_id).await
    } else {
        ws.remove_project_member(&actor, id, &user_id).await
    }
    .with_context(|| format!("failed to update members of project '{id}'"))?;

    if json {
        print_json(&project)?;
    } else if add {
        println!("Added {username} to '{}'", project.name);
    } else {
        println!("Removed {username} from '{}'", project.name);
    }
    Ok(())
}

async fn refresh(session: &Session, id: &str, json: bool) -> anyhow::Result<()> {
    let ws = session.workspace();
    let rollup = ws
        .refresh_project(id)
        .await
        .with_context(|| format!("failed to refresh project '{id}'"))?;

    if json {
        print_json(&rollup)?;
    } else {
        println!(
            "Project [{}]: {}% ({} tasks recomputed)",
            rollup.project_id,
            rollup.project_progress,
            rollup.tasks.len()
        );
    }
    Ok(())
}

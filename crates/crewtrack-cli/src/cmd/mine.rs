use crate::output::{print_json, print_table};
use crate::session::{block_on, Session};
use crewtrack_core::query;
use std::path::Path;

pub fn run(root: &Path, user: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = Session::open(root, user)?;
    block_on(async {
        let ws = session.workspace();
        let actor = session.actor(&ws).await?;
        let work = ws.assigned_work(&actor).await?;

        if json {
            print_json(&work)?;
            return Ok(());
        }
        if work.projects.is_empty() {
            println!("Nothing assigned to {}.", actor.username);
            return Ok(());
        }

        for project in &work.projects {
            println!("{} [{}]  due {}  {}%", project.name, project.id, project.due_date, project.progress);
            let rows: Vec<Vec<String>> = work
                .tasks
                .iter()
                .filter(|t| t.project_id == project.id)
                .map(|t| {
                    let subs: Vec<_> = work
                        .subtasks
                        .iter()
                        .filter(|s| s.task_id == t.id)
                        .cloned()
                        .collect();
                    vec![
                        t.id.clone(),
                        t.name.clone(),
                        format!("{}%", t.progress),
                        query::summarize(&subs),
                    ]
                })
                .collect();
            if rows.is_empty() {
                println!("  no tasks\n");
                continue;
            }
            print_table(&["ID", "TASK", "PROGRESS", "SUBTASKS"], rows);
            println!();
        }

        let overdue = query::overdue(&work.subtasks, chrono::Utc::now());
        if !overdue.is_empty() {
            println!("Overdue:");
            for s in overdue {
                let due = s.due_date.map(|d| d.to_string()).unwrap_or_default();
                println!("  [{}] {} (due {due}, {})", s.id, s.name, s.status);
            }
        }
        Ok(())
    })
}

//! Due-date constraints between parents and children.
//!
//! - A project is never due before the day it was created.
//! - A task is never due after its project.
//! - A subtask is never due after its task's effective due date (the task's
//!   own date, or the project's when the task has none).
//!
//! The bounds hold in both directions: moving a parent's date earlier must
//! not strand a child past it.

use crate::error::{CrewtrackError, Result};
use crate::model::{Project, Task};
use chrono::NaiveDate;

pub fn check_project_due(due: NaiveDate, created_on: NaiveDate) -> Result<()> {
    if due < created_on {
        return Err(CrewtrackError::Validation(format!(
            "project due date {due} is before its creation day {created_on}"
        )));
    }
    Ok(())
}

pub fn check_task_due(due: Option<NaiveDate>, project: &Project) -> Result<()> {
    match due {
        Some(due) if due > project.due_date => Err(CrewtrackError::Validation(format!(
            "task due date {due} is after the project due date {}",
            project.due_date
        ))),
        _ => Ok(()),
    }
}

pub fn check_subtask_due(due: Option<NaiveDate>, task: &Task, project: &Project) -> Result<()> {
    let limit = task.effective_due_date(project);
    match due {
        Some(due) if due > limit => Err(CrewtrackError::Validation(format!(
            "subtask due date {due} is after the task due date {limit}"
        ))),
        _ => Ok(()),
    }
}

/// Reject `due` for a `parent` when any named child is due after it.
pub fn check_children_due<'a>(
    parent: &str,
    due: NaiveDate,
    children: impl IntoIterator<Item = (&'a str, Option<NaiveDate>)>,
) -> Result<()> {
    for (name, child_due) in children {
        if let Some(child_due) = child_due.filter(|d| *d > due) {
            return Err(CrewtrackError::Validation(format!(
                "{parent} due date {due} is before '{name}', which is due {child_due}"
            )));
        }
    }
    Ok(())
}

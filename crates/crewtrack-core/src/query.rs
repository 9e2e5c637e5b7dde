//! Client-side filters over already-fetched records.

use crate::model::{Project, Subtask, Task};
use crate::types::SubtaskStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Anything with a display name that can be searched.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Project {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Task {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Subtask {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive substring match on the name. An empty needle matches all.
pub fn search<'a, T: Named>(items: &'a [T], needle: &str) -> Vec<&'a T> {
    let needle = needle.trim().to_lowercase();
    items
        .iter()
        .filter(|item| item.name().to_lowercase().contains(&needle))
        .collect()
}

pub fn with_status(subtasks: &[Subtask], status: SubtaskStatus) -> Vec<&Subtask> {
    subtasks.iter().filter(|s| s.status == status).collect()
}

pub fn tasks_assigned_to<'a>(tasks: &'a [Task], user_id: &str) -> Vec<&'a Task> {
    tasks.iter().filter(|t| t.has_member(user_id)).collect()
}

/// Projects the user belongs to or created.
pub fn projects_of<'a>(projects: &'a [Project], user_id: &str) -> Vec<&'a Project> {
    projects
        .iter()
        .filter(|p| p.creator_id == user_id || p.has_member(user_id))
        .collect()
}

/// Incomplete subtasks whose due day has passed.
pub fn overdue(subtasks: &[Subtask], now: DateTime<Utc>) -> Vec<&Subtask> {
    subtasks
        .iter()
        .filter(|s| !s.completed && s.is_past_due(now))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub late_delivery: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.late_delivery
    }
}

pub fn status_counts(subtasks: &[Subtask]) -> StatusCounts {
    subtasks
        .iter()
        .fold(StatusCounts::default(), |mut counts, s| {
            match s.status {
                SubtaskStatus::Pending => counts.pending += 1,
                SubtaskStatus::InProgress => counts.in_progress += 1,
                SubtaskStatus::Completed => counts.completed += 1,
                SubtaskStatus::LateDelivery => counts.late_delivery += 1,
            }
            counts
        })
}

/// Human-readable summary: "2/4 complete (1 late), 1 in progress, 1 pending"
pub fn summarize(subtasks: &[Subtask]) -> String {
    let c = status_counts(subtasks);
    let done = c.completed + c.late_delivery;
    let late = if c.late_delivery > 0 {
        format!(" ({} late)", c.late_delivery)
    } else {
        String::new()
    };
    format!(
        "{done}/{} complete{late}, {} in progress, {} pending",
        c.total(),
        c.in_progress,
        c.pending
    )
}

use crate::types::{AuditAction, Role, SubtaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The signed-in user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role,
        }
    }
}

// ---------------------------------------------------------------------------
// Member lists
// ---------------------------------------------------------------------------

/// Add `user_id` to a member list. Returns `false` if already present.
fn add_member(members: &mut Vec<String>, user_id: &str) -> bool {
    if members.iter().any(|m| m == user_id) {
        return false;
    }
    members.push(user_id.to_string());
    true
}

/// Remove `user_id` from a member list. Returns `false` if not present.
fn remove_member(members: &mut Vec<String>, user_id: &str) -> bool {
    let before = members.len();
    members.retain(|m| m != user_id);
    members.len() < before
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    pub creator_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    /// Percentage of tasks at 100%. Written only by the progress rollup.
    #[serde(default)]
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn add_member(&mut self, user_id: &str) -> bool {
        add_member(&mut self.members, user_id)
    }

    pub fn remove_member(&mut self, user_id: &str) -> bool {
        remove_member(&mut self.members, user_id)
    }

    /// Due dates may never move before the day the project was created.
    pub fn due_date_floor(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub members: Vec<String>,
    /// Percentage of complete subtasks. Written only by the progress rollup.
    #[serde(default)]
    pub progress: u8,
    /// Informational only; `progress` is authoritative.
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn add_member(&mut self, user_id: &str) -> bool {
        add_member(&mut self.members, user_id)
    }

    pub fn remove_member(&mut self, user_id: &str) -> bool {
        remove_member(&mut self.members, user_id)
    }

    /// The task's own due date, or the project's when the task has none.
    pub fn effective_due_date(&self, project: &Project) -> NaiveDate {
        self.due_date.unwrap_or(project.due_date)
    }

    pub fn is_fully_complete(&self) -> bool {
        self.progress == 100
    }
}

// ---------------------------------------------------------------------------
// Subtask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default)]
    pub id: String,
    pub task_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub status: SubtaskStatus,
    /// Mirrors `status.is_complete()`; kept on the record for cheap queries.
    #[serde(default)]
    pub completed: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subtask {
    /// A subtask is late once the whole due day has passed.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date
            .map(|due| now.date_naive() > due)
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// Immutable history record. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<String>,
    pub actor_id: String,
    pub actor_username: String,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Append order. Breaks ties between entries sharing a timestamp.
    #[serde(default)]
    pub sequence: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

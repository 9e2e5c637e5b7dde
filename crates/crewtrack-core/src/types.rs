use crate::error::CrewtrackError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SubtaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    InProgress,
    Completed,
    /// Completion reported after the subtask's due date.
    LateDelivery,
}

impl SubtaskStatus {
    pub fn all() -> &'static [SubtaskStatus] {
        &[
            SubtaskStatus::Pending,
            SubtaskStatus::InProgress,
            SubtaskStatus::Completed,
            SubtaskStatus::LateDelivery,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubtaskStatus::Pending => "pending",
            SubtaskStatus::InProgress => "in_progress",
            SubtaskStatus::Completed => "completed",
            SubtaskStatus::LateDelivery => "late_delivery",
        }
    }

    /// Both completion variants count toward task progress.
    pub fn is_complete(self) -> bool {
        matches!(self, SubtaskStatus::Completed | SubtaskStatus::LateDelivery)
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubtaskStatus {
    type Err = CrewtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubtaskStatus::Pending),
            "in_progress" | "in-progress" => Ok(SubtaskStatus::InProgress),
            "completed" => Ok(SubtaskStatus::Completed),
            "late_delivery" | "late-delivery" => Ok(SubtaskStatus::LateDelivery),
            _ => Err(CrewtrackError::Validation(format!(
                "unknown subtask status '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CrewtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Role::Manager),
            "member" => Ok(Role::Member),
            _ => Err(CrewtrackError::Validation(format!("unknown role '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    AssignMember,
    RemoveMember,
    StatusChange,
    CreateSubtask,
    DeleteSubtask,
    CreateTask,
    EditTask,
    DeleteTask,
    CreateProject,
    EditProject,
    DeleteProject,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::AssignMember => "ASSIGN_MEMBER",
            AuditAction::RemoveMember => "REMOVE_MEMBER",
            AuditAction::StatusChange => "STATUS_CHANGE",
            AuditAction::CreateSubtask => "CREATE_SUBTASK",
            AuditAction::DeleteSubtask => "DELETE_SUBTASK",
            AuditAction::CreateTask => "CREATE_TASK",
            AuditAction::EditTask => "EDIT_TASK",
            AuditAction::DeleteTask => "DELETE_TASK",
            AuditAction::CreateProject => "CREATE_PROJECT",
            AuditAction::EditProject => "EDIT_PROJECT",
            AuditAction::DeleteProject => "DELETE_PROJECT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "projects")]
    Projects,
    #[serde(rename = "tasks")]
    Tasks,
    #[serde(rename = "subtasks")]
    Subtasks,
    #[serde(rename = "auditLog")]
    AuditLog,
    #[serde(rename = "users")]
    Users,
}

impl Collection {
    pub fn all() -> &'static [Collection] {
        &[
            Collection::Projects,
            Collection::Tasks,
            Collection::Subtasks,
            Collection::AuditLog,
            Collection::Users,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Tasks => "tasks",
            Collection::Subtasks => "subtasks",
            Collection::AuditLog => "auditLog",
            Collection::Users => "users",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

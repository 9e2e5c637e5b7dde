//! Role-based authorization.
//!
//! Managers own structure: projects, tasks, membership, subtask creation and
//! deletion. Members only move subtasks through their lifecycle. The two sets
//! are disjoint for subtasks: a manager may not change a subtask's status and
//! a member may not delete one.
//!
//! Deleting a project or task, and purging history, additionally needs a
//! fresh credential check through [`IdentityService::reauthenticate`].

use crate::error::{PermissionDenied, Result};
use crate::identity::IdentityService;
use crate::model::Actor;
use crate::types::Role;
use std::fmt;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateProject,
    EditProject,
    DeleteProject,
    CreateTask,
    EditTask,
    DeleteTask,
    AssignMember,
    RemoveMember,
    CreateSubtask,
    DeleteSubtask,
    ChangeSubtaskStatus,
    ViewAssignedWork,
    ViewHistory,
    PurgeHistory,
}

const MANAGER_ONLY: &[Role] = &[Role::Manager];
const MEMBER_ONLY: &[Role] = &[Role::Member];
const ANYONE: &[Role] = &[Role::Manager, Role::Member];

impl Operation {
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Operation::ChangeSubtaskStatus => MEMBER_ONLY,
            Operation::ViewAssignedWork | Operation::ViewHistory => ANYONE,
            _ => MANAGER_ONLY,
        }
    }

    pub fn requires_reauthentication(self) -> bool {
        matches!(
            self,
            Operation::DeleteProject | Operation::DeleteTask | Operation::PurgeHistory
        )
    }

    /// Verb phrase used in denial messages.
    pub fn describe(self) -> &'static str {
        match self {
            Operation::CreateProject => "create projects",
            Operation::EditProject => "edit projects",
            Operation::DeleteProject => "delete projects",
            Operation::CreateTask => "create tasks",
            Operation::EditTask => "edit tasks",
            Operation::DeleteTask => "delete tasks",
            Operation::AssignMember => "assign members",
            Operation::RemoveMember => "remove members",
            Operation::CreateSubtask => "create subtasks",
            Operation::DeleteSubtask => "delete subtasks",
            Operation::ChangeSubtaskStatus => "change subtask status",
            Operation::ViewAssignedWork => "view assigned work",
            Operation::ViewHistory => "view history",
            Operation::PurgeHistory => "purge history",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// The entity an operation is aimed at. Only used for diagnostics; no rule
/// depends on which record is targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Project(&'a str),
    Task(&'a str),
    Subtask(&'a str),
    History,
    Workspace,
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Project(id) => write!(f, "project:{id}"),
            Target::Task(id) => write!(f, "task:{id}"),
            Target::Subtask(id) => write!(f, "subtask:{id}"),
            Target::History => f.write_str("history"),
            Target::Workspace => f.write_str("workspace"),
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

pub fn authorize(
    actor: &Actor,
    operation: Operation,
    target: Target<'_>,
) -> std::result::Result<(), PermissionDenied> {
    if operation.allowed_roles().contains(&actor.role) {
        return Ok(());
    }
    tracing::debug!(
        actor = %actor.username,
        role = %actor.role,
        %operation,
        %target,
        "operation refused by role"
    );
    Err(PermissionDenied::Role {
        role: actor.role,
        operation: operation.describe().to_string(),
    })
}

/// Role check followed by re-authentication. Nothing is touched when either
/// step fails.
pub async fn authorize_destructive<I>(
    identity: &I,
    actor: &Actor,
    operation: Operation,
    target: Target<'_>,
    credential: &str,
) -> Result<()>
where
    I: IdentityService + ?Sized,
{
    authorize(actor, operation, target)?;
    if operation.requires_reauthentication() {
        identity.reauthenticate(&actor.id, credential).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Actor {
        Actor::new("m1", "maria", Role::Manager)
    }

    fn member() -> Actor {
        Actor::new("u1", "ulrich", Role::Member)
    }

    #[test]
    fn manager_cannot_change_status() {
        let err = authorize(&manager(), Operation::ChangeSubtaskStatus, Target::Subtask("s1"))
            .unwrap_err();
        assert_eq!(
            err,
            PermissionDenied::Role {
                role: Role::Manager,
                operation: "change subtask status".to_string()
            }
        );
    }

    #[test]
    fn member_cannot_delete_subtask() {
        assert!(authorize(&member(), Operation::DeleteSubtask, Target::Subtask("s1")).is_err());
        assert!(authorize(&manager(), Operation::DeleteSubtask, Target::Subtask("s1")).is_ok());
    }

    #[test]
    fn member_limited_to_status_and_viewing() {
        let allowed: Vec<Operation> = [
            Operation::CreateProject,
            Operation::EditProject,
            Operation::DeleteProject,
            Operation::CreateTask,
            Operation::EditTask,
            Operation::DeleteTask,
            Operation::AssignMember,
            Operation::RemoveMember,
            Operation::CreateSubtask,
            Operation::DeleteSubtask,
            Operation::ChangeSubtaskStatus,
            Operation::ViewAssignedWork,
            Operation::ViewHistory,
            Operation::PurgeHistory,
        ]
        .into_iter()
        .filter(|op| authorize(&member(), *op, Target::Workspace).is_ok())
        .collect();
        assert_eq!(
            allowed,
            vec![
                Operation::ChangeSubtaskStatus,
                Operation::ViewAssignedWork,
                Operation::ViewHistory
            ]
        );
    }

    #[test]
    fn only_destructive_operations_reauthenticate() {
        assert!(Operation::DeleteProject.requires_reauthentication());
        assert!(Operation::DeleteTask.requires_reauthentication());
        assert!(Operation::PurgeHistory.requires_reauthentication());
        assert!(!Operation::DeleteSubtask.requires_reauthentication());
        assert!(!Operation::RemoveMember.requires_reauthentication());
    }

    #[test]
    fn target_display() {
        assert_eq!(Target::Task("t9").to_string(), "task:t9");
        assert_eq!(Target::History.to_string(), "history");
    }
}

//! Subtask status lifecycle.
//!
//! Any status may move to any other status; there is no forward-only order.
//! Three rules apply to every move:
//!
//! 1. The requested (and the resulting) status must differ from the current
//!    one.
//! 2. A non-blank comment explaining the change is mandatory.
//! 3. Asking for `Completed` after the subtask's due day has passed yields
//!    `LateDelivery` instead.
//!
//! [`transition`] is pure: it computes the updated subtask and leaves the
//! write, the audit entry and the rollups to [`crate::workspace`].

use crate::error::{CrewtrackError, Result};
use crate::gate::{self, Operation, Target};
use crate::model::{Actor, Subtask};
use crate::types::SubtaskStatus;
use chrono::{DateTime, Utc};

/// Outcome of a successful status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub subtask: Subtask,
    pub previous: SubtaskStatus,
    pub requested: SubtaskStatus,
    /// What was actually stored. Differs from `requested` only when a late
    /// completion was downgraded to `LateDelivery`.
    pub effective: SubtaskStatus,
    pub comment: String,
}

impl StatusChange {
    pub fn was_late(&self) -> bool {
        self.requested != self.effective
    }
}

/// The status that will actually be stored for `requested` at `now`.
pub fn effective_status(
    subtask: &Subtask,
    requested: SubtaskStatus,
    now: DateTime<Utc>,
) -> SubtaskStatus {
    if requested == SubtaskStatus::Completed && subtask.is_past_due(now) {
        SubtaskStatus::LateDelivery
    } else {
        requested
    }
}

pub fn transition(
    subtask: &Subtask,
    requested: SubtaskStatus,
    comment: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<StatusChange> {
    gate::authorize(actor, Operation::ChangeSubtaskStatus, Target::Subtask(&subtask.id))?;

    if requested == subtask.status {
        return Err(CrewtrackError::Validation(format!(
            "subtask is already {requested}"
        )));
    }
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(CrewtrackError::validation(
            "a comment is required to change status",
        ));
    }

    let effective = effective_status(subtask, requested, now);
    if effective == subtask.status {
        return Err(CrewtrackError::Validation(format!(
            "subtask is already {effective}"
        )));
    }
    let mut updated = subtask.clone();
    updated.status = effective;
    updated.completed = effective.is_complete();
    updated.updated_at = Some(now);

    Ok(StatusChange {
        subtask: updated,
        previous: subtask.status,
        requested,
        effective,
        comment: comment.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PermissionDenied;
    use crate::types::Role;
    use chrono::{NaiveDate, TimeZone};

    fn member() -> Actor {
        Actor::new("u1", "ulrich", Role::Member)
    }

    fn subtask(status: SubtaskStatus, due: Option<NaiveDate>) -> Subtask {
        Subtask {
            id: "s1".to_string(),
            task_id: "t1".to_string(),
            name: "Write copy".to_string(),
            due_date: due,
            status,
            completed: status.is_complete(),
            created_by: "m1".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn due(day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, 3, day)
    }

    #[test]
    fn pending_to_in_progress() {
        let change = transition(
            &subtask(SubtaskStatus::Pending, due(10)),
            SubtaskStatus::InProgress,
            "starting",
            &member(),
            at(5),
        )
        .unwrap();
        assert_eq!(change.previous, SubtaskStatus::Pending);
        assert_eq!(change.effective, SubtaskStatus::InProgress);
        assert!(!change.subtask.completed);
        assert_eq!(change.subtask.updated_at, Some(at(5)));
    }

    #[test]
    fn on_time_completion() {
        let change = transition(
            &subtask(SubtaskStatus::InProgress, due(10)),
            SubtaskStatus::Completed,
            "done",
            &member(),
            at(10),
        )
        .unwrap();
        assert_eq!(change.effective, SubtaskStatus::Completed);
        assert!(change.subtask.completed);
        assert!(!change.was_late());
    }

    #[test]
    fn late_completion_becomes_late_delivery() {
        let change = transition(
            &subtask(SubtaskStatus::Pending, due(10)),
            SubtaskStatus::Completed,
            "finally",
            &member(),
            at(11),
        )
        .unwrap();
        assert_eq!(change.requested, SubtaskStatus::Completed);
        assert_eq!(change.effective, SubtaskStatus::LateDelivery);
        assert_eq!(change.subtask.status, SubtaskStatus::LateDelivery);
        assert!(change.subtask.completed);
        assert!(change.was_late());
    }

    #[test]
    fn no_due_date_is_never_late() {
        let change = transition(
            &subtask(SubtaskStatus::Pending, None),
            SubtaskStatus::Completed,
            "done",
            &member(),
            at(28),
        )
        .unwrap();
        assert_eq!(change.effective, SubtaskStatus::Completed);
    }

    #[test]
    fn same_status_rejected_even_with_comment() {
        for status in SubtaskStatus::all() {
            let err = transition(&subtask(*status, due(10)), *status, "again", &member(), at(5))
                .unwrap_err();
            assert!(matches!(err, CrewtrackError::Validation(_)), "{status}");
        }
    }

    #[test]
    fn late_completion_of_late_delivery_is_a_no_op() {
        let err = transition(
            &subtask(SubtaskStatus::LateDelivery, due(10)),
            SubtaskStatus::Completed,
            "done again",
            &member(),
            at(12),
        )
        .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
    }

    #[test]
    fn blank_comment_rejected() {
        for comment in ["", "   "] {
            let err = transition(
                &subtask(SubtaskStatus::Pending, due(10)),
                SubtaskStatus::InProgress,
                comment,
                &member(),
                at(5),
            )
            .unwrap_err();
            assert!(matches!(err, CrewtrackError::Validation(_)));
        }
    }

    #[test]
    fn manager_cannot_transition() {
        let manager = Actor::new("m1", "maria", Role::Manager);
        let err = transition(
            &subtask(SubtaskStatus::Pending, due(10)),
            SubtaskStatus::InProgress,
            "go",
            &manager,
            at(5),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CrewtrackError::Permission(PermissionDenied::Role { .. })
        ));
    }

    #[test]
    fn reopening_a_completed_subtask_is_allowed() {
        let change = transition(
            &subtask(SubtaskStatus::Completed, due(10)),
            SubtaskStatus::InProgress,
            "found a bug",
            &member(),
            at(6),
        )
        .unwrap();
        assert_eq!(change.effective, SubtaskStatus::InProgress);
        assert!(!change.subtask.completed);
    }

    #[test]
    fn comment_is_trimmed() {
        let change = transition(
            &subtask(SubtaskStatus::Pending, None),
            SubtaskStatus::InProgress,
            "  on it \n",
            &member(),
            at(2),
        )
        .unwrap();
        assert_eq!(change.comment, "on it");
    }
}

//! Append-only history of state-changing actions.
//!
//! Entries are written once and never edited. There is no per-entry delete;
//! the only way to remove entries is the gated bulk purge in
//! [`crate::workspace::Workspace::purge_history`]. Entries outlive the
//! records they reference.

use crate::error::Result;
use crate::model::{Actor, AuditEntry};
use crate::store::{self, Filter, PersistenceService};
use crate::types::{AuditAction, Collection};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// AuditRefs / AuditDetails
// ---------------------------------------------------------------------------

/// Which records an entry is about. Any subset may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditRefs {
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub subtask_id: Option<String>,
}

impl AuditRefs {
    pub fn project(id: impl Into<String>) -> Self {
        Self {
            project_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_task(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    pub fn with_subtask(mut self, id: impl Into<String>) -> Self {
        self.subtask_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditDetails {
    pub previous_state: Option<String>,
    pub new_state: Option<String>,
    pub comment: Option<String>,
}

impl AuditDetails {
    pub fn change(previous: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            previous_state: Some(previous.into()),
            new_state: Some(new.into()),
            comment: None,
        }
    }

    pub fn created(new: impl Into<String>) -> Self {
        Self {
            new_state: Some(new.into()),
            ..Default::default()
        }
    }

    pub fn removed(previous: impl Into<String>) -> Self {
        Self {
            previous_state: Some(previous.into()),
            ..Default::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

// ---------------------------------------------------------------------------
// HistoryQuery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub subtask_id: Option<String>,
    pub actor_id: Option<String>,
    /// Keep only the newest `limit` entries.
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn filters(&self) -> Vec<Filter> {
        [
            ("project_id", &self.project_id),
            ("task_id", &self.task_id),
            ("subtask_id", &self.subtask_id),
            ("actor_id", &self.actor_id),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_ref().map(|v| Filter::eq(field, v.as_str())))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// AuditRecorder
// ---------------------------------------------------------------------------

pub struct AuditRecorder<S> {
    store: Arc<S>,
    // Held across read-max-then-insert so sequences stay unique.
    append: Mutex<()>,
}

impl<S: PersistenceService> AuditRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            append: Mutex::new(()),
        }
    }

    /// Append one entry. Never refuses on business grounds; the only failure
    /// is the store write itself.
    pub async fn record(
        &self,
        action: AuditAction,
        refs: AuditRefs,
        actor: &Actor,
        details: AuditDetails,
        at: DateTime<Utc>,
    ) -> Result<AuditEntry> {
        let _guard = self.append.lock().await;
        let existing: Vec<AuditEntry> =
            store::find_as(self.store.as_ref(), Collection::AuditLog, &[]).await?;
        let sequence = existing.iter().map(|e| e.sequence).max().map_or(1, |max| max + 1);

        let mut entry = AuditEntry {
            id: String::new(),
            project_id: refs.project_id,
            task_id: refs.task_id,
            subtask_id: refs.subtask_id,
            actor_id: actor.id.clone(),
            actor_username: actor.username.clone(),
            action,
            previous_state: details.previous_state,
            new_state: details.new_state,
            comment: details.comment,
            timestamp: at,
            sequence,
        };
        entry.id = store::insert(self.store.as_ref(), Collection::AuditLog, &entry).await?;
        Ok(entry)
    }

    /// Like [`record`](Self::record), but a failed write is logged and
    /// dropped so it never undoes or blocks the action being described.
    pub async fn record_best_effort(
        &self,
        action: AuditAction,
        refs: AuditRefs,
        actor: &Actor,
        details: AuditDetails,
        at: DateTime<Utc>,
    ) -> Option<AuditEntry> {
        match self.record(action, refs, actor, details, at).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(%action, actor = %actor.username, error = %e, "audit entry dropped");
                None
            }
        }
    }

    /// Matching entries, newest first.
    pub async fn history(&self, query: &HistoryQuery) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> =
            store::find_as(self.store.as_ref(), Collection::AuditLog, &query.filters()).await?;
        entries.sort_by_key(|e| Reverse((e.timestamp, e.sequence)));
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    pub(crate) async fn purge(&self) -> Result<usize> {
        self.store.purge(Collection::AuditLog).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

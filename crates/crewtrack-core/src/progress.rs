//! Completion rollups.
//!
//! Two tiers with deliberately different granularity:
//!
//! - task progress is the fraction of its subtasks that are complete
//!   (`Completed` and `LateDelivery` both count);
//! - project progress is the fraction of its tasks that sit at exactly 100%.
//!
//! Both round half up and are 0 for an empty collection. The `recompute_*`
//! functions always re-read children from the store and write the result back
//! to the parent; nothing is cached between calls.

use crate::error::Result;
use crate::model::{Subtask, Task};
use crate::store::{self, Filter, PersistenceService};
use crate::types::Collection;
use serde_json::json;

/// `round(100 * done / total)` with halves rounded up; 0 when `total` is 0.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    ((200 * done + total) / (2 * total)) as u8
}

pub fn task_progress(subtasks: &[Subtask]) -> u8 {
    let done = subtasks.iter().filter(|s| s.completed).count();
    percent(done, subtasks.len())
}

pub fn project_progress(tasks: &[Task]) -> u8 {
    let done = tasks.iter().filter(|t| t.is_fully_complete()).count();
    percent(done, tasks.len())
}

pub async fn recompute_task_progress<S>(store: &S, task_id: &str) -> Result<u8>
where
    S: PersistenceService + ?Sized,
{
    let subtasks: Vec<Subtask> =
        store::find_as(store, Collection::Subtasks, &[Filter::eq("task_id", task_id)]).await?;
    let progress = task_progress(&subtasks);
    store
        .update(
            Collection::Tasks,
            task_id,
            store::patch(json!({ "progress": progress, "completed": progress == 100 })),
        )
        .await?;
    tracing::debug!(task = %task_id, subtasks = subtasks.len(), progress, "task progress recomputed");
    Ok(progress)
}

pub async fn recompute_project_progress<S>(store: &S, project_id: &str) -> Result<u8>
where
    S: PersistenceService + ?Sized,
{
    let tasks: Vec<Task> =
        store::find_as(store, Collection::Tasks, &[Filter::eq("project_id", project_id)]).await?;
    let progress = project_progress(&tasks);
    store
        .update(
            Collection::Projects,
            project_id,
            store::patch(json!({ "progress": progress })),
        )
        .await?;
    tracing::debug!(project = %project_id, tasks = tasks.len(), progress, "project progress recomputed");
    Ok(progress)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

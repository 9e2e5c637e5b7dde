//! Compound user operations.
//!
//! Every public method is one user action: gate, mutate, record history,
//! recompute rollups, in that order, each step awaited before the next.
//! Reads are always fresh; nothing is cached between steps or calls.
//!
//! History writes are best-effort: a failed audit append is logged and the
//! action still succeeds. A failed primary write aborts the action.
//!
//! Deleting a project does not delete its tasks, deleting a task does not
//! delete its subtasks, and removing a project member does not unassign them
//! from that project's tasks.

use crate::audit::{AuditDetails, AuditRecorder, AuditRefs, HistoryQuery};
use crate::clock::{Clock, SystemClock};
use crate::error::{CrewtrackError, Result};
use crate::gate::{self, Operation, Target};
use crate::identity::IdentityService;
use crate::lifecycle::{self, StatusChange};
use crate::model::{Actor, AuditEntry, Project, Subtask, Task};
use crate::progress;
use crate::query;
use crate::schedule;
use crate::store::{self, Filter, PersistenceService};
use crate::types::{AuditAction, Collection, SubtaskStatus};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSubtask {
    pub name: String,
    pub due_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Rollups are `None` when the parent no longer exists.
#[derive(Debug, Clone)]
pub struct StatusOutcome {
    pub change: StatusChange,
    pub task_progress: Option<u8>,
    pub project_progress: Option<u8>,
    /// `None` when the history write failed.
    pub audit: Option<AuditEntry>,
}

/// Rollups are `None` when the parent no longer exists.
#[derive(Debug, Clone)]
pub struct SubtaskRemoval {
    pub subtask: Subtask,
    pub task_progress: Option<u8>,
    pub project_progress: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct TaskRemoval {
    pub task: Task,
    pub project_progress: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rollup {
    pub project_id: String,
    pub project_progress: u8,
    pub tasks: Vec<(String, u8)>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignedWork {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub subtasks: Vec<Subtask>,
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

pub struct Workspace<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
    audit: AuditRecorder<S>,
    clock: Arc<dyn Clock>,
}

impl<S, I> Workspace<S, I>
where
    S: PersistenceService,
    I: IdentityService,
{
    pub fn new(store: Arc<S>, identity: Arc<I>) -> Self {
        Self {
            audit: AuditRecorder::new(store.clone()),
            store,
            identity,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &AuditRecorder<S> {
        &self.audit
    }

    pub async fn current_actor(&self) -> Result<Actor> {
        self.identity.current_actor().await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn project(&self, id: &str) -> Result<Project> {
        store::load(self.store.as_ref(), Collection::Projects, id).await
    }

    pub async fn task(&self, id: &str) -> Result<Task> {
        store::load(self.store.as_ref(), Collection::Tasks, id).await
    }

    pub async fn subtask(&self, id: &str) -> Result<Subtask> {
        store::load(self.store.as_ref(), Collection::Subtasks, id).await
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> =
            store::find_as(self.store.as_ref(), Collection::Projects, &[]).await?;
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    pub async fn tasks_of(&self, project_id: &str) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = store::find_as(
            self.store.as_ref(),
            Collection::Tasks,
            &[Filter::eq("project_id", project_id)],
        )
        .await?;
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    pub async fn subtasks_of(&self, task_id: &str) -> Result<Vec<Subtask>> {
        let mut subtasks: Vec<Subtask> = store::find_as(
            self.store.as_ref(),
            Collection::Subtasks,
            &[Filter::eq("task_id", task_id)],
        )
        .await?;
        subtasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(subtasks)
    }

    pub async fn assigned_work(&self, actor: &Actor) -> Result<AssignedWork> {
        gate::authorize(actor, Operation::ViewAssignedWork, Target::Workspace)?;

        let all_projects = self.projects().await?;
        let projects: Vec<Project> = query::projects_of(&all_projects, &actor.id)
            .into_iter()
            .cloned()
            .collect();

        let mut tasks: Vec<Task> = Vec::new();
        for project in &projects {
            let project_tasks = self.tasks_of(&project.id).await?;
            if project.creator_id == actor.id {
                tasks.extend(project_tasks);
            } else {
                tasks.extend(query::tasks_assigned_to(&project_tasks, &actor.id).into_iter().cloned());
            }
        }

        let mut subtasks = Vec::new();
        for task in &tasks {
            subtasks.extend(self.subtasks_of(&task.id).await?);
        }

        Ok(AssignedWork {
            projects,
            tasks,
            subtasks,
        })
    }

    pub async fn history(&self, actor: &Actor, query: &HistoryQuery) -> Result<Vec<AuditEntry>> {
        gate::authorize(actor, Operation::ViewHistory, Target::History)?;
        self.audit.history(query).await
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub async fn create_project(&self, actor: &Actor, input: NewProject) -> Result<Project> {
        gate::authorize(actor, Operation::CreateProject, Target::Workspace)?;
        let name = require_name("project", &input.name)?;
        let now = self.clock.now();
        schedule::check_project_due(input.due_date, now.date_naive())?;

        let mut project = Project {
            id: String::new(),
            name,
            description: input.description.trim().to_string(),
            due_date: input.due_date,
            creator_id: actor.id.clone(),
            members: Vec::new(),
            progress: 0,
            created_at: now,
        };
        for user_id in &input.members {
            self.ensure_user(user_id).await?;
            project.add_member(user_id);
        }

        project.id = store::insert(self.store.as_ref(), Collection::Projects, &project).await?;
        tracing::info!(project = %project.id, name = %project.name, "project created");

        self.log(
            AuditAction::CreateProject,
            AuditRefs::project(&project.id),
            actor,
            AuditDetails::created(&project.name),
        )
        .await;
        Ok(project)
    }

    pub async fn edit_project(
        &self,
        actor: &Actor,
        project_id: &str,
        changes: ProjectChanges,
    ) -> Result<Project> {
        gate::authorize(actor, Operation::EditProject, Target::Project(project_id))?;
        let before = self.project(project_id).await?;
        let mut after = before.clone();

        if let Some(name) = &changes.name {
            after.name = require_name("project", name)?;
        }
        if let Some(description) = &changes.description {
            after.description = description.trim().to_string();
        }
        if let Some(due) = changes.due_date {
            schedule::check_project_due(due, before.due_date_floor())?;
            let tasks = self.tasks_of(project_id).await?;
            schedule::check_children_due(
                "project",
                due,
                tasks.iter().map(|t| (t.name.as_str(), t.due_date)),
            )?;
            // Subtasks of undated tasks are bounded by the project directly.
            for task in tasks.iter().filter(|t| t.due_date.is_none()) {
                let subtasks = self.subtasks_of(&task.id).await?;
                schedule::check_children_due(
                    "project",
                    due,
                    subtasks.iter().map(|s| (s.name.as_str(), s.due_date)),
                )?;
            }
            after.due_date = due;
        }

        self.store
            .update(
                Collection::Projects,
                project_id,
                store::patch(json!({
                    "name": after.name,
                    "description": after.description,
                    "due_date": after.due_date,
                })),
            )
            .await?;

        self.log(
            AuditAction::EditProject,
            AuditRefs::project(project_id),
            actor,
            AuditDetails::change(describe_project(&before), describe_project(&after)),
        )
        .await;
        Ok(after)
    }

    /// Requires the actor's password. Tasks and subtasks of the project are
    /// left in place.
    pub async fn delete_project(
        &self,
        actor: &Actor,
        project_id: &str,
        credential: &str,
    ) -> Result<Project> {
        gate::authorize_destructive(
            self.identity.as_ref(),
            actor,
            Operation::DeleteProject,
            Target::Project(project_id),
            credential,
        )
        .await?;
        let project = self.project(project_id).await?;
        self.store.delete(Collection::Projects, project_id).await?;
        tracing::info!(project = %project_id, actor = %actor.username, "project deleted");

        self.log(
            AuditAction::DeleteProject,
            AuditRefs::project(project_id),
            actor,
            AuditDetails::removed(&project.name),
        )
        .await;
        Ok(project)
    }

    pub async fn assign_project_member(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
    ) -> Result<Project> {
        gate::authorize(actor, Operation::AssignMember, Target::Project(project_id))?;
        let mut project = self.project(project_id).await?;
        self.ensure_user(user_id).await?;
        if !project.add_member(user_id) {
            return Err(CrewtrackError::Validation(format!(
                "user {user_id} is already a member of this project"
            )));
        }
        self.write_members(Collection::Projects, project_id, &project.members)
            .await?;

        self.log(
            AuditAction::AssignMember,
            AuditRefs::project(project_id),
            actor,
            AuditDetails::created(user_id),
        )
        .await;
        Ok(project)
    }

    /// The user keeps any task assignments inside the project.
    pub async fn remove_project_member(
        &self,
        actor: &Actor,
        project_id: &str,
        user_id: &str,
    ) -> Result<Project> {
        gate::authorize(actor, Operation::RemoveMember, Target::Project(project_id))?;
        let mut project = self.project(project_id).await?;
        if !project.remove_member(user_id) {
            return Err(CrewtrackError::Validation(format!(
                "user {user_id} is not a member of this project"
            )));
        }
        self.write_members(Collection::Projects, project_id, &project.members)
            .await?;

        self.log(
            AuditAction::RemoveMember,
            AuditRefs::project(project_id),
            actor,
            AuditDetails::removed(user_id),
        )
        .await;
        Ok(project)
    }

    /// Recompute every task of the project, then the project itself.
    pub async fn refresh_project(&self, project_id: &str) -> Result<Rollup> {
        // Fail early on an unknown project rather than after touching tasks.
        self.project(project_id).await?;
        let mut tasks = Vec::new();
        for task in self.tasks_of(project_id).await? {
            let pct = progress::recompute_task_progress(self.store.as_ref(), &task.id).await?;
            tasks.push((task.id, pct));
        }
        let project_progress =
            progress::recompute_project_progress(self.store.as_ref(), project_id).await?;
        Ok(Rollup {
            project_id: project_id.to_string(),
            project_progress,
            tasks,
        })
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    pub async fn create_task(&self, actor: &Actor, project_id: &str, input: NewTask) -> Result<Task> {
        gate::authorize(actor, Operation::CreateTask, Target::Project(project_id))?;
        let project = self.project(project_id).await?;
        let name = require_name("task", &input.name)?;
        schedule::check_task_due(input.due_date, &project)?;

        let mut task = Task {
            id: String::new(),
            project_id: project_id.to_string(),
            name,
            description: input.description.trim().to_string(),
            due_date: input.due_date,
            members: Vec::new(),
            progress: 0,
            completed: false,
            created_at: self.clock.now(),
        };
        for user_id in &input.members {
            require_project_member(&project, user_id)?;
            task.add_member(user_id);
        }

        task.id = store::insert(self.store.as_ref(), Collection::Tasks, &task).await?;
        tracing::info!(task = %task.id, project = %project_id, "task created");

        self.log(
            AuditAction::CreateTask,
            AuditRefs::project(project_id).with_task(&task.id),
            actor,
            AuditDetails::created(&task.name),
        )
        .await;
        progress::recompute_project_progress(self.store.as_ref(), project_id).await?;
        Ok(task)
    }

    pub async fn edit_task(&self, actor: &Actor, task_id: &str, changes: TaskChanges) -> Result<Task> {
        gate::authorize(actor, Operation::EditTask, Target::Task(task_id))?;
        let before = self.task(task_id).await?;
        let mut after = before.clone();

        if let Some(name) = &changes.name {
            after.name = require_name("task", name)?;
        }
        if let Some(description) = &changes.description {
            after.description = description.trim().to_string();
        }
        if let Some(due) = changes.due_date {
            let project = self.project(&before.project_id).await?;
            schedule::check_task_due(Some(due), &project)?;
            let subtasks = self.subtasks_of(task_id).await?;
            schedule::check_children_due(
                "task",
                due,
                subtasks.iter().map(|s| (s.name.as_str(), s.due_date)),
            )?;
            after.due_date = Some(due);
        }

        self.store
            .update(
                Collection::Tasks,
                task_id,
                store::patch(json!({
                    "name": after.name,
                    "description": after.description,
                    "due_date": after.due_date,
                })),
            )
            .await?;

        self.log(
            AuditAction::EditTask,
            AuditRefs::project(&before.project_id).with_task(task_id),
            actor,
            AuditDetails::change(describe_task(&before), describe_task(&after)),
        )
        .await;
        Ok(after)
    }

    /// Requires the actor's password. Subtasks of the task are left in place.
    pub async fn delete_task(&self, actor: &Actor, task_id: &str, credential: &str) -> Result<TaskRemoval> {
        gate::authorize_destructive(
            self.identity.as_ref(),
            actor,
            Operation::DeleteTask,
            Target::Task(task_id),
            credential,
        )
        .await?;
        let task = self.task(task_id).await?;
        self.store.delete(Collection::Tasks, task_id).await?;
        tracing::info!(task = %task_id, actor = %actor.username, "task deleted");

        self.log(
            AuditAction::DeleteTask,
            AuditRefs::project(&task.project_id).with_task(task_id),
            actor,
            AuditDetails::removed(&task.name),
        )
        .await;

        let project_progress = if self.exists(Collection::Projects, &task.project_id).await? {
            Some(progress::recompute_project_progress(self.store.as_ref(), &task.project_id).await?)
        } else {
            None
        };
        Ok(TaskRemoval {
            task,
            project_progress,
        })
    }

    pub async fn assign_task_member(&self, actor: &Actor, task_id: &str, user_id: &str) -> Result<Task> {
        gate::authorize(actor, Operation::AssignMember, Target::Task(task_id))?;
        let mut task = self.task(task_id).await?;
        let project = self.project(&task.project_id).await?;
        require_project_member(&project, user_id)?;
        if !task.add_member(user_id) {
            return Err(CrewtrackError::Validation(format!(
                "user {user_id} is already assigned to this task"
            )));
        }
        self.write_members(Collection::Tasks, task_id, &task.members)
            .await?;

        self.log(
            AuditAction::AssignMember,
            AuditRefs::project(&task.project_id).with_task(task_id),
            actor,
            AuditDetails::created(user_id),
        )
        .await;
        Ok(task)
    }

    pub async fn remove_task_member(&self, actor: &Actor, task_id: &str, user_id: &str) -> Result<Task> {
        gate::authorize(actor, Operation::RemoveMember, Target::Task(task_id))?;
        let mut task = self.task(task_id).await?;
        if !task.remove_member(user_id) {
            return Err(CrewtrackError::Validation(format!(
                "user {user_id} is not assigned to this task"
            )));
        }
        self.write_members(Collection::Tasks, task_id, &task.members)
            .await?;

        self.log(
            AuditAction::RemoveMember,
            AuditRefs::project(&task.project_id).with_task(task_id),
            actor,
            AuditDetails::removed(user_id),
        )
        .await;
        Ok(task)
    }

    // -----------------------------------------------------------------------
    // Subtasks
    // -----------------------------------------------------------------------

    pub async fn create_subtask(&self, actor: &Actor, task_id: &str, input: NewSubtask) -> Result<Subtask> {
        gate::authorize(actor, Operation::CreateSubtask, Target::Task(task_id))?;
        let task = self.task(task_id).await?;
        let project = self.project(&task.project_id).await?;
        let name = require_name("subtask", &input.name)?;
        schedule::check_subtask_due(input.due_date, &task, &project)?;

        let mut subtask = Subtask {
            id: String::new(),
            task_id: task_id.to_string(),
            name,
            due_date: input.due_date,
            status: SubtaskStatus::Pending,
            completed: false,
            created_by: actor.id.clone(),
            created_at: self.clock.now(),
            updated_at: None,
        };
        subtask.id = store::insert(self.store.as_ref(), Collection::Subtasks, &subtask).await?;
        tracing::info!(subtask = %subtask.id, task = %task_id, "subtask created");

        self.log(
            AuditAction::CreateSubtask,
            AuditRefs::project(&project.id)
                .with_task(task_id)
                .with_subtask(&subtask.id),
            actor,
            AuditDetails::created(&subtask.name),
        )
        .await;
        progress::recompute_task_progress(self.store.as_ref(), task_id).await?;
        progress::recompute_project_progress(self.store.as_ref(), &project.id).await?;
        Ok(subtask)
    }

    pub async fn delete_subtask(&self, actor: &Actor, subtask_id: &str) -> Result<SubtaskRemoval> {
        gate::authorize(actor, Operation::DeleteSubtask, Target::Subtask(subtask_id))?;
        let subtask = self.subtask(subtask_id).await?;
        let task = self.find_task(&subtask.task_id).await?;
        self.store.delete(Collection::Subtasks, subtask_id).await?;
        tracing::info!(subtask = %subtask_id, actor = %actor.username, "subtask deleted");

        let mut refs = AuditRefs::default().with_task(&subtask.task_id).with_subtask(subtask_id);
        refs.project_id = task.as_ref().map(|t| t.project_id.clone());
        self.log(
            AuditAction::DeleteSubtask,
            refs,
            actor,
            AuditDetails::removed(subtask.status.as_str()),
        )
        .await;

        let Some(task) = task else {
            return Ok(SubtaskRemoval {
                subtask,
                task_progress: None,
                project_progress: None,
            });
        };
        let task_progress = progress::recompute_task_progress(self.store.as_ref(), &task.id).await?;
        let project_progress = if self.exists(Collection::Projects, &task.project_id).await? {
            Some(progress::recompute_project_progress(self.store.as_ref(), &task.project_id).await?)
        } else {
            None
        };
        Ok(SubtaskRemoval {
            subtask,
            task_progress: Some(task_progress),
            project_progress,
        })
    }

    /// Move a subtask to `requested`, then roll the result up into its task
    /// and project.
    pub async fn change_subtask_status(
        &self,
        actor: &Actor,
        subtask_id: &str,
        requested: SubtaskStatus,
        comment: &str,
    ) -> Result<StatusOutcome> {
        let subtask = self.subtask(subtask_id).await?;
        let change = lifecycle::transition(&subtask, requested, comment, actor, self.clock.now())?;
        // Parents may be gone: deletes do not cascade.
        let task = self.find_task(&subtask.task_id).await?;
        let project_id = match &task {
            Some(task) if self.exists(Collection::Projects, &task.project_id).await? => {
                Some(task.project_id.clone())
            }
            _ => None,
        };

        self.store
            .update(
                Collection::Subtasks,
                subtask_id,
                store::patch(json!({
                    "status": change.effective,
                    "completed": change.subtask.completed,
                    "updated_at": change.subtask.updated_at,
                })),
            )
            .await?;
        if change.was_late() {
            tracing::info!(subtask = %subtask_id, "completion past due date recorded as late delivery");
        }

        let mut refs = AuditRefs::default().with_task(&subtask.task_id).with_subtask(subtask_id);
        refs.project_id = task.as_ref().map(|t| t.project_id.clone());
        let audit = self
            .log(
                AuditAction::StatusChange,
                refs,
                actor,
                AuditDetails::change(change.previous.as_str(), change.effective.as_str())
                    .with_comment(&change.comment),
            )
            .await;

        let task_progress = match &task {
            Some(task) => Some(progress::recompute_task_progress(self.store.as_ref(), &task.id).await?),
            None => None,
        };
        let project_progress = match &project_id {
            Some(id) => Some(progress::recompute_project_progress(self.store.as_ref(), id).await?),
            None => None,
        };

        Ok(StatusOutcome {
            change,
            task_progress,
            project_progress,
            audit,
        })
    }

    // -----------------------------------------------------------------------
    // History administration
    // -----------------------------------------------------------------------

    /// Remove every history entry. Manager only, with password.
    pub async fn purge_history(&self, actor: &Actor, credential: &str) -> Result<usize> {
        gate::authorize_destructive(
            self.identity.as_ref(),
            actor,
            Operation::PurgeHistory,
            Target::History,
            credential,
        )
        .await?;
        let removed = self.audit.purge().await?;
        tracing::warn!(actor = %actor.username, removed, "history purged");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn log(
        &self,
        action: AuditAction,
        refs: AuditRefs,
        actor: &Actor,
        details: AuditDetails,
    ) -> Option<AuditEntry> {
        self.audit
            .record_best_effort(action, refs, actor, details, self.clock.now())
            .await
    }

    async fn ensure_user(&self, user_id: &str) -> Result<()> {
        self.store.get(Collection::Users, user_id).await.map(|_| ())
    }

    async fn exists(&self, collection: Collection, id: &str) -> Result<bool> {
        match self.store.get(collection, id).await {
            Ok(_) => Ok(true),
            Err(CrewtrackError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_task(&self, id: &str) -> Result<Option<Task>> {
        match self.task(id).await {
            Ok(task) => Ok(Some(task)),
            Err(CrewtrackError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write_members(&self, collection: Collection, id: &str, members: &[String]) -> Result<()> {
        self.store
            .update(collection, id, store::patch(json!({ "members": members })))
            .await
    }
}

fn require_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CrewtrackError::Validation(format!("{kind} name must not be empty")));
    }
    Ok(name.to_string())
}

fn require_project_member(project: &Project, user_id: &str) -> Result<()> {
    if !project.has_member(user_id) {
        return Err(CrewtrackError::Validation(format!(
            "user {user_id} is not a member of project '{}'",
            project.name
        )));
    }
    Ok(())
}

fn describe_project(project: &Project) -> String {
    format!("{} (due {})", project.name, project.due_date)
}

fn describe_task(task: &Task) -> String {
    match task.due_date {
        Some(due) => format!("{} (due {due})", task.name),
        None => task.name.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::PermissionDenied;
    use crate::identity::LocalIdentity;
    use crate::store::{Document, MemoryStore};
    use crate::types::Role;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    type Ws = Workspace<MemoryStore, LocalIdentity<MemoryStore>>;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
    }

    fn clock(d: u32) -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 9, d, 10, 0, 0).unwrap())
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        manager: Actor,
        member: Actor,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let identity = LocalIdentity::new(store.clone(), 3);
            let manager = identity
                .register("maria", Role::Manager, "pw-maria")
                .await
                .unwrap()
                .actor();
            let member = identity
                .register("ulrich", Role::Member, "pw-ulrich")
                .await
                .unwrap()
                .actor();
            Self {
                store,
                manager,
                member,
            }
        }

        fn as_user(&self, username: &str, d: u32) -> Ws {
            let identity = LocalIdentity::new(self.store.clone(), 3)
                .with_clock(clock(d))
                .signed_in(username);
            Workspace::new(self.store.clone(), Arc::new(identity)).with_clock(clock(d))
        }

        async fn project_with_task(&self) -> (Ws, Project, Task) {
            let ws = self.as_user("maria", 1);
            let project = ws
                .create_project(
                    &self.manager,
                    NewProject {
                        name: "Launch".to_string(),
                        due_date: day(30),
                        members: vec![self.member.id.clone()],
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            let task = ws
                .create_task(
                    &self.manager,
                    &project.id,
                    NewTask {
                        name: "Site".to_string(),
                        due_date: Some(day(20)),
                        members: vec![self.member.id.clone()],
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            (ws, project, task)
        }
    }

    #[tokio::test]
    async fn create_project_rejects_past_due_date() {
        let fx = Fixture::new().await;
        let ws = fx.as_user("maria", 10);
        let err = ws
            .create_project(
                &fx.manager,
                NewProject {
                    name: "Late".to_string(),
                    due_date: day(9),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
    }

    #[tokio::test]
    async fn create_project_requires_manager() {
        let fx = Fixture::new().await;
        let ws = fx.as_user("ulrich", 1);
        let err = ws
            .create_project(
                &fx.member,
                NewProject {
                    name: "Mine".to_string(),
                    due_date: day(30),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Permission(PermissionDenied::Role { .. })));
    }

    #[tokio::test]
    async fn task_due_date_cannot_exceed_project() {
        let fx = Fixture::new().await;
        let (ws, project, _) = fx.project_with_task().await;
        let err = ws
            .create_task(
                &fx.manager,
                &project.id,
                NewTask {
                    name: "Too late".to_string(),
                    due_date: Some(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
    }

    #[tokio::test]
    async fn subtask_due_date_bounded_by_task() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        let err = ws
            .create_subtask(
                &fx.manager,
                &task.id,
                NewSubtask {
                    name: "Copy".to_string(),
                    due_date: Some(day(21)),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
    }

    #[tokio::test]
    async fn task_member_must_belong_to_project() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        let err = ws
            .assign_task_member(&fx.manager, &task.id, &fx.manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_project_member_rejected() {
        let fx = Fixture::new().await;
        let (ws, project, _) = fx.project_with_task().await;
        let err = ws
            .assign_project_member(&fx.manager, &project.id, &fx.member.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
    }

    #[tokio::test]
    async fn assigning_unknown_user_is_not_found() {
        let fx = Fixture::new().await;
        let (ws, project, _) = fx.project_with_task().await;
        let err = ws
            .assign_project_member(&fx.manager, &project.id, "ghost")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CrewtrackError::NotFound {
                collection: Collection::Users,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn removing_project_member_keeps_task_assignment() {
        let fx = Fixture::new().await;
        let (ws, project, task) = fx.project_with_task().await;
        let project = ws
            .remove_project_member(&fx.manager, &project.id, &fx.member.id)
            .await
            .unwrap();
        assert!(!project.has_member(&fx.member.id));

        let task = ws.task(&task.id).await.unwrap();
        assert!(task.has_member(&fx.member.id));
    }

    #[tokio::test]
    async fn edit_project_logs_before_and_after() {
        let fx = Fixture::new().await;
        let (_, project, _) = fx.project_with_task().await;
        let ws = fx.as_user("maria", 2);
        let edited = ws
            .edit_project(
                &fx.manager,
                &project.id,
                ProjectChanges {
                    name: Some("Relaunch".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.name, "Relaunch");
        assert_eq!(ws.project(&project.id).await.unwrap().name, "Relaunch");

        let entries = ws
            .history(
                &fx.manager,
                &HistoryQuery {
                    project_id: Some(project.id.clone()),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(entries[0].action, AuditAction::EditProject);
        assert_eq!(entries[0].new_state.as_deref(), Some("Relaunch (due 2026-09-30)"));
    }

    #[tokio::test]
    async fn edit_task_keeps_due_date_within_project() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        let err = ws
            .edit_task(
                &fx.manager,
                &task.id,
                TaskChanges {
                    due_date: Some(NaiveDate::from_ymd_opt(2026, 10, 2).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));

        let edited = ws
            .edit_task(
                &fx.manager,
                &task.id,
                TaskChanges {
                    name: Some("  Homepage ".to_string()),
                    due_date: Some(day(25)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.name, "Homepage");
        let stored = ws.task(&task.id).await.unwrap();
        assert_eq!(stored.due_date, Some(day(25)));
    }

    #[tokio::test]
    async fn removing_task_member_twice_is_rejected() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        let task = ws
            .remove_task_member(&fx.manager, &task.id, &fx.member.id)
            .await
            .unwrap();
        assert!(!task.has_member(&fx.member.id));

        let err = ws
            .remove_task_member(&fx.manager, &task.id, &fx.member.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
    }

    #[tokio::test]
    async fn refresh_project_repairs_stale_progress() {
        let fx = Fixture::new().await;
        let (ws, project, task) = fx.project_with_task().await;
        fx.store
            .update(Collection::Tasks, &task.id, store::patch(json!({ "progress": 100 })))
            .await
            .unwrap();
        fx.store
            .update(Collection::Projects, &project.id, store::patch(json!({ "progress": 100 })))
            .await
            .unwrap();

        let rollup = ws.refresh_project(&project.id).await.unwrap();
        assert_eq!(rollup.tasks, vec![(task.id.clone(), 0)]);
        assert_eq!(rollup.project_progress, 0);
        assert_eq!(ws.task(&task.id).await.unwrap().progress, 0);
        assert_eq!(ws.project(&project.id).await.unwrap().progress, 0);

        assert!(matches!(
            ws.refresh_project("missing").await,
            Err(CrewtrackError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_task_with_wrong_password_leaves_it_intact() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        let err = ws.delete_task(&fx.manager, &task.id, "wrong").await.unwrap_err();
        assert_eq!(err.permission_reason(), Some(&PermissionDenied::WrongCredential));
        assert_eq!(ws.task(&task.id).await.unwrap(), task);

        let removal = ws.delete_task(&fx.manager, &task.id, "pw-maria").await.unwrap();
        assert_eq!(removal.task.id, task.id);
        assert_eq!(removal.project_progress, Some(0));
    }

    #[tokio::test]
    async fn delete_project_leaves_tasks_behind() {
        let fx = Fixture::new().await;
        let (ws, project, task) = fx.project_with_task().await;
        ws.delete_project(&fx.manager, &project.id, "pw-maria")
            .await
            .unwrap();
        assert!(matches!(
            ws.project(&project.id).await,
            Err(CrewtrackError::NotFound { .. })
        ));
        assert!(ws.task(&task.id).await.is_ok());
    }

    #[tokio::test]
    async fn delete_subtask_is_manager_only_and_rolls_up() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        let sub = ws
            .create_subtask(
                &fx.manager,
                &task.id,
                NewSubtask {
                    name: "Copy".to_string(),
                    due_date: None,
                },
            )
            .await
            .unwrap();

        let member_ws = fx.as_user("ulrich", 2);
        let err = member_ws.delete_subtask(&fx.member, &sub.id).await.unwrap_err();
        assert!(matches!(err, CrewtrackError::Permission(_)));

        let removal = ws.delete_subtask(&fx.manager, &sub.id).await.unwrap();
        assert_eq!(removal.task_progress, Some(0));
        assert_eq!(removal.project_progress, Some(0));
    }

    #[tokio::test]
    async fn member_sees_only_assigned_tasks() {
        let fx = Fixture::new().await;
        let (ws, project, task) = fx.project_with_task().await;
        ws.create_task(
            &fx.manager,
            &project.id,
            NewTask {
                name: "Unassigned".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let work = ws.assigned_work(&fx.member).await.unwrap();
        assert_eq!(work.projects.len(), 1);
        assert_eq!(work.tasks.len(), 1);
        assert_eq!(work.tasks[0].id, task.id);

        let manager_work = ws.assigned_work(&fx.manager).await.unwrap();
        assert_eq!(manager_work.tasks.len(), 2);
    }

    #[tokio::test]
    async fn purge_history_needs_manager_and_password() {
        let fx = Fixture::new().await;
        let (ws, _, _) = fx.project_with_task().await;

        let member_ws = fx.as_user("ulrich", 2);
        assert!(member_ws.purge_history(&fx.member, "pw-ulrich").await.is_err());
        assert!(ws.purge_history(&fx.manager, "nope").await.is_err());

        let removed = ws.purge_history(&fx.manager, "pw-maria").await.unwrap();
        assert_eq!(removed, 2);
        assert!(ws
            .history(&fx.manager, &HistoryQuery::default())
            .await
            .unwrap()
            .is_empty());
    }

    /// Store wrapper whose audit-log writes always fail.
    #[tokio::test]
    async fn project_due_date_cannot_move_before_its_tasks() {
        let fx = Fixture::new().await;
        let (ws, project, _) = fx.project_with_task().await;
        let undated = ws
            .create_task(
                &fx.manager,
                &project.id,
                NewTask {
                    name: "Ops".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        ws.create_subtask(
            &fx.manager,
            &undated.id,
            NewSubtask {
                name: "Monitoring".to_string(),
                due_date: Some(day(25)),
            },
        )
        .await
        .unwrap();

        let move_to = |d| ProjectChanges {
            due_date: Some(day(d)),
            ..Default::default()
        };
        // "Site" is due on the 20th.
        let err = ws
            .edit_project(&fx.manager, &project.id, move_to(19))
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
        // "Monitoring" inherits the project date through its undated task.
        let err = ws
            .edit_project(&fx.manager, &project.id, move_to(24))
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
        assert_eq!(ws.project(&project.id).await.unwrap().due_date, day(30));

        let edited = ws
            .edit_project(&fx.manager, &project.id, move_to(25))
            .await
            .unwrap();
        assert_eq!(edited.due_date, day(25));
    }

    #[tokio::test]
    async fn task_due_date_cannot_move_before_its_subtasks() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        ws.create_subtask(
            &fx.manager,
            &task.id,
            NewSubtask {
                name: "Copy".to_string(),
                due_date: Some(day(15)),
            },
        )
        .await
        .unwrap();

        let move_to = |d| TaskChanges {
            due_date: Some(day(d)),
            ..Default::default()
        };
        let err = ws.edit_task(&fx.manager, &task.id, move_to(14)).await.unwrap_err();
        assert!(matches!(err, CrewtrackError::Validation(_)));
        assert_eq!(ws.task(&task.id).await.unwrap().due_date, Some(day(20)));

        let edited = ws.edit_task(&fx.manager, &task.id, move_to(15)).await.unwrap();
        assert_eq!(edited.due_date, Some(day(15)));
    }

    #[tokio::test]
    async fn status_change_survives_deleted_project() {
        let fx = Fixture::new().await;
        let (ws, project, task) = fx.project_with_task().await;
        let sub = ws
            .create_subtask(
                &fx.manager,
                &task.id,
                NewSubtask {
                    name: "Copy".to_string(),
                    due_date: None,
                },
            )
            .await
            .unwrap();
        ws.delete_project(&fx.manager, &project.id, "pw-maria")
            .await
            .unwrap();

        let member_ws = fx.as_user("ulrich", 2);
        let outcome = member_ws
            .change_subtask_status(&fx.member, &sub.id, SubtaskStatus::Completed, "done anyway")
            .await
            .unwrap();
        assert_eq!(outcome.change.effective, SubtaskStatus::Completed);
        assert_eq!(outcome.task_progress, Some(100));
        assert_eq!(outcome.project_progress, None);
        assert!(outcome.audit.is_some());
    }

    #[tokio::test]
    async fn manager_cannot_change_status() {
        let fx = Fixture::new().await;
        let (ws, _, task) = fx.project_with_task().await;
        let sub = ws
            .create_subtask(
                &fx.manager,
                &task.id,
                NewSubtask {
                    name: "Copy".to_string(),
                    due_date: None,
                },
            )
            .await
            .unwrap();
        let err = ws
            .change_subtask_status(&fx.manager, &sub.id, SubtaskStatus::InProgress, "go")
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Permission(PermissionDenied::Role { .. })));
        assert_eq!(ws.subtask(&sub.id).await.unwrap().status, SubtaskStatus::Pending);
    }

    #[tokio::test]
    async fn reauth_lock_lifts_after_cooldown() {
        let fx = Fixture::new().await;
        let (_, project, _) = fx.project_with_task().await;
        let ws = fx.as_user("maria", 2);
        for _ in 0..3 {
            let err = ws
                .delete_project(&fx.manager, &project.id, "wrong")
                .await
                .unwrap_err();
            assert!(matches!(err, CrewtrackError::Permission(PermissionDenied::WrongCredential)));
        }
        let err = ws
            .delete_project(&fx.manager, &project.id, "pw-maria")
            .await
            .unwrap_err();
        assert!(matches!(err, CrewtrackError::Permission(PermissionDenied::TooManyAttempts)));
        assert!(ws.project(&project.id).await.is_ok());

        // A day later the lock has lapsed.
        fx.as_user("maria", 3)
            .delete_project(&fx.manager, &project.id, "pw-maria")
            .await
            .unwrap();
        assert!(ws.project(&project.id).await.is_err());
    }

    struct BrokenAuditLog(MemoryStore);

    #[async_trait]
    impl PersistenceService for BrokenAuditLog {
        async fn find(&self, c: Collection, f: &[Filter]) -> Result<Vec<Document>> {
            self.0.find(c, f).await
        }
        async fn get(&self, c: Collection, id: &str) -> Result<Document> {
            self.0.get(c, id).await
        }
        async fn create(&self, c: Collection, record: Document) -> Result<String> {
            if c == Collection::AuditLog {
                return Err(CrewtrackError::persistence("disk full"));
            }
            self.0.create(c, record).await
        }
        async fn update(&self, c: Collection, id: &str, fields: Document) -> Result<()> {
            self.0.update(c, id, fields).await
        }
        async fn delete(&self, c: Collection, id: &str) -> Result<()> {
            self.0.delete(c, id).await
        }
        async fn purge(&self, c: Collection) -> Result<usize> {
            self.0.purge(c).await
        }
    }

    #[tokio::test]
    async fn audit_failure_does_not_block_status_change() {
        let store = Arc::new(BrokenAuditLog(MemoryStore::new()));
        let identity = LocalIdentity::new(store.clone(), 3);
        let manager = identity
            .register("maria", Role::Manager, "pw")
            .await
            .unwrap()
            .actor();
        let member = identity
            .register("ulrich", Role::Member, "pw")
            .await
            .unwrap()
            .actor();
        let ws = Workspace::new(store.clone(), Arc::new(identity)).with_clock(clock(1));

        let project = ws
            .create_project(
                &manager,
                NewProject {
                    name: "P".to_string(),
                    due_date: day(30),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let task = ws
            .create_task(
                &manager,
                &project.id,
                NewTask {
                    name: "T".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let sub = ws
            .create_subtask(
                &manager,
                &task.id,
                NewSubtask {
                    name: "S".to_string(),
                    due_date: None,
                },
            )
            .await
            .unwrap();

        let outcome = ws
            .change_subtask_status(&member, &sub.id, SubtaskStatus::Completed, "done")
            .await
            .unwrap();
        assert!(outcome.audit.is_none());
        assert_eq!(outcome.task_progress, Some(100));
        assert_eq!(outcome.project_progress, Some(100));
        assert_eq!(
            ws.subtask(&sub.id).await.unwrap().status,
            SubtaskStatus::Completed
        );
    }
}

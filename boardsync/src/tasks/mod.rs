//! Task board store: optimistic CRUD, filtering, and reconciliation of
//! the push feed.
//!
//! All mutations apply to the local list before the persistence service
//! confirms them. A create inserts an entry under a local placeholder
//! id and swaps it for the confirmed record in place; a failed create
//! removes only that placeholder. Update and delete apply immediately
//! and roll back to a pre-mutation snapshot on failure. The reconcile
//! loop folds push events into the same list,
//! deduplicating echoes of this client's own writes and dropping events
//! staler than what the list already holds.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use boardsync_types::ValidationError;
use boardsync_types::event::ChangeEvent;
use boardsync_types::filter::TaskFilters;
use boardsync_types::id::EntityId;
use boardsync_types::task::{CreateTaskRequest, Task, TaskWithAssignee, UpdateTaskRequest};
use boardsync_types::user::User;

use crate::backend::{Backend, BackendError};
use crate::config::ClientConfig;
use crate::realtime::{PushChannel, SubscribeError, SubscriptionGuard};
use crate::report::{ErrorKind, ErrorReporter};
use crate::store::{EntityStore, InsertPosition};
use crate::tracker::OpTracker;

/// Errors returned by store mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request payload failed validation locally.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The persistence service rejected or never received the request.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    /// The display category for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Backend(BackendError::Validation(_)) => {
                ErrorKind::Validation
            }
            Self::Backend(BackendError::NotFound) => ErrorKind::NotFound,
            Self::Backend(BackendError::Transport(_) | BackendError::Closed) => {
                ErrorKind::Transport
            }
        }
    }
}

/// Whether an update drives the per-task activity markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Mark the task as updating while in flight and recently updated
    /// once confirmed.
    Tracked,
    /// Touch no markers; for background writes the UI should not
    /// highlight.
    Silent,
}

struct TaskState {
    tasks: EntityStore<TaskWithAssignee>,
    users: Vec<User>,
    filters: TaskFilters,
    tracker: OpTracker,
}

/// The task board's client-side store.
///
/// Generic over the persistence service and the push channel so tests
/// can drive both in process.
pub struct TaskStore<B, C> {
    backend: Arc<B>,
    channel: Arc<C>,
    state: Mutex<TaskState>,
    reporter: Arc<ErrorReporter>,
    config: ClientConfig,
}

impl<B: Backend + 'static, C: PushChannel + 'static> TaskStore<B, C> {
    /// Creates an empty store over the given service and push channel.
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        channel: Arc<C>,
        reporter: Arc<ErrorReporter>,
        config: ClientConfig,
    ) -> Self {
        let tracker = OpTracker::new(config.recently_updated_ttl);
        Self {
            backend,
            channel,
            state: Mutex::new(TaskState {
                tasks: EntityStore::new(InsertPosition::Front),
                users: Vec::new(),
                filters: TaskFilters::default(),
                tracker,
            }),
            reporter,
            config,
        }
    }

    // --- loading ---

    /// Replaces the task list with the server's current state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the fetch fails; the current
    /// list is left untouched.
    pub async fn fetch_all(&self) -> Result<(), StoreError> {
        let tasks = match self.backend.fetch_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                self.reporter
                    .report(ErrorKind::Transport, format!("failed to load tasks: {e}"));
                return Err(e.into());
            }
        };
        self.state.lock().await.tasks.set_all(tasks);
        Ok(())
    }

    /// Refreshes the cached team member list used to resolve assignees.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the fetch fails.
    pub async fn fetch_users(&self) -> Result<(), StoreError> {
        let users = match self.backend.fetch_users().await {
            Ok(users) => users,
            Err(e) => {
                self.reporter
                    .report(ErrorKind::Transport, format!("failed to load users: {e}"));
                return Err(e.into());
            }
        };
        self.state.lock().await.users = users;
        Ok(())
    }

    // --- reads ---

    /// The full task list in display order, ignoring filters.
    pub async fn tasks(&self) -> Vec<TaskWithAssignee> {
        self.state.lock().await.tasks.snapshot()
    }

    /// The task list with the active filters applied.
    pub async fn filtered_tasks(&self) -> Vec<TaskWithAssignee> {
        let state = self.state.lock().await;
        state
            .tasks
            .list()
            .iter()
            .filter(|t| state.filters.matches(t))
            .cloned()
            .collect()
    }

    /// The cached team member list.
    pub async fn users(&self) -> Vec<User> {
        self.state.lock().await.users.clone()
    }

    /// Looks up a task by id in the local list.
    pub async fn get_by_id(&self, id: EntityId) -> Option<TaskWithAssignee> {
        self.state.lock().await.tasks.get(id).cloned()
    }

    /// Replaces the active filter set.
    pub async fn set_filters(&self, filters: TaskFilters) {
        self.state.lock().await.filters = filters;
    }

    /// The active filter set.
    pub async fn filters(&self) -> TaskFilters {
        self.state.lock().await.filters.clone()
    }

    /// True while an update for this task awaits confirmation.
    pub async fn is_updating(&self, id: EntityId) -> bool {
        self.state.lock().await.tracker.is_updating(id)
    }

    /// True while a delete for this task awaits confirmation.
    pub async fn is_deleting(&self, id: EntityId) -> bool {
        self.state.lock().await.tracker.is_deleting(id)
    }

    /// True shortly after a confirmed or remote update to this task.
    pub async fn is_recently_updated(&self, id: EntityId) -> bool {
        self.state.lock().await.tracker.is_recently_updated(id)
    }

    // --- mutations ---

    /// Creates a task optimistically.
    ///
    /// The entry appears at the front of the list immediately under a
    /// local placeholder id and is replaced in place by the confirmed
    /// record. Returns the server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if validation or the service call fails;
    /// on a service failure the optimistic entry is removed again.
    pub async fn create(&self, req: CreateTaskRequest) -> Result<EntityId, StoreError> {
        if let Err(e) = req.validate() {
            self.reporter.report(ErrorKind::Validation, e.to_string());
            return Err(e.into());
        }

        let local_id = EntityId::next_local();
        let now = Utc::now();
        {
            let mut state = self.state.lock().await;
            let optimistic = TaskWithAssignee {
                task: Task {
                    id: local_id,
                    title: req.title.clone(),
                    description: req.description.clone().unwrap_or_default(),
                    status: req.status,
                    assignee_id: req.assignee_id,
                    created_at: now,
                    updated_at: now,
                },
                assignee: resolve_assignee(&state.users, req.assignee_id),
            };
            state.tasks.insert(optimistic);
        }
        debug!(id = %local_id, "optimistic task inserted");

        match self.backend.create_task(req).await {
            Ok(confirmed) => {
                let server_id = confirmed.id;
                let mut state = self.state.lock().await;
                let assignee = resolve_assignee(&state.users, confirmed.assignee_id);
                state.tasks.replace_local_with_server(
                    local_id,
                    TaskWithAssignee {
                        task: confirmed,
                        assignee,
                    },
                );
                state.tracker.rekey(local_id, server_id);
                debug!(id = %server_id, "task create confirmed");
                Ok(server_id)
            }
            Err(e) => {
                // Remove only the placeholder; rows the reconcile loop
                // folded in while the create was in flight must survive.
                self.state.lock().await.tasks.remove(local_id);
                self.reporter
                    .report(ErrorKind::Transport, format!("failed to create task: {e}"));
                warn!(id = %local_id, error = %e, "task create rolled back");
                Err(e.into())
            }
        }
    }

    /// Updates a task optimistically.
    ///
    /// The provided fields apply to the local entry immediately; the
    /// confirmed row replaces it once the service responds. In
    /// [`UpdateMode::Tracked`] the task is marked updating while in
    /// flight and recently updated on confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if validation fails, the id is a local
    /// placeholder, or the service call fails; on a service failure the
    /// local entry is rolled back.
    pub async fn update(
        &self,
        id: EntityId,
        req: UpdateTaskRequest,
        mode: UpdateMode,
    ) -> Result<(), StoreError> {
        if let Err(e) = req.validate() {
            self.reporter.report(ErrorKind::Validation, e.to_string());
            return Err(e.into());
        }
        let Some(raw) = id.as_server() else {
            // Still a placeholder; the create has not confirmed yet.
            self.reporter
                .report(ErrorKind::NotFound, "task is not confirmed yet");
            return Err(BackendError::NotFound.into());
        };

        let snapshot = {
            let mut state = self.state.lock().await;
            let snapshot = state.tasks.snapshot();
            if mode == UpdateMode::Tracked {
                state.tracker.begin_update(id);
            }
            let users = state.users.clone();
            state.tasks.update_with(id, |entry| {
                req.apply_to(&mut entry.task);
                entry.task.updated_at = Utc::now();
                entry.assignee = resolve_assignee(&users, entry.task.assignee_id);
            });
            snapshot
        };

        match self.backend.update_task(raw, req).await {
            Ok(confirmed) => {
                let mut state = self.state.lock().await;
                let assignee = resolve_assignee(&state.users, confirmed.assignee_id);
                // update_with, not upsert: if a delete event removed the
                // row mid-flight, confirming must not resurrect it.
                state.tasks.update_with(id, |entry| {
                    entry.task = confirmed;
                    entry.assignee = assignee;
                });
                if mode == UpdateMode::Tracked {
                    state.tracker.end_update(id);
                    state.tracker.mark_recently_updated(id);
                }
                debug!(id = %id, "task update confirmed");
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                state.tasks.restore(snapshot);
                if mode == UpdateMode::Tracked {
                    state.tracker.end_update(id);
                }
                drop(state);
                self.reporter
                    .report(error_kind_for(&e), format!("failed to update task: {e}"));
                warn!(id = %id, error = %e, "task update rolled back");
                Err(e.into())
            }
        }
    }

    /// Deletes a task optimistically.
    ///
    /// The entry disappears from the list immediately and is restored
    /// if the service call fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the id is a local placeholder or the
    /// service call fails.
    pub async fn delete(&self, id: EntityId) -> Result<(), StoreError> {
        let Some(raw) = id.as_server() else {
            self.reporter
                .report(ErrorKind::NotFound, "task is not confirmed yet");
            return Err(BackendError::NotFound.into());
        };

        let snapshot = {
            let mut state = self.state.lock().await;
            let snapshot = state.tasks.snapshot();
            state.tracker.begin_delete(id);
            state.tasks.remove(id);
            snapshot
        };

        match self.backend.delete_task(raw).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.tracker.forget(id);
                debug!(id = %id, "task delete confirmed");
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                state.tasks.restore(snapshot);
                state.tracker.end_delete(id);
                drop(state);
                self.reporter
                    .report(error_kind_for(&e), format!("failed to delete task: {e}"));
                warn!(id = %id, error = %e, "task delete rolled back");
                Err(e.into())
            }
        }
    }

    // --- reconciliation ---

    /// Starts the reconcile loop over the push channel's task feed.
    ///
    /// Dropping the returned guard unsubscribes immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError`] if the channel rejects the
    /// subscription.
    pub async fn subscribe(self: &Arc<Self>) -> Result<SubscriptionGuard, SubscribeError> {
        let mut sub = match self.channel.subscribe_tasks(self.config.event_buffer).await {
            Ok(sub) => sub,
            Err(e) => {
                self.reporter.report(
                    ErrorKind::Subscription,
                    format!("task subscription failed: {e}"),
                );
                return Err(e);
            }
        };

        let store = Arc::clone(self);
        let join = tokio::spawn(async move {
            while let Some(event) = sub.next().await {
                store.reconcile(event).await;
            }
            warn!(table = %sub.table(), "push feed closed");
        });
        Ok(SubscriptionGuard::new(join))
    }

    async fn reconcile(&self, event: ChangeEvent<Task>) {
        match event {
            ChangeEvent::Insert { new } => self.reconcile_insert(new).await,
            ChangeEvent::Update { new } => self.reconcile_update(new).await,
            ChangeEvent::Delete { old_id } => {
                let mut state = self.state.lock().await;
                if state.tasks.remove(old_id).is_some() {
                    debug!(id = %old_id, "task removed by push event");
                }
                // The in-flight sets belong to the mutation layer; the
                // mutation that set an entry clears it when it settles.
                state.tracker.clear_recently_updated(old_id);
            }
        }
    }

    /// Insert events carry the raw row without the assignee joined, so
    /// the full record is refetched. The list is checked before and
    /// after the refetch: the row may be this client's own write (the
    /// echo case) or may have landed while the refetch was in flight.
    async fn reconcile_insert(&self, new: Task) {
        let id = new.id;
        if self.state.lock().await.tasks.contains(id) {
            debug!(id = %id, "insert event deduplicated");
            return;
        }
        let Some(raw) = id.as_server() else {
            return;
        };

        let joined = match self.backend.get_task(raw).await {
            Ok(joined) => joined,
            Err(e) => {
                // Row vanished or service hiccuped; the event is dropped
                // and a later event or refetch will carry the row.
                warn!(id = %id, error = %e, "failed to fetch inserted task");
                return;
            }
        };

        let mut state = self.state.lock().await;
        if state.tasks.contains(id) {
            debug!(id = %id, "insert event deduplicated after refetch");
            return;
        }
        state.tasks.insert(joined);
        debug!(id = %id, "task inserted by push event");
    }

    async fn reconcile_update(&self, new: Task) {
        let id = new.id;
        let mut state = self.state.lock().await;
        let Some(existing) = state.tasks.get(id) else {
            debug!(id = %id, "update event for unknown task ignored");
            return;
        };
        if existing.task.updated_at > new.updated_at {
            debug!(id = %id, "stale update event ignored");
            return;
        }

        let users = state.users.clone();
        state.tasks.update_with(id, |entry| {
            entry.assignee = resolve_assignee(&users, new.assignee_id);
            entry.task = new;
        });
        state.tracker.mark_recently_updated(id);
        debug!(id = %id, "task updated by push event");
    }
}

fn resolve_assignee(users: &[User], assignee_id: Option<Uuid>) -> Option<User> {
    assignee_id.and_then(|id| users.iter().find(|u| u.id == id).cloned())
}

const fn error_kind_for(e: &BackendError) -> ErrorKind {
    match e {
        BackendError::NotFound => ErrorKind::NotFound,
        BackendError::Validation(_) => ErrorKind::Validation,
        BackendError::Transport(_) | BackendError::Closed => ErrorKind::Transport,
    }
}

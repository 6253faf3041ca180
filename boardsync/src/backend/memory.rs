//! In-process persistence service with a push feed.
//!
//! Backs tests and demos: rows live in process memory, every committed
//! write is broadcast to subscribers the way a change-data-capture feed
//! would, and failures can be injected per call or by taking the whole
//! service "offline". Two stores sharing one `InMemoryBackend` behave
//! like two clients sharing one deployment, echoes included.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, Notify, mpsc};
use uuid::Uuid;

use boardsync_types::chat::{ChatMessage, ChatMessageWithUser, SendMessageRequest};
use boardsync_types::event::{ChangeEvent, Table};
use boardsync_types::id::EntityId;
use boardsync_types::presence::UserPresence;
use boardsync_types::task::{CreateTaskRequest, Task, TaskWithAssignee, UpdateTaskRequest};
use boardsync_types::user::User;

use super::{Backend, BackendError};
use crate::realtime::{PushChannel, SubscribeError, Subscription};

#[derive(Debug, Default)]
struct Tables {
    tasks: Vec<Task>,
    users: Vec<User>,
    messages: Vec<ChatMessage>,
    presence: HashMap<Uuid, UserPresence>,
}

type Subscribers<R> = SyncMutex<Vec<mpsc::Sender<ChangeEvent<R>>>>;

/// In-memory [`Backend`] and [`PushChannel`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: Mutex<Tables>,
    task_subs: Subscribers<Task>,
    message_subs: Subscribers<ChatMessage>,
    presence_subs: Subscribers<UserPresence>,
    offline: AtomicBool,
    fail_next: SyncMutex<Option<BackendError>>,
    hold_next: SyncMutex<Option<(Arc<Notify>, BackendError)>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent request fail with a transport error until
    /// turned back off. Subscriptions are rejected too.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Makes only the next request fail with the given error.
    pub fn fail_next(&self, err: BackendError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Makes the next request stall until the returned handle is
    /// notified, then fail with the given error. Lets tests interleave
    /// feed traffic with a mutation that is still in flight.
    pub fn hold_next(&self, err: BackendError) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_next.lock() = Some((Arc::clone(&gate), err));
        gate
    }

    /// Inserts a user row directly; test seeding, no event.
    pub async fn seed_user(&self, name: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.users.push(user.clone());
        user
    }

    /// Emits a task change event without touching stored rows, to
    /// simulate feed anomalies (duplicates, events for unknown rows).
    pub fn emit_task_event(&self, event: &ChangeEvent<Task>) {
        Self::broadcast(&self.task_subs, event);
    }

    /// Emits a presence change event without touching stored rows.
    pub fn emit_presence_event(&self, event: &ChangeEvent<UserPresence>) {
        Self::broadcast(&self.presence_subs, event);
    }

    async fn check_reachable(&self) -> Result<(), BackendError> {
        let held = self.hold_next.lock().take();
        if let Some((gate, err)) = held {
            gate.notified().await;
            return Err(err);
        }
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        if self.offline.load(Ordering::Relaxed) {
            return Err(BackendError::Transport("service offline".to_string()));
        }
        Ok(())
    }

    fn broadcast<R: Clone>(subs: &Subscribers<R>, event: &ChangeEvent<R>) {
        let mut subs = subs.lock();
        subs.retain(|tx| !tx.is_closed());
        for tx in subs.iter() {
            // Slow consumers lose events rather than blocking the feed.
            let _ = tx.try_send(event.clone());
        }
    }

    fn subscribe<R>(
        &self,
        subs: &Subscribers<R>,
        table: Table,
        buffer: usize,
    ) -> Result<Subscription<R>, SubscribeError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(SubscribeError::Rejected {
                table,
                reason: "service offline".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(buffer);
        subs.lock().push(tx);
        Ok(Subscription::new(table, rx))
    }

    fn join_task(task: Task, users: &[User]) -> TaskWithAssignee {
        let assignee = task
            .assignee_id
            .and_then(|id| users.iter().find(|u| u.id == id).cloned());
        TaskWithAssignee { task, assignee }
    }
}

impl Backend for InMemoryBackend {
    async fn fetch_tasks(&self) -> Result<Vec<TaskWithAssignee>, BackendError> {
        self.check_reachable().await?;
        let tables = self.tables.lock().await;
        let mut tasks = tables.tasks.clone();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks
            .into_iter()
            .map(|t| Self::join_task(t, &tables.users))
            .collect())
    }

    async fn get_task(&self, id: Uuid) -> Result<TaskWithAssignee, BackendError> {
        self.check_reachable().await?;
        let tables = self.tables.lock().await;
        let task = tables
            .tasks
            .iter()
            .find(|t| t.id == EntityId::server(id))
            .cloned()
            .ok_or(BackendError::NotFound)?;
        Ok(Self::join_task(task, &tables.users))
    }

    async fn create_task(&self, req: CreateTaskRequest) -> Result<Task, BackendError> {
        self.check_reachable().await?;
        req.validate()
            .map_err(|e| BackendError::Validation(e.to_string()))?;

        let now = Utc::now();
        let task = Task {
            id: EntityId::server(Uuid::new_v4()),
            title: req.title,
            description: req.description.unwrap_or_default(),
            status: req.status,
            assignee_id: req.assignee_id,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.tasks.push(task.clone());
        Self::broadcast(&self.task_subs, &ChangeEvent::Insert { new: task.clone() });
        Ok(task)
    }

    async fn update_task(&self, id: Uuid, req: UpdateTaskRequest) -> Result<Task, BackendError> {
        self.check_reachable().await?;
        req.validate()
            .map_err(|e| BackendError::Validation(e.to_string()))?;

        let mut tables = self.tables.lock().await;
        let task = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == EntityId::server(id))
            .ok_or(BackendError::NotFound)?;
        req.apply_to(task);
        task.updated_at = Utc::now();
        let task = task.clone();
        drop(tables);

        Self::broadcast(&self.task_subs, &ChangeEvent::Update { new: task.clone() });
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), BackendError> {
        self.check_reachable().await?;
        let mut tables = self.tables.lock().await;
        let index = tables
            .tasks
            .iter()
            .position(|t| t.id == EntityId::server(id))
            .ok_or(BackendError::NotFound)?;
        tables.tasks.remove(index);
        drop(tables);

        Self::broadcast(
            &self.task_subs,
            &ChangeEvent::Delete {
                old_id: EntityId::server(id),
            },
        );
        Ok(())
    }

    async fn fetch_users(&self) -> Result<Vec<User>, BackendError> {
        self.check_reachable().await?;
        Ok(self.tables.lock().await.users.clone())
    }

    async fn fetch_messages(&self, limit: usize) -> Result<Vec<ChatMessageWithUser>, BackendError> {
        self.check_reachable().await?;
        let tables = self.tables.lock().await;
        let skip = tables.messages.len().saturating_sub(limit);
        Ok(tables.messages[skip..]
            .iter()
            .map(|m| ChatMessageWithUser {
                message: m.clone(),
                user: tables.users.iter().find(|u| u.id == m.user_id).cloned(),
            })
            .collect())
    }

    async fn send_message(
        &self,
        user_id: Uuid,
        req: SendMessageRequest,
    ) -> Result<ChatMessage, BackendError> {
        self.check_reachable().await?;
        req.validate()
            .map_err(|e| BackendError::Validation(e.to_string()))?;

        let now = Utc::now();
        let message = ChatMessage {
            id: EntityId::server(Uuid::new_v4()),
            user_id,
            body: req.body,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.messages.push(message.clone());
        Self::broadcast(
            &self.message_subs,
            &ChangeEvent::Insert {
                new: message.clone(),
            },
        );
        Ok(message)
    }

    async fn update_message(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: SendMessageRequest,
    ) -> Result<ChatMessage, BackendError> {
        self.check_reachable().await?;
        req.validate()
            .map_err(|e| BackendError::Validation(e.to_string()))?;

        let mut tables = self.tables.lock().await;
        let message = tables
            .messages
            .iter_mut()
            .find(|m| m.id == EntityId::server(id) && m.user_id == user_id)
            .ok_or(BackendError::NotFound)?;
        message.body = req.body.trim().to_string();
        message.updated_at = Utc::now();
        let message = message.clone();
        drop(tables);

        Self::broadcast(
            &self.message_subs,
            &ChangeEvent::Update {
                new: message.clone(),
            },
        );
        Ok(message)
    }

    async fn delete_message(&self, id: Uuid, user_id: Uuid) -> Result<(), BackendError> {
        self.check_reachable().await?;
        let mut tables = self.tables.lock().await;
        let index = tables
            .messages
            .iter()
            .position(|m| m.id == EntityId::server(id) && m.user_id == user_id)
            .ok_or(BackendError::NotFound)?;
        tables.messages.remove(index);
        drop(tables);

        Self::broadcast(
            &self.message_subs,
            &ChangeEvent::Delete {
                old_id: EntityId::server(id),
            },
        );
        Ok(())
    }

    async fn fetch_presence(&self) -> Result<Vec<UserPresence>, BackendError> {
        self.check_reachable().await?;
        Ok(self.tables.lock().await.presence.values().cloned().collect())
    }

    async fn upsert_presence(
        &self,
        user_id: Uuid,
        is_online: bool,
    ) -> Result<UserPresence, BackendError> {
        self.check_reachable().await?;
        let now = Utc::now();
        let mut tables = self.tables.lock().await;
        let existed = tables.presence.contains_key(&user_id);
        let row = tables
            .presence
            .entry(user_id)
            .or_insert_with(|| UserPresence {
                user_id,
                is_online,
                last_seen: now,
                heartbeat: now,
                updated_at: now,
            });
        row.is_online = is_online;
        if is_online {
            row.last_seen = now;
        }
        row.heartbeat = now;
        row.updated_at = now;
        let row = row.clone();
        drop(tables);

        let event = if existed {
            ChangeEvent::Update { new: row.clone() }
        } else {
            ChangeEvent::Insert { new: row.clone() }
        };
        Self::broadcast(&self.presence_subs, &event);
        Ok(row)
    }
}

impl PushChannel for InMemoryBackend {
    async fn subscribe_tasks(&self, buffer: usize) -> Result<Subscription<Task>, SubscribeError> {
        self.subscribe(&self.task_subs, Table::Tasks, buffer)
    }

    async fn subscribe_messages(
        &self,
        buffer: usize,
    ) -> Result<Subscription<ChatMessage>, SubscribeError> {
        self.subscribe(&self.message_subs, Table::ChatMessages, buffer)
    }

    async fn subscribe_presence(
        &self,
        buffer: usize,
    ) -> Result<Subscription<UserPresence>, SubscribeError> {
        self.subscribe(&self.presence_subs, Table::UserPresence, buffer)
    }
}

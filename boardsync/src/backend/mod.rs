//! Persistence service abstraction.
//!
//! Defines the [`Backend`] trait the stores mutate through. The only
//! concrete implementation in this crate is [`memory::InMemoryBackend`],
//! an in-process service with a push feed, used by tests and demos; a
//! real deployment implements [`Backend`] over its API client.

pub mod memory;

pub use memory::InMemoryBackend;

use uuid::Uuid;

use boardsync_types::chat::{ChatMessage, ChatMessageWithUser, SendMessageRequest};
use boardsync_types::presence::UserPresence;
use boardsync_types::task::{CreateTaskRequest, Task, TaskWithAssignee, UpdateTaskRequest};
use boardsync_types::user::User;

/// Errors that can occur talking to the persistence service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The referenced row does not exist (anymore).
    #[error("record not found")]
    NotFound,

    /// The service rejected the payload.
    #[error("request rejected: {0}")]
    Validation(String),

    /// The service could not be reached.
    #[error("service unreachable: {0}")]
    Transport(String),

    /// The client was shut down; no further requests are possible.
    #[error("backend closed")]
    Closed,
}

/// Async interface to the persistence service.
///
/// All mutation methods return the server's authoritative row, which
/// the stores use to replace their optimistic entries. Implementations
/// must not mutate anything on a returned error.
pub trait Backend: Send + Sync {
    /// Fetches all tasks with assignees joined, newest first.
    fn fetch_tasks(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<TaskWithAssignee>, BackendError>> + Send;

    /// Fetches one task with its assignee joined.
    fn get_task(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<TaskWithAssignee, BackendError>> + Send;

    /// Creates a task; the returned row carries the server-assigned id
    /// and timestamps.
    fn create_task(
        &self,
        req: CreateTaskRequest,
    ) -> impl std::future::Future<Output = Result<Task, BackendError>> + Send;

    /// Applies a partial update; the returned row is the post-update
    /// state.
    fn update_task(
        &self,
        id: Uuid,
        req: UpdateTaskRequest,
    ) -> impl std::future::Future<Output = Result<Task, BackendError>> + Send;

    /// Deletes a task.
    fn delete_task(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), BackendError>> + Send;

    /// Fetches all team members.
    fn fetch_users(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<User>, BackendError>> + Send;

    /// Fetches the most recent `limit` chat messages with authors
    /// joined, oldest first.
    fn fetch_messages(
        &self,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessageWithUser>, BackendError>> + Send;

    /// Sends a chat message as the given user.
    fn send_message(
        &self,
        user_id: Uuid,
        req: SendMessageRequest,
    ) -> impl std::future::Future<Output = Result<ChatMessage, BackendError>> + Send;

    /// Edits a message's body. Scoped to the author: editing another
    /// user's message is `NotFound`.
    fn update_message(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: SendMessageRequest,
    ) -> impl std::future::Future<Output = Result<ChatMessage, BackendError>> + Send;

    /// Deletes a message. Scoped to the author like
    /// [`update_message`](Backend::update_message).
    fn delete_message(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), BackendError>> + Send;

    /// Fetches every presence row.
    fn fetch_presence(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<UserPresence>, BackendError>> + Send;

    /// Upserts the presence row for a user, stamping `last_seen` when
    /// `is_online` is true.
    fn upsert_presence(
        &self,
        user_id: Uuid,
        is_online: bool,
    ) -> impl std::future::Future<Output = Result<UserPresence, BackendError>> + Send;
}

//! Entity model for the `boardsync` client engine.
//!
//! Pure data types shared between the reconciliation engine and its
//! collaborators: entity rows and their joined display views, the two
//! identifier spaces (server-assigned vs. optimistic local), partial
//! update requests with validation, filter criteria, and the change
//! events delivered by the push channel.

pub mod chat;
pub mod event;
pub mod filter;
pub mod id;
pub mod presence;
pub mod task;
pub mod user;

pub use chat::{ChatMessage, ChatMessageWithUser, MAX_MESSAGE_LENGTH, SendMessageRequest};
pub use event::{ChangeEvent, Table};
pub use filter::{AssigneeFilter, TaskFilters};
pub use id::EntityId;
pub use presence::{UserPresence, UserWithPresence};
pub use task::{
    CreateTaskRequest, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH, Task, TaskStatus, TaskWithAssignee,
    UpdateTaskRequest,
};
pub use user::User;

use thiserror::Error;

/// Errors raised when a request payload fails validation before it is
/// allowed to touch the entity store or the persistence service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {MAX_TITLE_LENGTH} characters)")]
    TitleTooLong,
    /// Task description exceeds the maximum length.
    #[error("task description too long (max {MAX_DESCRIPTION_LENGTH} characters)")]
    DescriptionTooLong,
    /// Chat message body is empty after trimming whitespace.
    #[error("message cannot be empty")]
    MessageEmpty,
    /// Chat message body exceeds the maximum length.
    #[error("message too long (max {MAX_MESSAGE_LENGTH} characters)")]
    MessageTooLong,
}

//! Task rows, joined views, and mutation request payloads.
//!
//! `Task` mirrors the persistence service's row shape; `TaskWithAssignee`
//! is the client-visible view with the assignee's user record joined on.
//! Request payloads validate before any optimistic store mutation so a
//! malformed create/update never reaches the board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ValidationError;
use crate::id::EntityId;
use crate::user::User;

/// Maximum allowed task title length in characters.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum allowed task description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Kanban column a task currently sits in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    /// Actively being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Completed.
    #[serde(rename = "Done")]
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToDo => write!(f, "To Do"),
            Self::InProgress => write!(f, "In Progress"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// A task row as the persistence service stores it.
///
/// Timestamps are client-assigned while the task is an optimistic local
/// entry and replaced by the server's authoritative values once the
/// create is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Server id once confirmed, local placeholder id before that.
    pub id: EntityId,
    /// Short title shown on the board card.
    pub title: String,
    /// Longer free-form description (may be empty).
    #[serde(default)]
    pub description: String,
    /// Current kanban column.
    pub status: TaskStatus,
    /// Server id of the assigned user, if any.
    pub assignee_id: Option<Uuid>,
    /// Creation time; board ordering key (newest first).
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A task with its assignee's user record joined on for display.
///
/// The embedded `assignee` is denormalized data, not a source of truth:
/// it is resolved client-side from the cached user list for optimistic
/// entries and carried across reconciliation passes when the server
/// response or a change event omits the join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithAssignee {
    /// The underlying task row.
    #[serde(flatten)]
    pub task: Task,
    /// Joined assignee record, when `assignee_id` is set and resolvable.
    pub assignee: Option<User>,
}

impl TaskWithAssignee {
    /// The task's id (local or server).
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.task.id
    }
}

/// Payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Title (required, 1..=255 characters).
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial column; defaults to "To Do".
    #[serde(default)]
    pub status: TaskStatus,
    /// Optional assignee.
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

impl CreateTaskRequest {
    /// Validates the payload before any store or service mutation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the title is empty or too long, or
    /// the description exceeds [`MAX_DESCRIPTION_LENGTH`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if let Some(desc) = &self.description {
            validate_description(desc)?;
        }
        Ok(())
    }
}

/// Partial update payload; only provided fields change (merge semantics).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    /// New title, if changing.
    #[serde(default)]
    pub title: Option<String>,
    /// New description, if changing.
    #[serde(default)]
    pub description: Option<String>,
    /// New status, if changing.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// New assignee, if changing. `Some(None)` clears the assignee.
    #[serde(default)]
    pub assignee_id: Option<Option<Uuid>>,
}

impl UpdateTaskRequest {
    /// True if no field is set (applying it would change nothing).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.assignee_id.is_none()
    }

    /// Validates the provided fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a provided title is empty or too
    /// long, or a provided description is too long.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(desc) = &self.description {
            validate_description(desc)?;
        }
        Ok(())
    }

    /// Applies the provided fields onto a task row, leaving the rest
    /// untouched. The caller owns timestamp bookkeeping.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(desc) = &self.description {
            task.description.clone_from(desc);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

fn validate_description(desc: &str) -> Result<(), ValidationError> {
    if desc.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok(())
}

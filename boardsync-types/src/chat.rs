//! Chat message rows and the send payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ValidationError;
use crate::id::EntityId;
use crate::user::User;

/// Maximum allowed chat message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A chat message row as the persistence service stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server id once confirmed, local placeholder id before that.
    pub id: EntityId,
    /// Author's user id.
    pub user_id: Uuid,
    /// Message text.
    pub body: String,
    /// When the message was sent.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A chat message with its author's user record joined on for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageWithUser {
    /// The underlying message row.
    #[serde(flatten)]
    pub message: ChatMessage,
    /// Joined author record, when resolvable.
    pub user: Option<User>,
}

impl ChatMessageWithUser {
    /// The message's id (local or server).
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.message.id
    }
}

/// Payload for sending a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Message text; leading and trailing whitespace is not counted
    /// toward emptiness.
    pub body: String,
}

impl SendMessageRequest {
    /// Validates the payload before any store or service mutation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the body is empty after trimming
    /// or exceeds [`MAX_MESSAGE_LENGTH`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.body.trim().is_empty() {
            return Err(ValidationError::MessageEmpty);
        }
        if self.body.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ValidationError::MessageTooLong);
        }
        Ok(())
    }
}

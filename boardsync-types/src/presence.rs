//! Presence rows and the joined roster view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::User;

/// A presence row, keyed by user id (one row per user, upserted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPresence {
    /// The user this row describes.
    pub user_id: Uuid,
    /// Whether the user's client currently reports itself online.
    pub is_online: bool,
    /// When the user was last seen online.
    pub last_seen: DateTime<Utc>,
    /// When the user's client last asserted this row.
    pub heartbeat: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A roster entry: a user with their presence row joined on, if one
/// exists. A user with no presence row has never connected and counts
/// as offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithPresence {
    /// The user record.
    pub user: User,
    /// The user's presence row, if they have ever connected.
    pub presence: Option<UserPresence>,
}

impl UserWithPresence {
    /// Whether this user counts as online for roster display.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.presence.as_ref().is_some_and(|p| p.is_online)
    }
}

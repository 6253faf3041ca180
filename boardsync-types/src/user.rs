//! User records joined onto tasks, messages, and presence rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A team member, as stored in the `users` table.
///
/// Users are display data on this client: the record is joined onto
/// tasks (assignee) and chat messages (author) but never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// When the user record was created.
    pub created_at: DateTime<Utc>,
}

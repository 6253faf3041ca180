//! Change events delivered over the push channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// Tables the push channel can report changes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    /// The kanban board's tasks.
    Tasks,
    /// Team chat messages.
    ChatMessages,
    /// Per-user presence rows.
    UserPresence,
    /// Team member records.
    Users,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tasks => write!(f, "tasks"),
            Self::ChatMessages => write!(f, "chat_messages"),
            Self::UserPresence => write!(f, "user_presence"),
            Self::Users => write!(f, "users"),
        }
    }
}

/// A single row change reported by the push channel.
///
/// `R` is the raw row type for the table, without client-side joins; the
/// reconciler resolves joined display data itself. Delete events carry
/// only the departed row's id, matching what change-data-capture feeds
/// provide after the row is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent<R> {
    /// A row was inserted.
    Insert {
        /// The new row.
        new: R,
    },
    /// A row was updated.
    Update {
        /// The row's post-update state.
        new: R,
    },
    /// A row was deleted.
    Delete {
        /// Id of the deleted row.
        old_id: EntityId,
    },
}

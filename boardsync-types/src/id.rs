//! Entity identifiers across the two id spaces.
//!
//! Server ids are assigned by the persistence service and stable for the
//! lifetime of the record. Local ids are assigned by the client for
//! optimistic entries and only valid until the pending mutation settles;
//! the two spaces are distinguishable by construction, so an optimistic
//! placeholder can never be mistaken for a confirmed record.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counter backing [`EntityId::next_local`]. Monotonic per process, which
/// is all the uniqueness an optimistic placeholder needs.
static NEXT_LOCAL: AtomicU64 = AtomicU64::new(1);

/// Identifier for an entity in the store.
///
/// `Server` wraps the durable UUID assigned by the persistence service.
/// `Local` tags a client-assigned placeholder id used between an
/// optimistic mutation and its confirmation or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    /// Durable id assigned by the persistence service.
    Server(Uuid),
    /// Temporary client-assigned id for an unconfirmed optimistic entry.
    Local(u64),
}

impl EntityId {
    /// Returns a fresh local id, unique within this process.
    #[must_use]
    pub fn next_local() -> Self {
        Self::Local(NEXT_LOCAL.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a server-assigned UUID.
    #[must_use]
    pub const fn server(id: Uuid) -> Self {
        Self::Server(id)
    }

    /// True if this id belongs to the optimistic local id space.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// True if this id was assigned by the persistence service.
    #[must_use]
    pub const fn is_server(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// Returns the server UUID, or `None` for a local placeholder.
    #[must_use]
    pub const fn as_server(&self) -> Option<Uuid> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(n) => write!(f, "local-{n}"),
        }
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self::Server(id)
    }
}

//! Ordered entity store shared by the task board and chat history.
//!
//! `EntityStore` keeps entities in display order and owns the merge
//! rules every reconciliation path goes through: position-preserving
//! upsert, idempotent remove, and in-place replacement of an optimistic
//! local entry by its confirmed server record. The stores above it
//! (tasks, chat) never touch the backing list directly, so a change
//! event and a mutation confirmation can never disagree about how a row
//! lands.

use boardsync_types::chat::ChatMessageWithUser;
use boardsync_types::id::EntityId;
use boardsync_types::task::TaskWithAssignee;

/// An entity addressable by [`EntityId`].
pub trait Keyed {
    /// The entity's current id (local or server).
    fn key(&self) -> EntityId;
}

impl Keyed for TaskWithAssignee {
    fn key(&self) -> EntityId {
        self.id()
    }
}

impl Keyed for ChatMessageWithUser {
    fn key(&self) -> EntityId {
        self.id()
    }
}

/// Where a new entity lands in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Prepend (task board: newest first).
    Front,
    /// Append (chat history: oldest first).
    Back,
}

/// An ordered list of entities with id-addressed merge operations.
///
/// Order is the display order; all merge operations preserve the
/// positions of entities they do not insert.
#[derive(Debug, Clone)]
pub struct EntityStore<E> {
    entries: Vec<E>,
    position: InsertPosition,
}

impl<E: Keyed + Clone> EntityStore<E> {
    /// Creates an empty store with the given insert position for new
    /// entities.
    #[must_use]
    pub const fn new(position: InsertPosition) -> Self {
        Self {
            entries: Vec::new(),
            position,
        }
    }

    /// Number of entities in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entities in display order.
    #[must_use]
    pub fn list(&self) -> &[E] {
        &self.entries
    }

    /// Looks up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.entries.iter().find(|e| e.key() == id)
    }

    /// True if an entity with this id is present.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.iter().any(|e| e.key() == id)
    }

    /// Inserts a new entity at the store's insert position. The caller
    /// must have checked the id is not already present.
    pub fn insert(&mut self, entity: E) {
        match self.position {
            InsertPosition::Front => self.entries.insert(0, entity),
            InsertPosition::Back => self.entries.push(entity),
        }
    }

    /// Inserts the entity, or replaces the existing entity with the same
    /// id in place, preserving its position.
    pub fn upsert(&mut self, entity: E) {
        let id = entity.key();
        if let Some(slot) = self.entries.iter_mut().find(|e| e.key() == id) {
            *slot = entity;
        } else {
            self.insert(entity);
        }
    }

    /// Mutates the entity with this id in place, if present. Returns
    /// whether the entity was found.
    pub fn update_with(&mut self, id: EntityId, f: impl FnOnce(&mut E)) -> bool {
        if let Some(slot) = self.entries.iter_mut().find(|e| e.key() == id) {
            f(slot);
            true
        } else {
            false
        }
    }

    /// Removes the entity with this id, if present. Removing an absent
    /// id is a no-op, so a delete event arriving after a local delete
    /// settles cleanly.
    pub fn remove(&mut self, id: EntityId) -> Option<E> {
        let index = self.entries.iter().position(|e| e.key() == id)?;
        Some(self.entries.remove(index))
    }

    /// Replaces the optimistic entry `local_id` with the confirmed
    /// server record, in a single pass so no intermediate state (entry
    /// missing, or present twice) is ever observable.
    ///
    /// If a push event already delivered the server record before the
    /// mutation response arrived, the optimistic entry is dropped and
    /// the existing server entry keeps its position.
    pub fn replace_local_with_server(&mut self, local_id: EntityId, confirmed: E) {
        let server_id = confirmed.key();
        if self.contains(server_id) {
            // Echo won the race; the confirmed record is already here.
            self.entries.retain(|e| e.key() != local_id);
            self.upsert(confirmed);
        } else if !self.update_with(local_id, |slot| *slot = confirmed.clone()) {
            // Optimistic entry vanished (e.g. full refetch in between);
            // fall back to a plain insert.
            self.insert(confirmed);
        }
    }

    /// Replaces the whole list, e.g. from an initial or refetch load.
    pub fn set_all(&mut self, entries: Vec<E>) {
        self.entries = entries;
    }

    /// Clones the current list for a pre-mutation snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<E> {
        self.entries.clone()
    }

    /// Restores a snapshot taken by [`snapshot`](Self::snapshot),
    /// rolling back every change made since.
    pub fn restore(&mut self, snapshot: Vec<E>) {
        self.entries = snapshot;
    }
}

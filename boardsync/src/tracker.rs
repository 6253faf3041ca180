//! Per-entity in-flight operation tracking.
//!
//! The tracker answers three display questions about an entity: is a
//! confirmation-pending update in flight, is a delete in flight, and
//! was it updated recently enough to still highlight. "Recently
//! updated" markers expire on a deadline rather than a spawned timer,
//! so expiry is driven by the clock reads themselves and works under
//! paused test time.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use boardsync_types::id::EntityId;

/// Tracks in-flight mutations and recent-update markers per entity id.
#[derive(Debug)]
pub struct OpTracker {
    updating: HashSet<EntityId>,
    deleting: HashSet<EntityId>,
    /// Expiry deadline per recently-updated entity. Pruned lazily on
    /// writes; reads compare against the clock directly.
    recently_updated: HashMap<EntityId, Instant>,
    recently_updated_ttl: Duration,
}

impl OpTracker {
    /// Creates a tracker whose recent-update markers expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            updating: HashSet::new(),
            deleting: HashSet::new(),
            recently_updated: HashMap::new(),
            recently_updated_ttl: ttl,
        }
    }

    /// Marks an update as in flight for this entity.
    pub fn begin_update(&mut self, id: EntityId) {
        self.updating.insert(id);
    }

    /// Clears the in-flight update marker, whether the update settled
    /// by confirmation or rollback.
    pub fn end_update(&mut self, id: EntityId) {
        self.updating.remove(&id);
    }

    /// Marks a delete as in flight for this entity.
    pub fn begin_delete(&mut self, id: EntityId) {
        self.deleting.insert(id);
    }

    /// Clears the in-flight delete marker.
    pub fn end_delete(&mut self, id: EntityId) {
        self.deleting.remove(&id);
    }

    /// True while an update for this entity awaits confirmation.
    #[must_use]
    pub fn is_updating(&self, id: EntityId) -> bool {
        self.updating.contains(&id)
    }

    /// True while a delete for this entity awaits confirmation.
    #[must_use]
    pub fn is_deleting(&self, id: EntityId) -> bool {
        self.deleting.contains(&id)
    }

    /// Marks this entity as recently updated, restarting its expiry
    /// window if already marked.
    pub fn mark_recently_updated(&mut self, id: EntityId) {
        let now = Instant::now();
        self.recently_updated
            .insert(id, now + self.recently_updated_ttl);
        self.recently_updated.retain(|_, deadline| *deadline > now);
    }

    /// True if this entity's recent-update marker has not expired.
    #[must_use]
    pub fn is_recently_updated(&self, id: EntityId) -> bool {
        self.recently_updated
            .get(&id)
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Clears the recent-update marker, leaving the in-flight sets to
    /// the mutation that wrote them.
    pub fn clear_recently_updated(&mut self, id: EntityId) {
        self.recently_updated.remove(&id);
    }

    /// Rebinds all markers from an optimistic local id to the confirmed
    /// server id, so in-flight state survives id replacement.
    pub fn rekey(&mut self, from: EntityId, to: EntityId) {
        if self.updating.remove(&from) {
            self.updating.insert(to);
        }
        if self.deleting.remove(&from) {
            self.deleting.insert(to);
        }
        if let Some(deadline) = self.recently_updated.remove(&from) {
            self.recently_updated.insert(to, deadline);
        }
    }

    /// Drops every marker for this entity, e.g. after its row is gone.
    pub fn forget(&mut self, id: EntityId) {
        self.updating.remove(&id);
        self.deleting.remove(&id);
        self.recently_updated.remove(&id);
    }
}

//! Presence store: who is online, heartbeats, and the roster view.
//!
//! Presence rows are keyed by user id and upserted, never duplicated.
//! While tracking is active a heartbeat loop re-asserts this client's
//! online row on an interval; other clients' rows arrive over the push
//! feed. A user with no row has never connected and counts as offline.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use boardsync_types::event::ChangeEvent;
use boardsync_types::id::EntityId;
use boardsync_types::presence::{UserPresence, UserWithPresence};
use boardsync_types::user::User;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::realtime::{PushChannel, SubscribeError, SubscriptionGuard};
use crate::report::{ErrorKind, ErrorReporter};
use crate::tasks::StoreError;

struct PresenceState {
    rows: HashMap<Uuid, UserPresence>,
    users: Vec<User>,
}

/// The presence roster's client-side store.
pub struct PresenceStore<B, C> {
    backend: Arc<B>,
    channel: Arc<C>,
    state: Mutex<PresenceState>,
    reporter: Arc<ErrorReporter>,
    config: ClientConfig,
}

impl<B: Backend + 'static, C: PushChannel + 'static> PresenceStore<B, C> {
    /// Creates an empty store over the given service and push channel.
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        channel: Arc<C>,
        reporter: Arc<ErrorReporter>,
        config: ClientConfig,
    ) -> Self {
        Self {
            backend,
            channel,
            state: Mutex::new(PresenceState {
                rows: HashMap::new(),
                users: Vec::new(),
            }),
            reporter,
            config,
        }
    }

    // --- loading ---

    /// Replaces the presence rows with the server's current state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the fetch fails.
    pub async fn fetch_all(&self) -> Result<(), StoreError> {
        let rows = match self.backend.fetch_presence().await {
            Ok(rows) => rows,
            Err(e) => {
                self.reporter.report(
                    ErrorKind::Transport,
                    format!("failed to load presence: {e}"),
                );
                return Err(e.into());
            }
        };
        self.state.lock().await.rows = rows.into_iter().map(|r| (r.user_id, r)).collect();
        Ok(())
    }

    /// Refreshes the cached team member list the roster is built from.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the fetch fails.
    pub async fn fetch_users(&self) -> Result<(), StoreError> {
        let users = self.backend.fetch_users().await.map_err(StoreError::from)?;
        self.state.lock().await.users = users;
        Ok(())
    }

    // --- reads ---

    /// Every team member with their presence row joined on, if any.
    pub async fn roster(&self) -> Vec<UserWithPresence> {
        let state = self.state.lock().await;
        state
            .users
            .iter()
            .map(|user| UserWithPresence {
                presence: state.rows.get(&user.id).cloned(),
                user: user.clone(),
            })
            .collect()
    }

    /// The roster restricted to users currently online.
    pub async fn online_users(&self) -> Vec<UserWithPresence> {
        self.roster()
            .await
            .into_iter()
            .filter(UserWithPresence::is_online)
            .collect()
    }

    /// Whether a specific user currently counts as online.
    pub async fn is_user_online(&self, user_id: Uuid) -> bool {
        self.state
            .lock()
            .await
            .rows
            .get(&user_id)
            .is_some_and(|r| r.is_online)
    }

    // --- tracking ---

    /// Starts announcing this client's user as online.
    ///
    /// Writes the online row immediately, then re-asserts it every
    /// heartbeat interval until the returned guard is dropped. Heartbeat
    /// failures are reported and the loop keeps going; the next beat
    /// usually heals a transient outage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the initial online write
    /// fails; no loop is started in that case.
    pub async fn start_tracking(
        self: &Arc<Self>,
        user_id: Uuid,
    ) -> Result<SubscriptionGuard, StoreError> {
        if let Err(e) = self.backend.upsert_presence(user_id, true).await {
            self.reporter
                .report(ErrorKind::Transport, format!("failed to go online: {e}"));
            return Err(e.into());
        }
        debug!(id = %user_id, "presence tracking started");

        let store = Arc::clone(self);
        let period = self.config.heartbeat_interval;
        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The immediate first tick duplicates the write above; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = store.backend.upsert_presence(user_id, true).await {
                    warn!(id = %user_id, error = %e, "presence heartbeat failed");
                    store
                        .reporter
                        .report(ErrorKind::Transport, format!("heartbeat failed: {e}"));
                }
            }
        });
        Ok(SubscriptionGuard::new(join))
    }

    /// Stops tracking: aborts the heartbeat loop and writes the offline
    /// row. The offline write is best effort; a failure is logged but
    /// not reported, since the client is going away regardless.
    pub async fn stop_tracking(&self, guard: SubscriptionGuard, user_id: Uuid) {
        drop(guard);
        if let Err(e) = self.backend.upsert_presence(user_id, false).await {
            warn!(id = %user_id, error = %e, "failed to go offline");
        }
        debug!(id = %user_id, "presence tracking stopped");
    }

    // --- reconciliation ---

    /// Starts the reconcile loop over the push channel's presence feed.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError`] if the channel rejects the
    /// subscription.
    pub async fn subscribe(self: &Arc<Self>) -> Result<SubscriptionGuard, SubscribeError> {
        let mut sub = match self
            .channel
            .subscribe_presence(self.config.event_buffer)
            .await
        {
            Ok(sub) => sub,
            Err(e) => {
                self.reporter.report(
                    ErrorKind::Subscription,
                    format!("presence subscription failed: {e}"),
                );
                return Err(e);
            }
        };

        let store = Arc::clone(self);
        let join = tokio::spawn(async move {
            while let Some(event) = sub.next().await {
                store.reconcile(event).await;
            }
            warn!(table = %sub.table(), "push feed closed");
        });
        Ok(SubscriptionGuard::new(join))
    }

    async fn reconcile(&self, event: ChangeEvent<UserPresence>) {
        let mut state = self.state.lock().await;
        match event {
            // Insert and update converge: one row per user, last write wins.
            ChangeEvent::Insert { new } | ChangeEvent::Update { new } => {
                state.rows.insert(new.user_id, new);
            }
            ChangeEvent::Delete { old_id } => {
                if let EntityId::Server(user_id) = old_id {
                    state.rows.remove(&user_id);
                }
            }
        }
    }
}

//! Team chat store: optimistic sends, unread tracking, and
//! reconciliation of the message feed.
//!
//! The store is bound to the signed-in user: sends, edits, and deletes
//! run as that user. Messages append in arrival order. A send appears
//! immediately under a local placeholder id and is swapped for the
//! confirmed row in place; the feed echo of that row deduplicates
//! against the list. Other users' messages received while the panel is
//! closed increment the unread count; the signed-in user's own
//! messages never do, even when they arrive from a second client.
//! Opening the panel clears the count.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use boardsync_types::chat::{ChatMessage, ChatMessageWithUser, SendMessageRequest};
use boardsync_types::event::ChangeEvent;
use boardsync_types::id::EntityId;
use boardsync_types::user::User;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::realtime::{PushChannel, SubscribeError, SubscriptionGuard};
use crate::report::{ErrorKind, ErrorReporter};
use crate::store::{EntityStore, InsertPosition};
use crate::tasks::StoreError;

/// Notifications emitted by the chat store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message from another client landed in the list.
    MessageReceived(ChatMessageWithUser),
    /// The unread count changed.
    UnreadChanged(usize),
}

struct ChatState {
    messages: EntityStore<ChatMessageWithUser>,
    users: Vec<User>,
    is_open: bool,
    unread: usize,
}

/// The team chat's client-side store, bound to the signed-in user.
pub struct ChatStore<B, C> {
    backend: Arc<B>,
    channel: Arc<C>,
    current_user: Uuid,
    state: Mutex<ChatState>,
    events: mpsc::Sender<ChatEvent>,
    reporter: Arc<ErrorReporter>,
    config: ClientConfig,
}

impl<B: Backend + 'static, C: PushChannel + 'static> ChatStore<B, C> {
    /// Creates an empty store for the given signed-in user and the
    /// channel its notifications arrive on. The panel starts closed
    /// with zero unread.
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        channel: Arc<C>,
        current_user: Uuid,
        reporter: Arc<ErrorReporter>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(config.chat_event_buffer);
        (
            Self {
                backend,
                channel,
                current_user,
                state: Mutex::new(ChatState {
                    messages: EntityStore::new(InsertPosition::Back),
                    users: Vec::new(),
                    is_open: false,
                    unread: 0,
                }),
                events: tx,
                reporter,
                config,
            },
            rx,
        )
    }

    // --- loading ---

    /// Replaces the message list with the latest page from the server.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the fetch fails.
    pub async fn fetch_all(&self) -> Result<(), StoreError> {
        let page = match self.backend.fetch_messages(self.config.chat_page_size).await {
            Ok(page) => page,
            Err(e) => {
                self.reporter.report(
                    ErrorKind::Transport,
                    format!("failed to load messages: {e}"),
                );
                return Err(e.into());
            }
        };
        self.state.lock().await.messages.set_all(page);
        Ok(())
    }

    /// Refreshes the cached team member list used to resolve authors.
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

    /// The message list, oldest first.
    pub async fn messages(&self) -> Vec<ChatMessageWithUser> {
        self.state.lock().await.messages.snapshot()
    }

    /// Number of messages received while the panel was closed.
    pub async fn unread(&self) -> usize {
        self.state.lock().await.unread
    }

    /// Whether the panel is open.
    pub async fn is_open(&self) -> bool {
        self.state.lock().await.is_open
    }

    // --- panel state ---

    /// Opens the panel and clears the unread count.
    pub async fn open(&self) {
        let mut state = self.state.lock().await;
        state.is_open = true;
        if state.unread != 0 {
            state.unread = 0;
            drop(state);
            let _ = self.events.try_send(ChatEvent::UnreadChanged(0));
        }
    }

    /// Closes the panel.
    pub async fn close(&self) {
        self.state.lock().await.is_open = false;
    }

    /// Clears the unread count without changing the panel state.
    pub async fn mark_read(&self) {
        let mut state = self.state.lock().await;
        if state.unread != 0 {
            state.unread = 0;
            drop(state);
            let _ = self.events.try_send(ChatEvent::UnreadChanged(0));
        }
    }

    /// Toggles the panel, clearing unread when it opens.
    pub async fn toggle(&self) {
        let is_open = self.state.lock().await.is_open;
        if is_open {
            self.close().await;
        } else {
            self.open().await;
        }
    }

    // --- mutations ---

    /// Sends a message optimistically as the signed-in user.
    ///
    /// The message appends immediately under a local placeholder id and
    /// is replaced in place by the confirmed row; on failure the
    /// placeholder is removed again. Returns the server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if validation or the service call fails.
    pub async fn send(&self, req: SendMessageRequest) -> Result<EntityId, StoreError> {
        if let Err(e) = req.validate() {
            self.reporter.report(ErrorKind::Validation, e.to_string());
            return Err(e.into());
        }

        let user_id = self.current_user;
        let local_id = EntityId::next_local();
        let now = Utc::now();
        {
            let mut state = self.state.lock().await;
            let optimistic = ChatMessageWithUser {
                message: ChatMessage {
                    id: local_id,
                    user_id,
                    body: req.body.clone(),
                    created_at: now,
                    updated_at: now,
                },
                user: state.users.iter().find(|u| u.id == user_id).cloned(),
            };
            state.messages.insert(optimistic);
        }
        debug!(id = %local_id, "optimistic message appended");

        match self.backend.send_message(user_id, req).await {
            Ok(confirmed) => {
                let server_id = confirmed.id;
                let mut state = self.state.lock().await;
                let user = state.users.iter().find(|u| u.id == user_id).cloned();
                state.messages.replace_local_with_server(
                    local_id,
                    ChatMessageWithUser {
                        message: confirmed,
                        user,
                    },
                );
                debug!(id = %server_id, "message send confirmed");
                Ok(server_id)
            }
            Err(e) => {
                // Remove only the placeholder; rows the reconcile loop
                // folded in while the send was in flight must survive.
                self.state.lock().await.messages.remove(local_id);
                self.reporter
                    .report(ErrorKind::Transport, format!("failed to send message: {e}"));
                warn!(id = %local_id, error = %e, "message send rolled back");
                Err(e.into())
            }
        }
    }

    /// Edits one of the signed-in user's own messages optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if validation fails, the id is a local
    /// placeholder, or the service rejects the edit (including edits to
    /// another user's message); the local entry is rolled back then.
    pub async fn edit(&self, id: EntityId, req: SendMessageRequest) -> Result<(), StoreError> {
        if let Err(e) = req.validate() {
            self.reporter.report(ErrorKind::Validation, e.to_string());
            return Err(e.into());
        }
        let Some(raw) = id.as_server() else {
            self.reporter
                .report(ErrorKind::NotFound, "message is not confirmed yet");
            return Err(crate::backend::BackendError::NotFound.into());
        };

        let snapshot = {
            let mut state = self.state.lock().await;
            let snapshot = state.messages.snapshot();
            let body = req.body.trim().to_string();
            state.messages.update_with(id, |entry| {
                entry.message.body = body;
                entry.message.updated_at = Utc::now();
            });
            snapshot
        };

        match self.backend.update_message(raw, self.current_user, req).await {
            Ok(confirmed) => {
                let mut state = self.state.lock().await;
                state.messages.update_with(id, |entry| entry.message = confirmed);
                debug!(id = %id, "message edit confirmed");
                Ok(())
            }
            Err(e) => {
                self.state.lock().await.messages.restore(snapshot);
                self.reporter
                    .report(ErrorKind::Transport, format!("failed to edit message: {e}"));
                warn!(id = %id, error = %e, "message edit rolled back");
                Err(e.into())
            }
        }
    }

    /// Deletes one of the signed-in user's own messages optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the id is a local placeholder or the
    /// service rejects the delete; the entry is restored then.
    pub async fn delete(&self, id: EntityId) -> Result<(), StoreError> {
        let Some(raw) = id.as_server() else {
            self.reporter
                .report(ErrorKind::NotFound, "message is not confirmed yet");
            return Err(crate::backend::BackendError::NotFound.into());
        };

        let snapshot = {
            let mut state = self.state.lock().await;
            let snapshot = state.messages.snapshot();
            state.messages.remove(id);
            snapshot
        };

        match self.backend.delete_message(raw, self.current_user).await {
            Ok(()) => {
                debug!(id = %id, "message delete confirmed");
                Ok(())
            }
            Err(e) => {
                self.state.lock().await.messages.restore(snapshot);
                self.reporter.report(
                    ErrorKind::Transport,
                    format!("failed to delete message: {e}"),
                );
                warn!(id = %id, error = %e, "message delete rolled back");
                Err(e.into())
            }
        }
    }

    // --- reconciliation ---

    /// Starts the reconcile loop over the push channel's message feed.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError`] if the channel rejects the
    /// subscription.
    pub async fn subscribe(self: &Arc<Self>) -> Result<SubscriptionGuard, SubscribeError> {
        let mut sub = match self
            .channel
            .subscribe_messages(self.config.event_buffer)
            .await
        {
            Ok(sub) => sub,
            Err(e) => {
                self.reporter.report(
                    ErrorKind::Subscription,
                    format!("chat subscription failed: {e}"),
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

    async fn reconcile(&self, event: ChangeEvent<ChatMessage>) {
        match event {
            ChangeEvent::Insert { new } => {
                let id = new.id;
                let author = new.user_id;
                let mut state = self.state.lock().await;
                if state.messages.contains(id) {
                    // Echo of this client's own send.
                    debug!(id = %id, "insert event deduplicated");
                    return;
                }
                let entry = ChatMessageWithUser {
                    user: state.users.iter().find(|u| u.id == author).cloned(),
                    message: new,
                };
                state.messages.insert(entry.clone());
                // The signed-in user's own messages never count as
                // unread, whether the echo beat the send confirmation
                // or the message came from a second client.
                let unread = if state.is_open || author == self.current_user {
                    None
                } else {
                    state.unread += 1;
                    Some(state.unread)
                };
                drop(state);

                debug!(id = %id, "message received");
                let _ = self.events.try_send(ChatEvent::MessageReceived(entry));
                if let Some(unread) = unread {
                    let _ = self.events.try_send(ChatEvent::UnreadChanged(unread));
                }
            }
            ChangeEvent::Update { new } => {
                let id = new.id;
                let mut state = self.state.lock().await;
                let user = state.users.iter().find(|u| u.id == new.user_id).cloned();
                state.messages.update_with(id, |entry| {
                    entry.message = new;
                    entry.user = user;
                });
            }
            ChangeEvent::Delete { old_id } => {
                self.state.lock().await.messages.remove(old_id);
            }
        }
    }
}

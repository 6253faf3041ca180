//! Push channel abstraction.
//!
//! Defines the [`PushChannel`] trait through which the stores receive
//! row change events, and the [`Subscription`] handle a channel hands
//! back. Reconciliation itself lives in the stores; this module only
//! carries events from the channel to the store's reconcile loop.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use boardsync_types::chat::ChatMessage;
use boardsync_types::event::{ChangeEvent, Table};
use boardsync_types::presence::UserPresence;
use boardsync_types::task::Task;

/// Lifecycle state of a push subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not yet requested.
    Unsubscribed,
    /// Subscribe request in flight.
    Subscribing,
    /// Receiving events.
    Active,
    /// Failed; no further events will arrive.
    Error,
}

/// Errors that can occur establishing a push subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    /// The push channel has shut down.
    #[error("push channel closed")]
    Closed,

    /// The channel rejected the subscription.
    #[error("subscription to {table} failed: {reason}")]
    Rejected {
        /// Table the subscription was for.
        table: Table,
        /// Channel-provided reason.
        reason: String,
    },
}

/// An established subscription to one table's change feed.
///
/// Events arrive strictly in the order the channel observed them.
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription<R> {
    table: Table,
    state: ChannelState,
    rx: mpsc::Receiver<ChangeEvent<R>>,
}

impl<R> Subscription<R> {
    /// Wraps an event receiver as an active subscription.
    #[must_use]
    pub const fn new(table: Table, rx: mpsc::Receiver<ChangeEvent<R>>) -> Self {
        Self {
            table,
            state: ChannelState::Active,
            rx,
        }
    }

    /// The table this subscription covers.
    #[must_use]
    pub const fn table(&self) -> Table {
        self.table
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Waits for the next change event. Returns `None` once the channel
    /// side has shut down, after which the subscription is in
    /// [`ChannelState::Error`].
    pub async fn next(&mut self) -> Option<ChangeEvent<R>> {
        let event = self.rx.recv().await;
        if event.is_none() {
            self.state = ChannelState::Error;
        }
        event
    }
}

/// Source of row change events, one feed per table.
///
/// The subscription's buffer bounds how far a slow consumer may lag;
/// implementations drop events rather than block the feed when the
/// buffer is full.
pub trait PushChannel: Send + Sync {
    /// Subscribes to task row changes.
    fn subscribe_tasks(
        &self,
        buffer: usize,
    ) -> impl std::future::Future<Output = Result<Subscription<Task>, SubscribeError>> + Send;

    /// Subscribes to chat message row changes.
    fn subscribe_messages(
        &self,
        buffer: usize,
    ) -> impl std::future::Future<Output = Result<Subscription<ChatMessage>, SubscribeError>> + Send;

    /// Subscribes to presence row changes.
    fn subscribe_presence(
        &self,
        buffer: usize,
    ) -> impl std::future::Future<Output = Result<Subscription<UserPresence>, SubscribeError>> + Send;
}

/// Handle to a store's running reconcile loop.
///
/// Dropping the guard aborts the loop, which in turn drops its
/// [`Subscription`] and unsubscribes immediately.
#[derive(Debug)]
pub struct SubscriptionGuard {
    join: JoinHandle<()>,
}

impl SubscriptionGuard {
    /// Wraps the reconcile loop's join handle.
    #[must_use]
    pub const fn new(join: JoinHandle<()>) -> Self {
        Self { join }
    }

    /// True if the loop has stopped on its own (channel closed).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.join.abort();
    }
}

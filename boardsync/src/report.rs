//! Client error queue.
//!
//! Failed operations surface here instead of panicking or silently
//! dropping: every report is logged, pushed onto a bounded display
//! queue, and announced over an mpsc channel for any UI that wants to
//! react. Non-retryable errors auto-dismiss after a TTL; retryable ones
//! (transport failures the user can retry) stay until dismissed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;

/// Category of a reported error, used for display and retry affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The entity no longer exists on the server.
    NotFound,
    /// A request payload failed validation locally.
    Validation,
    /// The persistence service could not be reached.
    Transport,
    /// The push channel failed to subscribe or dropped.
    Subscription,
}

impl ErrorKind {
    /// Whether the failed operation is worth offering a retry for.
    /// Transport failures are transient; the rest would fail again.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// A reported error, as queued for display.
#[derive(Debug, Clone)]
pub struct AppError {
    /// Queue-unique id, for dismissal.
    pub id: u64,
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Whether the UI should offer a retry affordance.
    pub retryable: bool,
    /// Auto-dismissal deadline; `None` for retryable errors, which
    /// stay until dismissed.
    expires_at: Option<Instant>,
}

/// Collects reported errors into a display queue.
///
/// Cheap to share: clone the `Arc` wrapping it into every store.
#[derive(Debug)]
pub struct ErrorReporter {
    queue: Mutex<Vec<AppError>>,
    next_id: AtomicU64,
    tx: mpsc::Sender<AppError>,
    ttl: Duration,
}

impl ErrorReporter {
    /// Creates a reporter and the channel its reports are announced on.
    ///
    /// `buffer` bounds the announcement channel; if the consumer falls
    /// behind, announcements are dropped but the queue still holds the
    /// error.
    #[must_use]
    pub fn new(buffer: usize, ttl: Duration) -> (Arc<Self>, mpsc::Receiver<AppError>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            Arc::new(Self {
                queue: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                tx,
                ttl,
            }),
            rx,
        )
    }

    /// Reports an error: logs it, queues it, and announces it.
    pub fn report(&self, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = ?kind, message = %message, "client error reported");

        let retryable = kind.is_retryable();
        let err = AppError {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            message,
            retryable,
            expires_at: (!retryable).then(|| Instant::now() + self.ttl),
        };

        let mut queue = self.queue.lock();
        queue.retain(AppError::is_live);
        queue.push(err.clone());
        drop(queue);

        let _ = self.tx.try_send(err);
    }

    /// The currently live errors, oldest first. Expired entries are
    /// pruned on the way out.
    #[must_use]
    pub fn errors(&self) -> Vec<AppError> {
        let mut queue = self.queue.lock();
        queue.retain(AppError::is_live);
        queue.clone()
    }

    /// Dismisses one error by id. Dismissing an unknown id is a no-op.
    pub fn dismiss(&self, id: u64) {
        self.queue.lock().retain(|e| e.id != id);
    }

    /// Dismisses every queued error.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

impl AppError {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > Instant::now())
    }
}

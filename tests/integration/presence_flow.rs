//! Integration tests for presence tracking.
//!
//! Two `PresenceStore`s share one in-memory service: going online is
//! visible on the other client's roster, heartbeats keep the row
//! asserted, and stopping flips the row offline.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use boardsync::backend::{Backend, InMemoryBackend};
use boardsync::config::ClientConfig;
use boardsync::presence::PresenceStore;
use boardsync::realtime::PushChannel;
use boardsync::report::ErrorReporter;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

type Store = PresenceStore<InMemoryBackend, InMemoryBackend>;

fn make_store(backend: &Arc<InMemoryBackend>) -> Arc<Store> {
    let config = ClientConfig::default();
    let (reporter, _errors) = ErrorReporter::new(config.error_buffer, config.error_ttl);
    Arc::new(PresenceStore::new(
        Arc::clone(backend),
        Arc::clone(backend),
        reporter,
        config,
    ))
}

/// Lets spawned reconcile loops drain their queues.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

// --- tracking tests ---

#[tokio::test]
async fn going_online_is_visible_to_the_other_client() {
    let backend = Arc::new(InMemoryBackend::new());
    let alice = backend.seed_user("Alice", "alice@example.com").await;
    backend.seed_user("Bob", "bob@example.com").await;

    let watcher = make_store(&backend);
    watcher.fetch_users().await.unwrap();
    watcher.fetch_all().await.unwrap();
    let _watch_guard = watcher.subscribe().await.unwrap();
    assert!(watcher.online_users().await.is_empty());

    let tracker = make_store(&backend);
    let guard = tracker.start_tracking(alice.id).await.unwrap();
    settle().await;

    let online = watcher.online_users().await;
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].user.id, alice.id);

    tracker.stop_tracking(guard, alice.id).await;
    settle().await;
    assert!(watcher.online_users().await.is_empty());

    // The roster still lists both users; Alice is just offline now.
    assert_eq!(watcher.roster().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn heartbeats_keep_the_row_fresh() {
    let backend = Arc::new(InMemoryBackend::new());
    let alice = backend.seed_user("Alice", "alice@example.com").await;
    let tracker = make_store(&backend);
    let mut feed = backend.subscribe_presence(8).await.unwrap();

    let _guard = tracker.start_tracking(alice.id).await.unwrap();
    // Initial online write, then one event per heartbeat interval.
    assert!(feed.next().await.is_some());

    for _ in 0..3 {
        tokio::time::advance(ClientConfig::default().heartbeat_interval).await;
        assert!(feed.next().await.is_some());
    }

    let rows = backend.fetch_presence().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_online);
}

#[tokio::test]
async fn dropping_the_guard_stops_heartbeats() {
    let backend = Arc::new(InMemoryBackend::new());
    let alice = backend.seed_user("Alice", "alice@example.com").await;
    let tracker = make_store(&backend);

    let guard = tracker.start_tracking(alice.id).await.unwrap();
    drop(guard);
    settle().await;

    // The loop is gone; the row stays as last written (online) until a
    // stop or another client's write changes it.
    let rows = backend.fetch_presence().await.unwrap();
    assert!(rows[0].is_online);
}

#[tokio::test]
async fn reconnect_after_outage_restores_tracking() {
    let backend = Arc::new(InMemoryBackend::new());
    let alice = backend.seed_user("Alice", "alice@example.com").await;
    let tracker = make_store(&backend);

    backend.set_offline(true);
    assert!(tracker.start_tracking(alice.id).await.is_err());

    backend.set_offline(false);
    let guard = tracker.start_tracking(alice.id).await.unwrap();
    let rows = backend.fetch_presence().await.unwrap();
    assert!(rows[0].is_online);
    tracker.stop_tracking(guard, alice.id).await;
}

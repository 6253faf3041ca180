//! Integration tests for push-feed reconciliation.
//!
//! Two `TaskStore`s share one in-memory service, so each store sees the
//! other's writes through the push feed and its own writes twice (the
//! mutation response plus the feed echo). These tests pin down the
//! merge rules: no duplicates, no stale overwrites, no flicker of the
//! optimistic entry.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use boardsync::backend::{Backend, BackendError, InMemoryBackend};
use boardsync::config::ClientConfig;
use boardsync::report::ErrorReporter;
use boardsync::tasks::{TaskStore, UpdateMode};
use boardsync_types::{ChangeEvent, CreateTaskRequest, Task, TaskStatus, UpdateTaskRequest};
use chrono::{Duration, Utc};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

type Store = TaskStore<InMemoryBackend, InMemoryBackend>;

fn make_store(backend: &Arc<InMemoryBackend>) -> Arc<Store> {
    // RUST_LOG=debug makes the reconcile decisions visible when a test fails.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let config = ClientConfig::default();
    let (reporter, _errors) = ErrorReporter::new(config.error_buffer, config.error_ttl);
    Arc::new(TaskStore::new(
        Arc::clone(backend),
        Arc::clone(backend),
        reporter,
        config,
    ))
}

fn make_create(title: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.to_string(),
        description: None,
        status: TaskStatus::default(),
        assignee_id: None,
    }
}

/// Lets spawned reconcile loops drain their queues.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

// --- insert reconciliation tests ---

#[tokio::test]
async fn remote_create_appears_exactly_once() {
    let backend = Arc::new(InMemoryBackend::new());
    let ours = make_store(&backend);
    let theirs = make_store(&backend);
    let _guard = ours.subscribe().await.unwrap();

    theirs.create(make_create("from the other client")).await.unwrap();
    settle().await;

    let tasks = ours.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task.title, "from the other client");
}

#[tokio::test]
async fn own_create_echo_is_deduplicated() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    let _guard = store.subscribe().await.unwrap();

    let id = store.create(make_create("mine")).await.unwrap();
    settle().await;

    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id(), id);
}

#[tokio::test]
async fn duplicate_insert_events_collapse() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    let _guard = store.subscribe().await.unwrap();

    let task = backend.create_task(make_create("once")).await.unwrap();
    // The feed misbehaves and re-delivers the insert.
    backend.emit_task_event(&ChangeEvent::Insert { new: task });
    settle().await;

    assert_eq!(store.tasks().await.len(), 1);
}

#[tokio::test]
async fn inserted_task_arrives_with_assignee_joined() {
    let backend = Arc::new(InMemoryBackend::new());
    let alice = backend.seed_user("Alice", "alice@example.com").await;
    let store = make_store(&backend);
    let _guard = store.subscribe().await.unwrap();

    let mut req = make_create("assigned remotely");
    req.assignee_id = Some(alice.id);
    backend.create_task(req).await.unwrap();
    settle().await;

    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    // The raw event has no join; the reconciler refetched the record.
    assert_eq!(tasks[0].assignee.as_ref().map(|u| u.id), Some(alice.id));
}

#[tokio::test]
async fn failed_create_keeps_rows_reconciled_mid_flight() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    let _guard = store.subscribe().await.unwrap();

    let gate = backend.hold_next(BackendError::Transport("boom".to_string()));
    let pending = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.create(make_create("mine")).await }
    });
    settle().await;
    assert_eq!(store.tasks().await.len(), 1);

    // Another client's task lands through the feed while the create is held.
    backend.create_task(make_create("theirs")).await.unwrap();
    settle().await;
    assert_eq!(store.tasks().await.len(), 2);

    gate.notify_one();
    assert!(pending.await.unwrap().is_err());

    // The rollback removes only the placeholder, not the remote row.
    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task.title, "theirs");
}

#[tokio::test]
async fn insert_event_for_vanished_row_is_dropped() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    let _guard = store.subscribe().await.unwrap();

    // An insert event whose row no longer exists on the service.
    let now = Utc::now();
    backend.emit_task_event(&ChangeEvent::Insert {
        new: Task {
            id: boardsync_types::EntityId::server(Uuid::new_v4()),
            title: "ghost".to_string(),
            description: String::new(),
            status: TaskStatus::ToDo,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        },
    });
    settle().await;

    assert!(store.tasks().await.is_empty());
}

// --- update reconciliation tests ---

#[tokio::test]
async fn remote_update_lands_and_flags_recent() {
    let backend = Arc::new(InMemoryBackend::new());
    let ours = make_store(&backend);
    let theirs = make_store(&backend);
    let id = theirs.create(make_create("shared")).await.unwrap();

    ours.fetch_all().await.unwrap();
    let _guard = ours.subscribe().await.unwrap();

    theirs
        .update(
            id,
            UpdateTaskRequest {
                status: Some(TaskStatus::Done),
                ..Default::default()
            },
            UpdateMode::Tracked,
        )
        .await
        .unwrap();
    settle().await;

    let task = ours.get_by_id(id).await.unwrap();
    assert_eq!(task.task.status, TaskStatus::Done);
    assert!(ours.is_recently_updated(id).await);
}

#[tokio::test]
async fn stale_update_event_is_ignored() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    let id = store.create(make_create("current")).await.unwrap();
    let _guard = store.subscribe().await.unwrap();

    let stale = Task {
        id,
        title: "from the past".to_string(),
        description: String::new(),
        status: TaskStatus::ToDo,
        assignee_id: None,
        created_at: Utc::now() - Duration::hours(1),
        updated_at: Utc::now() - Duration::hours(1),
    };
    backend.emit_task_event(&ChangeEvent::Update { new: stale });
    settle().await;

    assert_eq!(store.get_by_id(id).await.unwrap().task.title, "current");
}

#[tokio::test]
async fn update_event_for_unknown_task_is_ignored() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    let _guard = store.subscribe().await.unwrap();

    let now = Utc::now();
    backend.emit_task_event(&ChangeEvent::Update {
        new: Task {
            id: boardsync_types::EntityId::server(Uuid::new_v4()),
            title: "never seen".to_string(),
            description: String::new(),
            status: TaskStatus::ToDo,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        },
    });
    settle().await;

    assert!(store.tasks().await.is_empty());
}

// --- delete reconciliation tests ---

#[tokio::test]
async fn remote_delete_removes_row_and_clears_recent_marker() {
    let backend = Arc::new(InMemoryBackend::new());
    let ours = make_store(&backend);
    let theirs = make_store(&backend);
    let id = theirs.create(make_create("shared")).await.unwrap();

    ours.fetch_all().await.unwrap();
    let _guard = ours.subscribe().await.unwrap();

    theirs.delete(id).await.unwrap();
    settle().await;

    assert!(ours.tasks().await.is_empty());
    assert!(!ours.is_recently_updated(id).await);
}

#[tokio::test]
async fn remote_delete_leaves_in_flight_marker_to_the_mutation() {
    let backend = Arc::new(InMemoryBackend::new());
    let ours = make_store(&backend);
    let theirs = make_store(&backend);
    let id = theirs.create(make_create("contested")).await.unwrap();

    ours.fetch_all().await.unwrap();
    let _guard = ours.subscribe().await.unwrap();

    let gate = backend.hold_next(BackendError::Transport("boom".to_string()));
    let pending = tokio::spawn({
        let ours = Arc::clone(&ours);
        async move {
            ours.update(
                id,
                UpdateTaskRequest {
                    status: Some(TaskStatus::Done),
                    ..Default::default()
                },
                UpdateMode::Tracked,
            )
            .await
        }
    });
    settle().await;
    assert!(ours.is_updating(id).await);

    theirs.delete(id).await.unwrap();
    settle().await;
    // The update is still in flight; only its own settling clears the marker.
    assert!(ours.is_updating(id).await);

    gate.notify_one();
    assert!(pending.await.unwrap().is_err());
    assert!(!ours.is_updating(id).await);
}

#[tokio::test]
async fn delete_echo_after_local_delete_is_a_noop() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    let _guard = store.subscribe().await.unwrap();

    let id = store.create(make_create("going")).await.unwrap();
    settle().await;
    store.delete(id).await.unwrap();
    settle().await;

    assert!(store.tasks().await.is_empty());
}

// --- subscription lifecycle tests ---

#[tokio::test]
async fn dropped_guard_stops_reconciliation() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);

    let guard = store.subscribe().await.unwrap();
    drop(guard);
    settle().await;

    backend.create_task(make_create("unseen")).await.unwrap();
    settle().await;
    assert!(store.tasks().await.is_empty());
}

#[tokio::test]
async fn subscribe_fails_while_offline() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = make_store(&backend);
    backend.set_offline(true);
    assert!(store.subscribe().await.is_err());
}

//! Integration tests for optimistic task mutations.
//!
//! Exercises the full create/update/delete cycle of `TaskStore` against
//! the in-memory service: immediate local application, in-place
//! confirmation, rollback on failure, and the per-task activity
//! markers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use boardsync::backend::{Backend, BackendError, InMemoryBackend};
use boardsync::config::ClientConfig;
use boardsync::report::{AppError, ErrorReporter};
use boardsync::tasks::{StoreError, TaskStore, UpdateMode};
use boardsync_types::{CreateTaskRequest, EntityId, TaskStatus, UpdateTaskRequest};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

type Store = TaskStore<InMemoryBackend, InMemoryBackend>;

/// Creates a store and its error feed over a fresh in-memory service.
fn make_store(backend: &Arc<InMemoryBackend>) -> (Arc<Store>, mpsc::Receiver<AppError>) {
    let config = ClientConfig::default();
    let (reporter, errors) = ErrorReporter::new(config.error_buffer, config.error_ttl);
    let store = Arc::new(TaskStore::new(
        Arc::clone(backend),
        Arc::clone(backend),
        reporter,
        config,
    ));
    (store, errors)
}

fn make_create(title: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.to_string(),
        description: None,
        status: TaskStatus::default(),
        assignee_id: None,
    }
}

fn status_update(status: TaskStatus) -> UpdateTaskRequest {
    UpdateTaskRequest {
        status: Some(status),
        ..Default::default()
    }
}

// --- create tests ---

#[tokio::test]
async fn created_task_survives_refetch() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);

    let id = store.create(make_create("Ship the release")).await.unwrap();
    assert!(id.is_server());

    // A full reload from the service yields the same single row.
    store.fetch_all().await.unwrap();
    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id(), id);
}

#[tokio::test]
async fn newest_task_is_listed_first() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);

    store.create(make_create("first")).await.unwrap();
    store.create(make_create("second")).await.unwrap();

    let tasks = store.tasks().await;
    assert_eq!(tasks[0].task.title, "second");
    assert_eq!(tasks[1].task.title, "first");
}

#[tokio::test]
async fn failed_create_reports_retryable_error() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, mut errors) = make_store(&backend);

    backend.set_offline(true);
    assert!(store.create(make_create("lost")).await.is_err());
    assert!(store.tasks().await.is_empty());

    let err = errors.recv().await.unwrap();
    assert!(err.retryable);
}

// --- update tests ---

#[tokio::test]
async fn update_cycle_drives_markers() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);
    let id = store.create(make_create("task")).await.unwrap();

    assert!(!store.is_updating(id).await);
    store
        .update(id, status_update(TaskStatus::InProgress), UpdateMode::Tracked)
        .await
        .unwrap();

    // Settled: not updating anymore, but flagged as recently updated.
    assert!(!store.is_updating(id).await);
    assert!(store.is_recently_updated(id).await);
}

#[tokio::test(start_paused = true)]
async fn recently_updated_flag_expires() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);
    let id = store.create(make_create("task")).await.unwrap();

    store
        .update(id, status_update(TaskStatus::Done), UpdateMode::Tracked)
        .await
        .unwrap();
    assert!(store.is_recently_updated(id).await);

    tokio::time::advance(ClientConfig::default().recently_updated_ttl + Duration::from_millis(1))
        .await;
    assert!(!store.is_recently_updated(id).await);
}

#[tokio::test]
async fn rolled_back_update_leaves_server_state() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);
    let id = store.create(make_create("stable")).await.unwrap();

    backend.fail_next(BackendError::Transport("boom".to_string()));
    let req = UpdateTaskRequest {
        title: Some("rename".to_string()),
        ..Default::default()
    };
    assert!(store.update(id, req, UpdateMode::Tracked).await.is_err());

    // Both local and server state are unchanged.
    assert_eq!(store.get_by_id(id).await.unwrap().task.title, "stable");
    let server = backend.fetch_tasks().await.unwrap();
    assert_eq!(server[0].task.title, "stable");
}

#[tokio::test]
async fn update_on_deleted_task_reports_not_found() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);
    let id = store.create(make_create("gone")).await.unwrap();
    store.delete(id).await.unwrap();

    let err = store
        .update(id, status_update(TaskStatus::Done), UpdateMode::Tracked)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Backend(BackendError::NotFound)));
}

// --- delete tests ---

#[tokio::test]
async fn delete_then_delete_again_fails_cleanly() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);
    let id = store.create(make_create("doomed")).await.unwrap();

    store.delete(id).await.unwrap();
    let err = store.delete(id).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(BackendError::NotFound)));
    assert!(store.tasks().await.is_empty());
}

#[tokio::test]
async fn failed_delete_restores_entry_in_place() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);
    store.create(make_create("above")).await.unwrap();
    let id = store.create(make_create("survivor")).await.unwrap();
    store.create(make_create("below")).await.unwrap();

    backend.fail_next(BackendError::Transport("boom".to_string()));
    assert!(store.delete(id).await.is_err());

    let titles: Vec<_> = store
        .tasks()
        .await
        .into_iter()
        .map(|t| t.task.title)
        .collect();
    assert_eq!(titles, vec!["below", "survivor", "above"]);
}

// --- placeholder id tests ---

#[tokio::test]
async fn local_placeholder_ids_cannot_reach_the_service() {
    let backend = Arc::new(InMemoryBackend::new());
    let (store, _errors) = make_store(&backend);

    let local = EntityId::next_local();
    assert!(store.delete(local).await.is_err());
    assert!(
        store
            .update(local, status_update(TaskStatus::Done), UpdateMode::Silent)
            .await
            .is_err()
    );
}

//! Change tracker integration tests
//!
//! Session-shaped flows: edits applied to a document store under lock,
//! recorded, then undone and redone across actors.

use crate::common::fixtures::*;
use std::sync::Arc;
use xfcad::history::{ChangeRecord, ChangeTracker, HistoryFilter};
use xfcad::locks::{LockManager, LockRequest};
use xfcad::shared::{DocumentStore, HistoryConfig, MemoryDocumentStore, Operation};

async fn apply_and_record(
    tracker: &ChangeTracker,
    store: &MemoryDocumentStore,
    operation: Operation,
) {
    let target = operation.target.clone().unwrap();
    let before = store.capture_state(&target);
    store
        .apply(&target, operation.kind, &operation.params)
        .unwrap();
    tracker
        .record(ChangeRecord::from_operation(operation, before, None))
        .await;
}

#[tokio::test]
async fn test_locked_edit_session_with_undo() {
    let manager = LockManager::new(quiet_lock_config());
    let store = Arc::new(MemoryDocumentStore::new());
    let tracker = ChangeTracker::new(store.clone(), HistoryConfig::default());

    // alice takes the object, edits it, records, releases
    let grant = manager
        .acquire("doc1", LockRequest::exclusive("alice", ids(&["boxA"])))
        .await
        .unwrap();
    assert!(grant.success);

    apply_and_record(&tracker, &store, create("boxA", "alice", 1)).await;
    apply_and_record(
        &tracker,
        &store,
        modify("boxA", "alice", 2, "color", "red"),
    )
    .await;
    manager.release("doc1", "alice", &ids(&["boxA"])).await;

    // bob can now lock and undo sees the full history
    let grant = manager
        .acquire("doc1", LockRequest::exclusive("bob", ids(&["boxA"])))
        .await
        .unwrap();
    assert!(grant.success);

    let history = tracker.get_history(&HistoryFilter::for_object("boxA")).await;
    assert_eq!(history.len(), 2);

    let outcome = tracker.undo(None).await.unwrap();
    assert!(outcome.failures.is_empty());
    assert!(store.capture_state("boxA").unwrap().get("color").is_none());
    manager.shutdown().await;
}

#[tokio::test]
async fn test_cross_actor_cascade_and_replay() {
    let store = Arc::new(MemoryDocumentStore::new());
    let tracker = ChangeTracker::new(store.clone(), HistoryConfig::default());

    apply_and_record(&tracker, &store, create("baseplate", "alice", 1)).await;

    tracker.start_group("drill pattern", "bob").await;
    apply_and_record(
        &tracker,
        &store,
        modify("baseplate", "bob", 2, "holes", 4.0),
    )
    .await;
    apply_and_record(
        &tracker,
        &store,
        move_op("baseplate", "bob", 3, [0.0, 0.0, 5.0]),
    )
    .await;
    tracker.end_group().await.unwrap();

    // Undoing alice's create drags bob's dependent group with it
    let outcome = tracker.undo(Some("alice")).await.unwrap();
    assert_eq!(outcome.cascaded_groups.len(), 1);
    assert!(outcome.failures.is_empty());
    assert!(store.capture_state("baseplate").is_none());

    // Redo replays chronologically: create first, then bob's group
    tracker.redo(None).await.unwrap();
    tracker.redo(None).await.unwrap();
    let state = store.capture_state("baseplate").unwrap();
    assert_eq!(state.get("holes"), Some(&4.0.into()));
    assert_eq!(
        state.get("position").unwrap().as_vec3(),
        Some([0.0, 0.0, 5.0])
    );
}

#[tokio::test]
async fn test_history_window_by_timestamp() {
    let store = Arc::new(MemoryDocumentStore::new());
    let tracker = ChangeTracker::new(store.clone(), HistoryConfig::default());

    for ts in 1..=5 {
        apply_and_record(&tracker, &store, create(&format!("part{ts}"), "alice", ts)).await;
    }

    let window = HistoryFilter {
        since: Some(2),
        until: Some(4),
        ..HistoryFilter::default()
    };
    let history = tracker.get_history(&window).await;
    assert_eq!(history.len(), 3);
    // Newest first
    assert_eq!(history[0].timestamp, 4);
    assert_eq!(history[2].timestamp, 2);
}

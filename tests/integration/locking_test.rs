//! Lock manager integration tests
//!
//! Multi-actor flows: batch refusal, TTL expiry through the sweep, and a
//! three-actor deadlock broken by the detector.

use crate::common::fixtures::*;
use std::time::Duration;
use tokio::time::timeout;
use xfcad::locks::{LockManager, LockRequest};
use xfcad::shared::CollabEventKind;

#[tokio::test]
async fn test_batch_refusal_names_every_blocked_object() {
    let manager = LockManager::new(quiet_lock_config());
    manager
        .acquire("doc1", LockRequest::exclusive("alice", ids(&["partA"])))
        .await
        .unwrap();

    // bob wants partA and partB together; partA is taken, so he gets
    // neither and learns who is in the way
    let result = manager
        .acquire("doc1", LockRequest::exclusive("bob", ids(&["partA", "partB"])))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.failed, vec!["partA"]);
    assert_eq!(result.conflicts.get("partA").map(String::as_str), Some("alice"));
    assert_eq!(result.meta.get("reason").map(String::as_str), Some("conflict"));
    assert!(manager.get_lock_status("doc1", "partB").await.is_none());
    manager.shutdown().await;
}

#[tokio::test]
async fn test_expired_lock_is_swept_and_announced() {
    let manager = LockManager::new(quiet_lock_config());
    let mut events = manager.subscribe();
    manager
        .acquire(
            "doc1",
            LockRequest::exclusive("alice", ids(&["partA"])).with_ttl(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    manager.sweep_expired().await;

    assert!(manager.get_lock_status("doc1", "partA").await.is_none());
    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("expiry event within a second")
        .unwrap();
    match event.kind {
        CollabEventKind::LockExpired { object_id, holder, .. } => {
            assert_eq!(object_id, "partA");
            assert_eq!(holder, "alice");
        }
        other => panic!("expected LockExpired, got {:?}", other),
    }

    // The object is immediately grantable again
    let result = manager
        .acquire("doc1", LockRequest::exclusive("bob", ids(&["partA"])))
        .await
        .unwrap();
    assert!(result.success);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_sweep_wakes_waiter_behind_expired_lock() {
    let manager = LockManager::new(quiet_lock_config());
    manager
        .acquire(
            "doc1",
            LockRequest::exclusive("alice", ids(&["partA"])).with_ttl(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .acquire(
                    "doc1",
                    LockRequest::exclusive("bob", ids(&["partA"]))
                        .with_wait_timeout(Duration::from_secs(5)),
                )
                .await
                .unwrap()
        })
    };

    tokio::time::sleep(Duration::from_millis(80)).await;
    manager.sweep_expired().await;

    let result = timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
    assert!(result.success);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_three_actor_deadlock_is_broken() {
    let manager = LockManager::new(quiet_lock_config());
    let mut events = manager.subscribe();

    // Each actor holds one object...
    for (actor, object) in [("alice", "p1"), ("bob", "p2"), ("carol", "p3")] {
        let result = manager
            .acquire("doc1", LockRequest::exclusive(actor, ids(&[object])))
            .await
            .unwrap();
        assert!(result.success);
    }

    // ...and waits on the next actor's object, closing the cycle
    let mut waiters = Vec::new();
    for (actor, object) in [("alice", "p2"), ("bob", "p3"), ("carol", "p1")] {
        let manager = manager.clone();
        let (actor, object) = (actor.to_string(), object.to_string());
        waiters.push(tokio::spawn(async move {
            let result = manager
                .acquire(
                    "doc1",
                    LockRequest::exclusive(&actor, vec![object])
                        .with_wait_timeout(Duration::from_secs(10)),
                )
                .await
                .unwrap();
            (actor, result)
        }));
        // Keep queue arrival order deterministic
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    manager.detect_deadlocks().await;

    // Exactly one victim was chosen and the cycle reported in full
    let resolution = loop {
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("deadlock event within two seconds")
            .unwrap();
        if let CollabEventKind::DeadlockResolved { victim, cycle, released_objects, .. } = event.kind {
            break (victim, cycle, released_objects);
        }
    };
    let (victim, cycle, released_objects) = resolution;
    assert_eq!(cycle.len(), 3);
    assert!(cycle.contains(&victim));
    assert!(!released_objects.is_empty());

    // Drain the remaining chain: releasing granted locks lets every
    // surviving waiter through eventually
    for _ in 0..3 {
        for actor in ["alice", "bob", "carol"] {
            manager.release_all("doc1", actor).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for waiter in waiters {
        let (actor, result) = timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
        assert!(result.success, "{actor} never got its lock");
    }
    manager.shutdown().await;
}

#[tokio::test]
async fn test_transaction_rollback_wakes_waiters() {
    let manager = LockManager::new(quiet_lock_config());
    let transaction = manager.begin_transaction("doc1", "alice").await;
    manager
        .acquire(
            "doc1",
            LockRequest::exclusive("alice", ids(&["partA", "partB"])).with_transaction(transaction),
        )
        .await
        .unwrap();

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .acquire(
                    "doc1",
                    LockRequest::exclusive("bob", ids(&["partA", "partB"]))
                        .with_wait_timeout(Duration::from_secs(5)),
                )
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let released = manager.rollback_transaction("doc1", transaction).await;
    assert_eq!(released, vec!["partA", "partB"]);

    let result = timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
    assert!(result.success);
    assert_eq!(result.acquired, vec!["partA", "partB"]);
    manager.shutdown().await;
}

//! Asynchronous Notification Events
//!
//! This module defines the events the managers broadcast to interested
//! session layers: deadlock resolutions, lock expirations, grants from the
//! pending queue, and aggregated cascade-undo failures. Events are
//! informational; they never replace a synchronous return value.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollabEventKind {
    /// A queued lock request was granted after waiting
    LockGranted {
        /// Document the locks belong to
        document: String,
        /// Actor that received the grant
        actor_id: String,
        /// Objects covered by the grant
        object_ids: Vec<String>,
    },
    /// A held lock passed its TTL and was force-released by the sweep
    LockExpired {
        /// Document the lock belonged to
        document: String,
        /// Object the lock covered
        object_id: String,
        /// Actor that held the lock
        holder: String,
    },
    /// The deadlock detector broke a wait cycle
    DeadlockResolved {
        /// Document the cycle occurred in
        document: String,
        /// Actor whose locks were force-released
        victim: String,
        /// Objects that were force-released
        released_objects: Vec<String>,
        /// The actors that formed the cycle
        cycle: Vec<String>,
    },
    /// A cascade undo completed with one or more inverse failures
    CascadeUndoFailed {
        /// The group whose undo triggered the cascade
        group_id: Uuid,
        /// Number of inverses that failed to apply
        failures: usize,
    },
}

/// An event plus the wall-clock instant it was observed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollabEvent {
    /// What happened
    pub kind: CollabEventKind,
    /// RFC3339 timestamp when the event occurred
    pub timestamp: String,
}

impl CollabEvent {
    /// Wrap an event kind with the current timestamp
    pub fn new(kind: CollabEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Create a lock-granted event
    pub fn lock_granted(document: &str, actor_id: &str, object_ids: Vec<String>) -> Self {
        Self::new(CollabEventKind::LockGranted {
            document: document.to_string(),
            actor_id: actor_id.to_string(),
            object_ids,
        })
    }

    /// Create a lock-expired event
    pub fn lock_expired(document: &str, object_id: &str, holder: &str) -> Self {
        Self::new(CollabEventKind::LockExpired {
            document: document.to_string(),
            object_id: object_id.to_string(),
            holder: holder.to_string(),
        })
    }

    /// Create a deadlock-resolved event
    pub fn deadlock_resolved(
        document: &str,
        victim: &str,
        released_objects: Vec<String>,
        cycle: Vec<String>,
    ) -> Self {
        Self::new(CollabEventKind::DeadlockResolved {
            document: document.to_string(),
            victim: victim.to_string(),
            released_objects,
            cycle,
        })
    }

    /// Create a cascade-undo-failed event
    pub fn cascade_undo_failed(group_id: Uuid, failures: usize) -> Self {
        Self::new(CollabEventKind::CascadeUndoFailed { group_id, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tags_kind() {
        let event = CollabEvent::lock_expired("doc1", "partA", "alice");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"lock_expired""#));
        assert!(json.contains("partA"));
    }

    #[test]
    fn test_deadlock_event_payload() {
        let event = CollabEvent::deadlock_resolved(
            "doc1",
            "carol",
            vec!["p3".to_string()],
            vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
        );
        match event.kind {
            CollabEventKind::DeadlockResolved { victim, cycle, .. } => {
                assert_eq!(victim, "carol");
                assert_eq!(cycle.len(), 3);
            }
            _ => panic!("Expected DeadlockResolved"),
        }
    }
}

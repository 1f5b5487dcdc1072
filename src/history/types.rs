//! Change History Records
//!
//! A [`ChangeRecord`] is created the instant the document layer reports an
//! accepted edit; records are bundled into [`ChangeGroup`]s, the atomic
//! unit pushed to the undo/redo stacks.

use crate::shared::operation::{Operation, OperationKind};
use crate::shared::params::ParamMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One accepted edit, with the state snapshots needed to invert it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique change id
    pub id: Uuid,
    /// Actor that made the edit
    pub actor_id: String,
    /// The operation as accepted
    pub operation: Operation,
    /// Object state captured before the edit (absent for Create)
    pub before_state: Option<ParamMap>,
    /// Object state captured after the edit (absent for Delete)
    pub after_state: Option<ParamMap>,
    /// Every object the edit touched
    pub affected_objects: Vec<String>,
    /// Later changes that depend on this one (mirror of the dependency map)
    pub dependents: Vec<Uuid>,
    /// Logical timestamp of the originating operation
    pub timestamp: u64,
    /// Wall-clock instant the change was recorded
    pub recorded_at: DateTime<Utc>,
    /// Free-form metadata
    pub metadata: BTreeMap<String, String>,
}

impl ChangeRecord {
    /// Build a record from an accepted operation and its snapshots
    pub fn from_operation(
        operation: Operation,
        before_state: Option<ParamMap>,
        after_state: Option<ParamMap>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: operation.actor_id.clone(),
            affected_objects: operation.touched_objects(),
            timestamp: operation.timestamp,
            before_state,
            after_state,
            operation,
            dependents: Vec::new(),
            recorded_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }
}

/// An atomic bundle of changes, undone and redone as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeGroup {
    /// Unique group id
    pub id: Uuid,
    /// Member changes in recording order
    pub changes: Vec<ChangeRecord>,
    /// Human-readable description ("extrude pocket", "undo of ...")
    pub description: String,
    /// Actor the group belongs to
    pub actor_id: String,
    /// When the group was opened
    pub created_at: DateTime<Utc>,
}

impl ChangeGroup {
    /// New empty group
    pub fn new(description: &str, actor_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            changes: Vec::new(),
            description: description.to_string(),
            actor_id: actor_id.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Ids of all member changes
    pub fn change_ids(&self) -> Vec<Uuid> {
        self.changes.iter().map(|change| change.id).collect()
    }
}

/// One inverse that failed to apply during a cascade undo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeFailure {
    /// The change whose inverse failed
    pub change_id: Uuid,
    /// Object the inverse targeted, if known
    pub object_id: Option<String>,
    /// What went wrong
    pub message: String,
}

/// Result of an undo or redo call: the group that was moved between the
/// stacks, the groups the cascade had to take with it, and the aggregated
/// failures (empty when the cascade was clean)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoOutcome {
    /// The requested group
    pub group: ChangeGroup,
    /// Ids of dependent groups undone first, most recent first
    pub cascaded_groups: Vec<Uuid>,
    /// Inverse failures, reported once after the whole cascade
    pub failures: Vec<CascadeFailure>,
}

/// Filters for [`get_history`](crate::history::ChangeTracker::get_history)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Only changes by this actor
    pub actor_id: Option<String>,
    /// Only changes touching this object
    pub object_id: Option<String>,
    /// Only changes of this operation kind
    pub kind: Option<OperationKind>,
    /// Only changes with a logical timestamp at or after this
    pub since: Option<u64>,
    /// Only changes with a logical timestamp at or before this
    pub until: Option<u64>,
    /// At most this many records, newest first
    pub limit: Option<usize>,
}

impl HistoryFilter {
    /// Match everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one actor
    pub fn for_actor(actor_id: &str) -> Self {
        Self {
            actor_id: Some(actor_id.to_string()),
            ..Self::default()
        }
    }

    /// Restrict to one object
    pub fn for_object(object_id: &str) -> Self {
        Self {
            object_id: Some(object_id.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn matches(&self, record: &ChangeRecord) -> bool {
        if let Some(actor_id) = &self.actor_id {
            if &record.actor_id != actor_id {
                return false;
            }
        }
        if let Some(object_id) = &self.object_id {
            if !record.affected_objects.iter().any(|object| object == object_id) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if record.operation.kind != kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// Read-only counters for dashboards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStatistics {
    /// Changes currently tracked
    pub total_changes: usize,
    /// Groups on the undo stack
    pub undo_depth: usize,
    /// Groups on the redo stack
    pub redo_depth: usize,
    /// True while a group is open
    pub group_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_operation() {
        let operation = Operation::new(OperationKind::Modify, Some("boxA"), "alice").with_timestamp(3);
        let record = ChangeRecord::from_operation(operation, Some(ParamMap::new()), None);
        assert_eq!(record.actor_id, "alice");
        assert_eq!(record.affected_objects, vec!["boxA"]);
        assert_eq!(record.timestamp, 3);
    }

    #[test]
    fn test_filter_matching() {
        let operation = Operation::new(OperationKind::Move, Some("boxA"), "alice").with_timestamp(5);
        let record = ChangeRecord::from_operation(operation, None, None);

        assert!(HistoryFilter::all().matches(&record));
        assert!(HistoryFilter::for_actor("alice").matches(&record));
        assert!(!HistoryFilter::for_actor("bob").matches(&record));
        assert!(HistoryFilter::for_object("boxA").matches(&record));

        let kind_filter = HistoryFilter {
            kind: Some(OperationKind::Delete),
            ..HistoryFilter::default()
        };
        assert!(!kind_filter.matches(&record));

        let window = HistoryFilter {
            since: Some(4),
            until: Some(6),
            ..HistoryFilter::default()
        };
        assert!(window.matches(&record));
    }
}

//! Operation Types
//!
//! An [`Operation`] is a single proposed edit to one object in a shared CAD
//! document. Operations are authored concurrently by different actors and
//! reconciled by the transform engine before acceptance.
//!
//! # Kinds
//!
//! The kind vocabulary is closed so the transform engine's kind-pair
//! dispatch stays exhaustive: adding a kind forces a compile-time decision
//! in every match.

use crate::shared::params::{referenced_objects, ParamMap, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The kind of edit an operation proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create a new object
    Create,
    /// Modify an object's parameter tree
    Modify,
    /// Delete an object
    Delete,
    /// Translate an object (`offset` vector)
    Move,
    /// Rotate an object (`angles` Euler triple, degrees)
    Rotate,
    /// Scale an object (`factor` component vector)
    Scale,
    /// Change named properties of an object
    PropertyChange,
    /// Add a constraint spanning the `references` objects
    ConstraintAdd,
    /// Remove a constraint spanning the `references` objects
    ConstraintRemove,
    /// The identity operation; absorbed by transform, changes nothing
    NoOp,
}

impl OperationKind {
    /// True for the two constraint kinds
    pub fn is_constraint(&self) -> bool {
        matches!(self, OperationKind::ConstraintAdd | OperationKind::ConstraintRemove)
    }
}

/// A single proposed edit to one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique operation id
    pub id: Uuid,
    /// What the edit does
    pub kind: OperationKind,
    /// Target object id (absent for NoOp and some constraint edits)
    pub target: Option<String>,
    /// Actor who authored the edit
    pub actor_id: String,
    /// Session the edit was authored in
    pub session_id: String,
    /// Logical timestamp assigned at authoring time
    pub timestamp: u64,
    /// Per-object version counter the actor observed
    pub version: u64,
    /// Nested parameter tree carrying the edit payload
    pub params: ParamMap,
    /// Causal parent operation, if any
    pub parent: Option<Uuid>,
    /// Free-form metadata (priority hints, inverse back-references, ...)
    pub metadata: BTreeMap<String, String>,
}

impl Operation {
    /// Create a new operation with a fresh id and empty payload
    pub fn new(kind: OperationKind, target: Option<&str>, actor_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target: target.map(str::to_string),
            actor_id: actor_id.to_string(),
            session_id: String::new(),
            timestamp: 0,
            version: 0,
            params: ParamMap::new(),
            parent: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Create a NoOp authored by `actor_id`
    pub fn noop(actor_id: &str) -> Self {
        Self::new(OperationKind::NoOp, None, actor_id)
    }

    /// Set the logical timestamp
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the session id
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = session_id.to_string();
        self
    }

    /// Set the whole parameter tree
    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.params = params;
        self
    }

    /// Insert a single parameter
    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Set the causal parent
    pub fn with_parent(mut self, parent: Uuid) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Insert a metadata entry
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// True if this operation is the identity
    pub fn is_noop(&self) -> bool {
        self.kind == OperationKind::NoOp
    }

    /// Every object this operation touches: its target plus, for constraint
    /// operations, the objects its `references` list names.
    pub fn touched_objects(&self) -> Vec<String> {
        let mut objects = Vec::new();
        if let Some(target) = &self.target {
            objects.push(target.clone());
        }
        if self.kind.is_constraint() {
            for reference in referenced_objects(&self.params) {
                if !objects.contains(&reference) {
                    objects.push(reference);
                }
            }
        }
        objects
    }

    /// The priority hint carried in metadata, defaulting to 0
    pub fn priority(&self) -> u32 {
        self.metadata
            .get("priority")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    /// Replace this operation with the identity, recording which operation
    /// superseded it. Id, actor and timestamp are preserved for auditing.
    pub fn into_noop(mut self, superseded_by: Uuid) -> Self {
        self.kind = OperationKind::NoOp;
        self.params.clear();
        self.metadata
            .insert("superseded_by".to_string(), superseded_by.to_string());
        self
    }
}

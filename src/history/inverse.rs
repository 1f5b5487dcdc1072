//! Inverse Operation Synthesis
//!
//! Undo never rewinds document state directly; it synthesizes the inverse
//! of each recorded change and hands it to the document-mutation
//! collaborator:
//!
//! - Create and Delete are mutual inverses; Delete's inverse recreates the
//!   object from the captured before-state
//! - Modify, Move, Rotate, Scale and PropertyChange invert by restoring
//!   the captured before-state wholesale (a key the edit added must
//!   disappear again, so overlaying the old values is not enough)
//! - ConstraintAdd and ConstraintRemove are mutual inverses
//!
//! Every synthesized inverse carries an `inverse_of` back-reference to the
//! originating operation.

use crate::history::types::ChangeRecord;
use crate::shared::operation::{Operation, OperationKind};
use crate::shared::params::ParamMap;

/// Synthesize the inverse of a recorded change, or `None` when the change
/// cannot be inverted (NoOp, or a mutation with no captured before-state).
pub fn invert(record: &ChangeRecord) -> Option<Operation> {
    let target = record.operation.target.as_deref()?;
    let (kind, params): (OperationKind, ParamMap) = match record.operation.kind {
        OperationKind::NoOp => return None,
        OperationKind::Create => (OperationKind::Delete, ParamMap::new()),
        OperationKind::Delete => {
            (OperationKind::Create, record.before_state.clone()?)
        }
        // Create semantics replace the whole parameter tree, which is
        // exactly "restore the snapshot"
        OperationKind::Modify
        | OperationKind::Move
        | OperationKind::Rotate
        | OperationKind::Scale
        | OperationKind::PropertyChange => {
            (OperationKind::Create, record.before_state.clone()?)
        }
        OperationKind::ConstraintAdd => {
            (OperationKind::ConstraintRemove, record.operation.params.clone())
        }
        OperationKind::ConstraintRemove => {
            (OperationKind::ConstraintAdd, record.operation.params.clone())
        }
    };

    Some(
        Operation::new(kind, Some(target), &record.actor_id)
            .with_timestamp(record.operation.timestamp)
            .with_params(params)
            .with_parent(record.operation.id)
            .with_metadata("inverse_of", &record.operation.id.to_string()),
    )
}

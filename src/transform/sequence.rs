//! Sequence Projection
//!
//! `apply_operation_sequence` replays a batch of concurrent operations onto
//! an in-memory state map: sort by logical timestamp, pairwise-reduce each
//! incoming operation against every already-accepted one, drop the NoOps
//! that fall out, and apply what remains.
//!
//! This is a projection for testing convergence properties. Authoritative
//! state lives in the document layer, which is out of scope here.

use crate::shared::document::apply_to_objects;
use crate::shared::operation::Operation;
use crate::shared::params::ParamMap;
use crate::transform::engine::{transform, TransformStrategy};
use std::collections::BTreeMap;
use tracing::debug;

/// Object id to parameter tree
pub type ObjectState = BTreeMap<String, ParamMap>;

/// Replay `ops` over `initial_state` under the given strategy.
///
/// Unresolved pairs keep both originals: a projection has no way to ask for
/// a manual decision, so it applies them in timestamp order as-is.
pub fn apply_operation_sequence(
    ops: &[Operation],
    initial_state: &ObjectState,
    strategy: TransformStrategy,
) -> ObjectState {
    let mut ordered: Vec<Operation> = ops.to_vec();
    ordered.sort_by(|a, b| {
        (a.timestamp, &a.actor_id, a.id.to_string()).cmp(&(
            b.timestamp,
            &b.actor_id,
            b.id.to_string(),
        ))
    });

    let mut accepted: Vec<Operation> = Vec::new();
    for incoming in ordered {
        let mut incoming = incoming;
        for prior in accepted.iter_mut() {
            if incoming.is_noop() {
                break;
            }
            let outcome = transform(prior, &incoming, strategy);
            if outcome.resolved {
                *prior = outcome.op1;
                incoming = outcome.op2;
            }
        }
        if incoming.is_noop() {
            debug!(op_id = %incoming.id, "operation absorbed during reduction");
        } else {
            accepted.push(incoming);
        }
        // Reduction can turn earlier acceptances into NoOps as well
        accepted.retain(|op| !op.is_noop());
    }

    let mut state = initial_state.clone();
    for op in &accepted {
        if let Some(target) = &op.target {
            if let Err(error) = apply_to_objects(&mut state, target, op.kind, &op.params) {
                debug!(op_id = %op.id, %error, "projection skipped an inapplicable operation");
            }
        }
    }
    state
}

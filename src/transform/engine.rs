//! # Operation Transform Engine
//!
//! Pure, stateless reconciliation of two concurrently authored operations
//! into an equivalent conflict-free pair. Replicas on every side of a
//! session run the same transform with the same inputs and must reach the
//! same result, so every rule here is deterministic: no clocks, no
//! randomness, no map-iteration-order dependence.
//!
//! ## Dispatch
//!
//! Conflict handling is an exhaustive match over the `(kind, kind)` pair.
//! Adding an [`OperationKind`] forces a compile-time decision in this
//! match rather than a silent runtime fallback.
//!
//! ## Strategies
//!
//! - **Merge**: attempt semantic composition (tree merge, vector addition,
//!   quaternion rotation composition) before falling back to timestamps
//! - **TimestampWins**: later logical timestamp wins, loser becomes NoOp
//! - **PriorityWins**: higher actor priority wins, timestamp breaks ties
//! - **Manual**: conflicting pairs are returned unresolved for an external
//!   decision

use crate::shared::operation::{Operation, OperationKind};
use crate::shared::params::ParamValue;
use crate::transform::geometry::compose_euler_deg;
use crate::transform::merge::merge_maps;
use serde::{Deserialize, Serialize};

/// How conflicting pairs are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStrategy {
    /// Compose both edits when the kinds allow it
    Merge,
    /// Later logical timestamp wins
    TimestampWins,
    /// Higher priority wins, timestamp breaks ties
    PriorityWins,
    /// Return conflicts unresolved
    Manual,
}

/// How a transform decision was reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformMeta {
    /// Name of the rule that fired
    pub rule: &'static str,
    /// Strategy the caller selected
    pub strategy: TransformStrategy,
    /// True if an external manual decision is required
    pub requires_manual: bool,
    /// Optional human-readable detail (e.g. the conflicting merge path)
    pub note: Option<String>,
}

/// The reconciled pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformOutcome {
    /// Transformed first operation
    pub op1: Operation,
    /// Transformed second operation
    pub op2: Operation,
    /// False only when the pair needs a manual decision
    pub resolved: bool,
    /// Decision trail
    pub meta: TransformMeta,
}

impl TransformOutcome {
    fn resolved(op1: Operation, op2: Operation, rule: &'static str, strategy: TransformStrategy) -> Self {
        Self {
            op1,
            op2,
            resolved: true,
            meta: TransformMeta {
                rule,
                strategy,
                requires_manual: false,
                note: None,
            },
        }
    }

    fn unresolved(op1: Operation, op2: Operation, rule: &'static str, strategy: TransformStrategy) -> Self {
        Self {
            op1,
            op2,
            resolved: false,
            meta: TransformMeta {
                rule,
                strategy,
                requires_manual: true,
                note: None,
            },
        }
    }

    fn with_note(mut self, note: String) -> Self {
        self.meta.note = Some(note);
        self
    }
}

/// True when the pair cannot simply commute: same target object, or two
/// constraint operations whose referenced-object sets intersect.
pub fn operations_conflict(op1: &Operation, op2: &Operation) -> bool {
    if op1.is_noop() || op2.is_noop() {
        return false;
    }
    if let (Some(t1), Some(t2)) = (&op1.target, &op2.target) {
        if t1 == t2 {
            return true;
        }
    }
    if op1.kind.is_constraint() && op2.kind.is_constraint() {
        let touched = op1.touched_objects();
        return op2.touched_objects().iter().any(|obj| touched.contains(obj));
    }
    false
}

/// Transform two concurrent operations into a conflict-free pair.
///
/// Pure and side-effect-free. `NoOp` composed with any operation passes
/// both through unchanged, as do pairs with disjoint targets.
pub fn transform(op1: &Operation, op2: &Operation, strategy: TransformStrategy) -> TransformOutcome {
    if op1.is_noop() || op2.is_noop() {
        return TransformOutcome::resolved(op1.clone(), op2.clone(), "noop_identity", strategy);
    }
    if !operations_conflict(op1, op2) {
        return TransformOutcome::resolved(op1.clone(), op2.clone(), "disjoint_targets", strategy);
    }

    use OperationKind::*;
    match (op1.kind, op2.kind) {
        (Modify, Modify) => modify_modify(op1, op2, strategy),
        (Delete, Delete) => delete_delete(op1, op2, strategy),
        (Create, Create) => create_create(op1, op2, strategy),
        (Move, Move) => vector_pair(op1, op2, strategy, "offset", "move_compose", |a, b| {
            [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
        }),
        (Scale, Scale) => vector_pair(op1, op2, strategy, "factor", "scale_compose", |a, b| {
            [a[0] * b[0], a[1] * b[1], a[2] * b[2]]
        }),
        (Rotate, Rotate) => rotate_rotate(op1, op2, strategy),
        (PropertyChange, PropertyChange) => property_property(op1, op2, strategy),
        (ConstraintAdd | ConstraintRemove, ConstraintAdd | ConstraintRemove) => {
            constraint_constraint(op1, op2, strategy)
        }
        // Delete dominates every other mutation of the same object
        (_, Delete) => TransformOutcome::resolved(
            op1.clone().into_noop(op2.id),
            op2.clone(),
            "delete_dominates",
            strategy,
        ),
        (Delete, _) => TransformOutcome::resolved(
            op1.clone(),
            op2.clone().into_noop(op1.id),
            "delete_dominates",
            strategy,
        ),
        // Remaining mixed pairs touch independent aspects of the object
        // (e.g. a Move and a PropertyChange) and commute unchanged.
        _ => TransformOutcome::resolved(op1.clone(), op2.clone(), "commutes", strategy),
    }
}

/// Deterministic total order: timestamp, then actor id, then operation id.
/// Returns true when `op1` is the later of the pair.
fn first_is_later(op1: &Operation, op2: &Operation) -> bool {
    (op1.timestamp, &op1.actor_id, op1.id.to_string())
        > (op2.timestamp, &op2.actor_id, op2.id.to_string())
}

/// The strategy-selectable fallback shared by every rule that cannot
/// compose: later-wins, priority-weighted, or unresolved. A failed Merge
/// decides like TimestampWins.
fn fallback(
    op1: &Operation,
    op2: &Operation,
    strategy: TransformStrategy,
    rule: &'static str,
) -> TransformOutcome {
    let first_wins = match strategy {
        TransformStrategy::Manual => {
            return TransformOutcome::unresolved(op1.clone(), op2.clone(), rule, strategy);
        }
        TransformStrategy::PriorityWins => {
            if op1.priority() != op2.priority() {
                op1.priority() > op2.priority()
            } else {
                first_is_later(op1, op2)
            }
        }
        // A failed Merge falls back to the timestamp decision
        TransformStrategy::Merge | TransformStrategy::TimestampWins => first_is_later(op1, op2),
    };

    if first_wins {
        TransformOutcome::resolved(op1.clone(), op2.clone().into_noop(op1.id), rule, strategy)
    } else {
        TransformOutcome::resolved(op1.clone().into_noop(op2.id), op2.clone(), rule, strategy)
    }
}

fn modify_modify(op1: &Operation, op2: &Operation, strategy: TransformStrategy) -> TransformOutcome {
    if strategy == TransformStrategy::Merge {
        match merge_maps(&op1.params, &op2.params) {
            Ok(merged) => {
                let winner = op1.clone().with_params(merged);
                let loser = op2.clone().into_noop(op1.id);
                return TransformOutcome::resolved(winner, loser, "modify_merge", strategy);
            }
            Err(conflict) => {
                return fallback(op1, op2, strategy, "modify_timestamp")
                    .with_note(format!("merge conflict at '{}'", conflict.path));
            }
        }
    }
    fallback(op1, op2, strategy, "modify_timestamp")
}

fn delete_delete(op1: &Operation, op2: &Operation, strategy: TransformStrategy) -> TransformOutcome {
    // Earlier delete wins; the later one has nothing left to remove
    if first_is_later(op1, op2) {
        TransformOutcome::resolved(op1.clone().into_noop(op2.id), op2.clone(), "delete_earlier_wins", strategy)
    } else {
        TransformOutcome::resolved(op1.clone(), op2.clone().into_noop(op1.id), "delete_earlier_wins", strategy)
    }
}

fn create_create(op1: &Operation, op2: &Operation, strategy: TransformStrategy) -> TransformOutcome {
    // Generated-id collision: deterministically suffix the later create so
    // neither overwrites the other
    let mut op1 = op1.clone();
    let mut op2 = op2.clone();
    let (later, earlier_actor) = if first_is_later(&op1, &op2) {
        (&mut op1, op2.actor_id.clone())
    } else {
        (&mut op2, op1.actor_id.clone())
    };
    if let Some(target) = later.target.clone() {
        let suffix = if later.actor_id != earlier_actor {
            later.actor_id.clone()
        } else {
            later.id.to_string()
        };
        later.target = Some(format!("{}_{}", target, suffix));
    }
    TransformOutcome::resolved(op1, op2, "create_suffix", strategy)
}

fn vector_pair(
    op1: &Operation,
    op2: &Operation,
    strategy: TransformStrategy,
    key: &str,
    rule: &'static str,
    compose: impl Fn([f64; 3], [f64; 3]) -> [f64; 3],
) -> TransformOutcome {
    if strategy == TransformStrategy::Merge {
        let v1 = op1.params.get(key).and_then(|value| value.as_vec3());
        let v2 = op2.params.get(key).and_then(|value| value.as_vec3());
        if let (Some(v1), Some(v2)) = (v1, v2) {
            let winner = op1
                .clone()
                .with_param(key, ParamValue::vec3(compose(v1, v2)));
            let loser = op2.clone().into_noop(op1.id);
            return TransformOutcome::resolved(winner, loser, rule, strategy);
        }
    }
    fallback(op1, op2, strategy, rule)
}

fn rotate_rotate(op1: &Operation, op2: &Operation, strategy: TransformStrategy) -> TransformOutcome {
    if strategy == TransformStrategy::Merge {
        let a1 = op1.params.get("angles").and_then(|value| value.as_vec3());
        let a2 = op2.params.get("angles").and_then(|value| value.as_vec3());
        if let (Some(a1), Some(a2)) = (a1, a2) {
            // Compose earlier-first so both replicas pick the same order
            let composed = if first_is_later(op1, op2) {
                compose_euler_deg(a2, a1)
            } else {
                compose_euler_deg(a1, a2)
            };
            let winner = op1.clone().with_param("angles", ParamValue::vec3(composed));
            let loser = op2.clone().into_noop(op1.id);
            return TransformOutcome::resolved(winner, loser, "rotate_compose", strategy);
        }
    }
    fallback(op1, op2, strategy, "rotate_compose")
}

fn property_property(
    op1: &Operation,
    op2: &Operation,
    strategy: TransformStrategy,
) -> TransformOutcome {
    let overlapping = op1.params.keys().any(|key| op2.params.contains_key(key));
    if !overlapping {
        // Disjoint property names both apply, collapsed into one operation
        let mut union = op1.params.clone();
        for (key, value) in &op2.params {
            union.insert(key.clone(), value.clone());
        }
        let winner = op1.clone().with_params(union);
        let loser = op2.clone().into_noop(op1.id);
        return TransformOutcome::resolved(winner, loser, "property_union", strategy);
    }
    modify_modify(op1, op2, strategy)
}

fn constraint_constraint(
    op1: &Operation,
    op2: &Operation,
    strategy: TransformStrategy,
) -> TransformOutcome {
    // Referenced sets overlap (operations_conflict said so). The timestamp
    // rule applies; an exact timestamp tie is ambiguous and goes back to
    // the caller unresolved.
    if op1.timestamp == op2.timestamp {
        return TransformOutcome::unresolved(op1.clone(), op2.clone(), "constraint_ambiguous", strategy);
    }
    fallback(op1, op2, strategy, "constraint_timestamp")
}

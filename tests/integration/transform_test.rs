//! Transform engine integration tests
//!
//! Session-level flows: concurrent edits from several actors reconciled
//! through the engine and projected onto document state.

use crate::common::fixtures::*;
use xfcad::shared::{OperationKind, ParamValue};
use xfcad::transform::{apply_operation_sequence, transform, ObjectState, TransformStrategy};

#[test]
fn test_concurrent_disjoint_modifies_merge_into_one() {
    // Two actors edit different parameters of the same object
    let op1 = modify("boxA", "alice", 1, "color", "red");
    let op2 = modify("boxA", "bob", 2, "size", 5.0);

    let outcome = transform(&op1, &op2, TransformStrategy::Merge);
    assert!(outcome.resolved);
    assert_eq!(outcome.meta.rule, "modify_merge");
    assert_eq!(outcome.op1.params.get("color"), Some(&"red".into()));
    assert_eq!(outcome.op1.params.get("size"), Some(&5.0.into()));
    assert!(outcome.op2.is_noop());
}

#[test]
fn test_concurrent_rotations_compose() {
    // Two 90-degree rotations about Z become a single 180-degree rotation
    let op1 = rotate("boxA", "alice", 1, [0.0, 0.0, 90.0]);
    let op2 = rotate("boxA", "bob", 2, [0.0, 0.0, 90.0]);

    let outcome = transform(&op1, &op2, TransformStrategy::Merge);
    assert!(outcome.resolved);
    assert_eq!(outcome.meta.rule, "rotate_compose");
    let composed = outcome.op1.params.get("angles").unwrap().as_vec3().unwrap();
    assert!((composed[2].abs() - 180.0).abs() < 1e-6, "got {:?}", composed);
    assert!(composed[0].abs() < 1e-6 && composed[1].abs() < 1e-6);
}

#[test]
fn test_divergent_scalar_conflicts_fall_back_to_timestamp() {
    let op1 = modify("boxA", "alice", 5, "color", "red");
    let op2 = modify("boxA", "bob", 2, "color", "blue");

    let outcome = transform(&op1, &op2, TransformStrategy::Merge);
    assert!(outcome.resolved);
    assert!(outcome.op2.is_noop(), "earlier edit must lose");
    assert_eq!(outcome.op1.params.get("color"), Some(&"red".into()));
    assert!(outcome.meta.note.as_deref().unwrap().contains("color"));
}

#[test]
fn test_manual_strategy_returns_conflicts_undecided() {
    let op1 = modify("boxA", "alice", 5, "color", "red");
    let op2 = modify("boxA", "bob", 2, "color", "blue");

    let outcome = transform(&op1, &op2, TransformStrategy::Manual);
    assert!(!outcome.resolved);
    assert!(outcome.meta.requires_manual);
    // Both originals come back untouched
    assert_eq!(outcome.op1, op1);
    assert_eq!(outcome.op2, op2);
}

#[test]
fn test_priority_wins_overrides_timestamps() {
    let op1 = modify("boxA", "alice", 1, "color", "red").with_metadata("priority", "9");
    let op2 = modify("boxA", "bob", 9, "color", "blue");

    let outcome = transform(&op1, &op2, TransformStrategy::PriorityWins);
    assert!(outcome.resolved);
    assert!(outcome.op2.is_noop(), "higher priority beats later timestamp");
}

#[test]
fn test_delete_dominates_concurrent_modify() {
    let op1 = modify("boxA", "alice", 3, "color", "red");
    let op2 = xfcad::Operation::new(OperationKind::Delete, Some("boxA"), "bob").with_timestamp(1);

    let outcome = transform(&op1, &op2, TransformStrategy::Merge);
    assert_eq!(outcome.meta.rule, "delete_dominates");
    assert!(outcome.op1.is_noop());
    assert_eq!(outcome.op2.kind, OperationKind::Delete);
}

#[test]
fn test_replicas_converge_regardless_of_arrival_order() {
    let ops = vec![
        create("boxA", "alice", 1),
        move_op("boxA", "alice", 2, [1.0, 0.0, 0.0]),
        move_op("boxA", "bob", 3, [0.0, 2.0, 0.0]),
        modify("boxA", "carol", 4, "color", "red"),
    ];
    let mut reversed = ops.clone();
    reversed.reverse();

    let initial = ObjectState::new();
    let state1 = apply_operation_sequence(&ops, &initial, TransformStrategy::Merge);
    let state2 = apply_operation_sequence(&reversed, &initial, TransformStrategy::Merge);
    assert_eq!(state1, state2);

    let object = state1.get("boxA").unwrap();
    assert_eq!(
        object.get("position").unwrap().as_vec3(),
        Some([1.0, 2.0, 0.0])
    );
    assert_eq!(object.get("color"), Some(&"red".into()));
}

#[test]
fn test_sequence_drops_edits_behind_a_delete() {
    let ops = vec![
        create("boxA", "alice", 1),
        xfcad::Operation::new(OperationKind::Delete, Some("boxA"), "bob").with_timestamp(2),
        modify("boxA", "carol", 3, "color", "red"),
    ];
    let state = apply_operation_sequence(&ops, &ObjectState::new(), TransformStrategy::Merge);
    assert!(state.get("boxA").is_none());
}

#[test]
fn test_constraint_timestamp_tie_needs_manual_decision() {
    let op1 = xfcad::Operation::new(OperationKind::ConstraintAdd, Some("asm1"), "alice")
        .with_timestamp(7)
        .with_param("references", ParamValue::List(vec!["partA".into(), "partB".into()]));
    let op2 = xfcad::Operation::new(OperationKind::ConstraintRemove, Some("asm2"), "bob")
        .with_timestamp(7)
        .with_param("references", ParamValue::List(vec!["partB".into(), "partC".into()]));

    let outcome = transform(&op1, &op2, TransformStrategy::Merge);
    assert!(!outcome.resolved);
    assert_eq!(outcome.meta.rule, "constraint_ambiguous");
}

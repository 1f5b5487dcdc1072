//! Property-based tests for the transform engine

use crate::common::fixtures::*;
use proptest::prelude::*;
use xfcad::shared::Operation;
use xfcad::transform::{apply_operation_sequence, transform, ObjectState, TransformStrategy};

fn actor() -> impl Strategy<Value = String> {
    prop_oneof![Just("alice".to_string()), Just("bob".to_string()), Just("carol".to_string())]
}

proptest! {
    #[test]
    fn test_noop_never_changes_the_other_operation(ts in 0..1_000u64, a in actor()) {
        let noop = Operation::noop("system");
        let op = modify("boxA", &a, ts, "color", "red");
        let outcome = transform(&noop, &op, TransformStrategy::Merge);
        prop_assert!(outcome.resolved);
        prop_assert_eq!(outcome.op2, op);
    }

    #[test]
    fn test_disjoint_targets_always_pass_through(
        ts1 in 0..1_000u64,
        ts2 in 0..1_000u64,
        a1 in actor(),
        a2 in actor(),
    ) {
        let op1 = modify("boxA", &a1, ts1, "color", "red");
        let op2 = modify("boxB", &a2, ts2, "color", "blue");
        let outcome = transform(&op1, &op2, TransformStrategy::Merge);
        prop_assert!(outcome.resolved);
        prop_assert_eq!(outcome.op1, op1);
        prop_assert_eq!(outcome.op2, op2);
    }

    #[test]
    fn test_transform_is_deterministic(
        ts1 in 0..100u64,
        ts2 in 0..100u64,
        v1 in -100.0..100.0f64,
        v2 in -100.0..100.0f64,
    ) {
        let op1 = modify("boxA", "alice", ts1, "size", v1);
        let op2 = modify("boxA", "bob", ts2, "size", v2);
        let first = transform(&op1, &op2, TransformStrategy::TimestampWins);
        let second = transform(&op1, &op2, TransformStrategy::TimestampWins);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_exactly_one_side_survives_a_scalar_conflict(
        ts1 in 0..100u64,
        ts2 in 0..100u64,
    ) {
        let op1 = modify("boxA", "alice", ts1, "color", "red");
        let op2 = modify("boxA", "bob", ts2, "color", "blue");
        let outcome = transform(&op1, &op2, TransformStrategy::TimestampWins);
        prop_assert!(outcome.resolved);
        prop_assert!(outcome.op1.is_noop() != outcome.op2.is_noop());
    }

    #[test]
    fn test_move_sequences_converge_across_arrival_orders(
        dx1 in -10.0..10.0f64,
        dy2 in -10.0..10.0f64,
    ) {
        let ops = vec![
            create("boxA", "alice", 1),
            move_op("boxA", "alice", 2, [dx1, 0.0, 0.0]),
            move_op("boxA", "bob", 3, [0.0, dy2, 0.0]),
        ];
        let mut reversed = ops.clone();
        reversed.reverse();

        let initial = ObjectState::new();
        let forward = apply_operation_sequence(&ops, &initial, TransformStrategy::Merge);
        let backward = apply_operation_sequence(&reversed, &initial, TransformStrategy::Merge);
        prop_assert_eq!(forward, backward);
    }
}

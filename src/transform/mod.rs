//! Operation Transform Engine
//!
//! Pure reconciliation of concurrently authored operations. See
//! [`engine::transform`] for the contract and
//! [`sequence::apply_operation_sequence`] for the testing projection.

/// Per-kind-pair transform rules and strategies
pub mod engine;

/// Rotation composition via quaternions
pub mod geometry;

/// Recursive parameter-tree merge
pub mod merge;

/// Timestamp-ordered sequence projection
pub mod sequence;

pub use engine::{operations_conflict, transform, TransformMeta, TransformOutcome, TransformStrategy};
pub use sequence::{apply_operation_sequence, ObjectState};

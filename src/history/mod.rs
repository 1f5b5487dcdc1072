//! Change & Undo Tracker
//!
//! Dependency-aware history over accepted edits: bounded change log,
//! grouped undo/redo stacks, inverse synthesis and cascading undo. See
//! [`tracker::ChangeTracker`] for the entry point.

/// Inverse operation synthesis
pub mod inverse;

/// The change tracker itself
pub mod tracker;

/// Change record and group types
pub mod types;

pub use inverse::invert;
pub use tracker::ChangeTracker;
pub use types::{
    CascadeFailure, ChangeGroup, ChangeRecord, HistoryFilter, TrackerStatistics, UndoOutcome,
};

//! Collaborative Lock Manager
//!
//! Pessimistic per-object exclusion with atomic batch grants, a fair
//! pending queue, TTL expiry, transactions, and wait-for-graph deadlock
//! detection. See [`manager::LockManager`] for the entry point.

/// The lock manager itself
pub mod manager;

/// Wait-for graph analysis
pub mod deadlock;

/// Advisory cross-process mirror
pub mod mirror;

/// Lock record types
pub mod types;

pub use manager::LockManager;
pub use mirror::{LockMirror, MemoryMirror, NoopMirror};
pub use types::{Lock, LockKind, LockRequest, LockResult, LockStatistics, LockStatus, Transaction};

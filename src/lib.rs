//! XFCad Collab - Concurrency Core
//!
//! XFCad Collab is the collaborative-editing concurrency core for shared
//! CAD documents: it reconciles concurrently authored edits, arbitrates
//! object ownership, and keeps a dependency-aware undo history.
//!
//! # Overview
//!
//! The crate provides three cooperating components:
//!
//! - Operation transformation against concurrent edits, with pluggable
//!   conflict-resolution strategies
//! - Pessimistic per-object locking with atomic batch grants, waiting,
//!   TTL expiry, transactions and deadlock detection
//! - Change tracking with grouped undo/redo and cascading undo over
//!   dependent changes
//!
//! # Module Structure
//!
//! The library is organized into four modules:
//!
//! - **`shared`** - Types common to all three components
//!   - Operation and parameter-tree vocabulary
//!   - Error, event and configuration types
//!   - The [`shared::DocumentStore`] boundary to the document layer
//!
//! - **`transform`** - Operation Transform Engine
//!   - Pure, deterministic kind-pair transform rules
//!   - Quaternion rotation composition and recursive parameter merge
//!   - Timestamp-ordered sequence projection for convergence checks
//!
//! - **`locks`** - Collaborative Lock Manager
//!   - Batch-atomic acquire, queueing and fair grants
//!   - Expiry sweep, transactions, wait-for-graph deadlock detection
//!   - Advisory cross-process lock mirror
//!
//! - **`history`** - Change & Undo Tracker
//!   - Bounded change log with dependency edges
//!   - Grouped undo/redo stacks and cascading undo
//!   - Inverse operation synthesis
//!
//! # Usage
//!
//! ```rust,no_run
//! use xfcad::locks::{LockManager, LockRequest};
//! use xfcad::shared::LockConfig;
//!
//! # async fn example() {
//! let manager = LockManager::new(LockConfig::default());
//! let result = manager
//!     .acquire("doc1", LockRequest::exclusive("alice", vec!["partA".into()]))
//!     .await
//!     .unwrap();
//! assert!(result.success);
//! # }
//! ```

pub mod history;
pub mod locks;
pub mod shared;
pub mod transform;

pub use history::ChangeTracker;
pub use locks::LockManager;
pub use shared::{CollabConfig, CollabError, Operation, OperationKind};
pub use transform::{transform, TransformStrategy};

//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the three components of the concurrency core: the transform engine, the
//! lock manager, and the change tracker.
//!
//! # Overview
//!
//! The shared module provides the operation vocabulary, the typed parameter
//! tree, error and event types, configuration, and the trait boundary to
//! the out-of-scope document-mutation layer. All record types are designed
//! for serialization so the session layer can forward them untouched.

/// Operation and kind vocabulary
pub mod operation;

/// Typed parameter trees
pub mod params;

/// Shared error types
pub mod error;

/// Asynchronous notification events
pub mod event;

/// Core configuration
pub mod config;

/// Document-mutation collaborator trait
pub mod document;

/// Re-export commonly used types for convenience
pub use config::{CollabConfig, ConfigError, HistoryConfig, LockConfig};
pub use document::{DocumentStore, MemoryDocumentStore};
pub use error::CollabError;
pub use event::{CollabEvent, CollabEventKind};
pub use operation::{Operation, OperationKind};
pub use params::{ParamMap, ParamValue};

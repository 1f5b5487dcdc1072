//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Operation builders
//! - Lock manager fixtures with quiet background cadences

pub mod fixtures;

// Re-export commonly used utilities
pub use fixtures::*;

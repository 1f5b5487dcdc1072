//! Integration tests across the three components

pub mod locking_test;
pub mod transform_test;
pub mod undo_test;

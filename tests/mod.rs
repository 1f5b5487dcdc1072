//! Test suite for XFCad Collab
//!
//! This module organizes all tests

pub mod common;
pub mod integration;
pub mod property;

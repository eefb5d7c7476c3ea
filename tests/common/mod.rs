//! Common utilities for integration tests

#![allow(dead_code)]

pub mod mock_models;
pub mod test_helpers;

// Re-export commonly used items
pub use mock_models::{CountingSolver, ScalarDecay, heat_affine, heat_sine};
pub use test_helpers::{orders_from_errors, run, temporal_orders, tight};

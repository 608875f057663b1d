//! Domain models for the inventory planner
//!
//! Re-exports models from the shared crate

pub use shared::models::*;

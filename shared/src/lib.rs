//! Shared types and models for the multi-store inventory planner
//!
//! This crate contains the domain types exchanged between the decision
//! engine, the order ledger, and the HTTP facade. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;

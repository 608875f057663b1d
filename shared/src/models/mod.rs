//! Domain models for the inventory planner

mod catalog;
mod cell;
mod order;
mod planning;
mod transfer;

pub use catalog::*;
pub use cell::*;
pub use order::*;
pub use planning::*;
pub use transfer::*;

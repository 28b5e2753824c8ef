//! Relay State
//!
//! The latest-position record and the store that guards it.
//! Everything here is in-memory and never fails.

pub mod position;
pub mod store;

pub use position::{Position, PositionSnapshot, PositionUpdate};
pub use store::{HealthReport, PositionStore};

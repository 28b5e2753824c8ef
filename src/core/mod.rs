//! Core Primitives
//!
//! Pure helpers with no knowledge of HTTP or shared state.

pub mod clock;
pub mod coords;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coords::{SourcePoint, TargetPoint, SOURCE_HEIGHT, SOURCE_WIDTH};

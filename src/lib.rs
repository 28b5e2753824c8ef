//! # Position Bridge
//!
//! Relays the latest player position from a PS2 game client to a Roblox client.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     POSITION BRIDGE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── clock.rs    - Wall clock abstraction (system / manual)  │
//! │  └── coords.rs   - Source-space clamping and conversion      │
//! │                                                              │
//! │  relay/          - Shared position state                     │
//! │  ├── position.rs - Position record and validated updates     │
//! │  └── store.rs    - Single-slot store with derived staleness  │
//! │                                                              │
//! │  network/        - HTTP surface                              │
//! │  ├── config.rs   - Environment configuration                 │
//! │  ├── protocol.rs - Request decoding and response bodies      │
//! │  ├── router.rs   - Route dispatch, CORS, error boundary      │
//! │  ├── page.rs     - Landing page                              │
//! │  └── server.rs   - hyper/tokio accept loop                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coordinate Spaces
//!
//! The producer reports positions in a `640 x 448` source space. The consumer
//! expects a discrete target space of roughly `[-50, 50)` per axis, derived with
//! `floor(((v / extent) - 0.5) * 100)`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod network;
pub mod relay;

// Re-export commonly used types
pub use self::core::clock::{Clock, ManualClock, SystemClock};
pub use self::core::coords::{SourcePoint, TargetPoint};
pub use network::{BridgeServer, CoordinatePolicy, ServerConfig};
pub use relay::position::{Position, PositionSnapshot, PositionUpdate};
pub use relay::store::{HealthReport, PositionStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Human-readable service name.
pub const SERVICE_NAME: &str = "PS2 -> Roblox Bridge";

/// Age (ms) after which the stored position is reported stale.
pub const STALE_THRESHOLD_MS: i64 = 5000;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

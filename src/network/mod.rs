//! Network Layer
//!
//! HTTP surface of the bridge. Decodes and validates requests, then calls
//! into [`crate::relay::store::PositionStore`].

pub mod config;
pub mod page;
pub mod protocol;
pub mod router;
pub mod server;

pub use config::{ConfigError, CoordinatePolicy, ServerConfig};
pub use protocol::{MoveRequest, MoveResponse, RequestError};
pub use router::{Router, ROUTES};
pub use server::{BridgeServer, BridgeServerError};

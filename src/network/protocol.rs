//! Protocol Messages
//!
//! Request decoding for `/move` and the JSON bodies every route returns.
//! All coordinate validation happens here, before the store is touched.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::coords::SourcePoint;
use crate::network::config::CoordinatePolicy;
use crate::relay::position::{PositionSnapshot, PositionUpdate};
use crate::relay::store::HealthReport;

// =============================================================================
// REQUEST ERRORS
// =============================================================================

/// Reasons a `/move` request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Body is not a JSON object.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// Body exceeds the configured limit.
    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge {
        /// Configured limit.
        limit: usize,
    },

    /// `x` or `y` absent (strict policy).
    #[error("Missing coordinates")]
    MissingCoordinates,

    /// `x` or `y` present but not a finite number (strict policy).
    #[error("Invalid coordinate '{field}': expected a number")]
    InvalidCoordinate {
        /// Offending field name.
        field: &'static str,
    },
}

impl RequestError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// A numeric field as sent by the producer.
///
/// Accepts JSON numbers and numeric strings. Anything else is kept so it can
/// be reported as invalid instead of failing the whole body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    /// JSON number.
    Number(f64),
    /// String that may hold a number (query strings, loose clients).
    Text(String),
    /// Any other JSON value.
    Other(Value),
}

impl Numeric {
    /// Finite numeric value, if there is one.
    pub fn value(&self) -> Option<f64> {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Other(_) => return None,
        };
        v.is_finite().then_some(v)
    }
}

/// Raw `/move` payload, from a JSON body or a query string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MoveRequest {
    /// Source X.
    #[serde(default)]
    pub x: Option<Numeric>,
    /// Source Y.
    #[serde(default)]
    pub y: Option<Numeric>,
    /// Explicit target X.
    #[serde(default)]
    pub roblox_x: Option<Numeric>,
    /// Explicit target Y.
    #[serde(default)]
    pub roblox_y: Option<Numeric>,
    /// Producer timestamp (epoch ms).
    #[serde(default)]
    pub timestamp: Option<Numeric>,
}

impl MoveRequest {
    /// Decode a request body.
    ///
    /// The body must be a JSON object regardless of the declared content
    /// type, so `text/plain` bodies holding JSON are accepted. An empty body
    /// decodes as `{}`.
    pub fn from_body(body: &[u8]) -> Result<Self, RequestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RequestError::MalformedBody(e.to_string()))?;

        if !value.is_object() {
            return Err(RequestError::MalformedBody("expected a JSON object".to_string()));
        }

        serde_json::from_value(value).map_err(|e| RequestError::MalformedBody(e.to_string()))
    }

    /// Decode a URL query string (`x=1&y=2`).
    ///
    /// Repeated keys keep the last value.
    pub fn from_query(query: &str) -> Result<Self, RequestError> {
        let fields: Map<String, Value> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| RequestError::MalformedBody(e.to_string()))
    }

    /// Validate into a store update under `policy`.
    pub fn into_update(self, policy: CoordinatePolicy) -> Result<PositionUpdate, RequestError> {
        let x = resolve_axis(self.x.as_ref(), "x", SourcePoint::CENTER.x, policy)?;
        let y = resolve_axis(self.y.as_ref(), "y", SourcePoint::CENTER.y, policy)?;

        let mut update = PositionUpdate::from_source(x, y);

        let target = self
            .roblox_x
            .as_ref()
            .and_then(Numeric::value)
            .zip(self.roblox_y.as_ref().and_then(Numeric::value));
        if let Some((tx, ty)) = target {
            update = update.with_target(tx, ty);
        }

        if let Some(ts) = self.timestamp.as_ref().and_then(Numeric::value) {
            // Saturating float-to-int; fractional milliseconds are dropped
            update = update.with_timestamp(ts as i64);
        }

        Ok(update)
    }
}

fn resolve_axis(
    field: Option<&Numeric>,
    name: &'static str,
    center: f64,
    policy: CoordinatePolicy,
) -> Result<f64, RequestError> {
    match (field, policy) {
        (None, CoordinatePolicy::Strict) => Err(RequestError::MissingCoordinates),
        (None, CoordinatePolicy::Lenient) => Ok(center),
        (Some(n), policy) => match (n.value(), policy) {
            (Some(v), _) => Ok(v),
            (None, CoordinatePolicy::Strict) => {
                Err(RequestError::InvalidCoordinate { field: name })
            }
            (None, CoordinatePolicy::Lenient) => Ok(center),
        },
    }
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// Successful `/move` reply.
#[derive(Debug, Clone, Serialize)]
pub struct MoveResponse {
    /// Always `true`.
    pub success: bool,
    /// Stored position after the write.
    pub position: PositionSnapshot,
    /// Human-readable summary.
    pub message: String,
}

impl MoveResponse {
    /// Wrap an accepted write.
    pub fn accepted(position: PositionSnapshot) -> Self {
        Self {
            success: true,
            message: format!("Position updated (#{})", position.position.update_count),
            position,
        }
    }
}

/// Failure reply shared by every route.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Error description.
    pub error: String,
}

impl ErrorResponse {
    /// Build from any message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// `GET /status` reply.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Service state, always `"online"` when answering.
    pub status: &'static str,
    /// Seconds since start.
    pub uptime: f64,
    /// Whether the producer wrote within the stale threshold.
    pub connected: bool,
    /// `"connected"` or `"disconnected"`.
    pub connection: &'static str,
    /// Milliseconds since the last accepted write.
    #[serde(rename = "dataAge")]
    pub data_age: i64,
    /// Accepted writes since start.
    #[serde(rename = "updateCount")]
    pub update_count: u64,
    /// Current position view.
    pub position: PositionSnapshot,
}

impl StatusResponse {
    /// Build from a health report.
    pub fn from_health(health: HealthReport, stale_threshold_ms: i64) -> Self {
        let connected = health.position.data_age < stale_threshold_ms;
        Self {
            status: "online",
            uptime: health.uptime,
            connected,
            connection: if connected { "connected" } else { "disconnected" },
            data_age: health.position.data_age,
            update_count: health.update_count,
            position: health.position,
        }
    }
}

/// `GET /health` reply.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when answering.
    pub status: &'static str,
    /// Seconds since start.
    pub uptime: f64,
    /// Accepted writes since start.
    #[serde(rename = "totalUpdates")]
    pub total_updates: u64,
    /// Current position view.
    #[serde(rename = "currentPosition")]
    pub current_position: PositionSnapshot,
}

impl From<HealthReport> for HealthResponse {
    fn from(health: HealthReport) -> Self {
        Self {
            status: "healthy",
            uptime: health.uptime,
            total_updates: health.update_count,
            current_position: health.position,
        }
    }
}

/// A route the server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    /// HTTP method.
    pub method: &'static str,
    /// Request path.
    pub path: &'static str,
    /// What the route does.
    pub description: &'static str,
}

impl RouteInfo {
    /// `"METHOD /path"` label.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// `GET /` reply for non-browser clients.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: String,
    /// Always `"online"` when answering.
    pub status: &'static str,
    /// Seconds since start.
    pub uptime: f64,
    /// Accepted writes since start.
    #[serde(rename = "updateCount")]
    pub update_count: u64,
    /// Current position view.
    pub position: PositionSnapshot,
    /// Served routes.
    pub endpoints: Vec<RouteInfo>,
}

/// `404` reply.
#[derive(Debug, Clone, Serialize)]
pub struct NotFoundResponse {
    /// Always `false`.
    pub success: bool,
    /// Always `"Not found"`.
    pub error: &'static str,
    /// Requested method.
    pub method: String,
    /// Requested path.
    pub path: String,
    /// `"METHOD /path"` for every served route.
    #[serde(rename = "availableRoutes")]
    pub available_routes: Vec<String>,
}

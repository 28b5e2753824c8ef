//! Request Router
//!
//! Maps HTTP requests onto [`PositionStore`] operations.
//! Handles CORS, request ids, body limits and the panic boundary, so the
//! store only ever sees validated updates.

use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::network::config::{CoordinatePolicy, ServerConfig};
use crate::network::page::{wants_html, LANDING_PAGE};
use crate::network::protocol::{
    ErrorResponse, HealthResponse, MoveRequest, MoveResponse, NotFoundResponse, RequestError,
    RouteInfo, ServiceInfo, StatusResponse,
};
use crate::relay::position::PositionUpdate;
use crate::relay::store::PositionStore;
use crate::{SERVICE_NAME, VERSION};

/// Body type of every response.
pub type ResponseBody = Full<Bytes>;

/// Request id header.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Routes the server answers, in the order they are advertised.
pub const ROUTES: &[RouteInfo] = &[
    RouteInfo { method: "POST", path: "/move", description: "Submit a position (JSON body)" },
    RouteInfo { method: "GET", path: "/move", description: "Submit a position (query string)" },
    RouteInfo { method: "GET", path: "/position", description: "Latest position with staleness" },
    RouteInfo { method: "GET", path: "/status", description: "Uptime, feed state and position" },
    RouteInfo { method: "GET", path: "/health", description: "Liveness and update count" },
    RouteInfo { method: "GET", path: "/", description: "Service info or live HTML view" },
];

const INTERNAL_ERROR_BODY: &[u8] = br#"{"success":false,"error":"Internal server error"}"#;

/// Dispatches requests against a shared store.
#[derive(Clone)]
pub struct Router {
    store: Arc<PositionStore>,
    policy: CoordinatePolicy,
    max_body_bytes: usize,
}

impl Router {
    /// Create a router over `store` using the policy and limits in `config`.
    pub fn new(store: Arc<PositionStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            policy: config.coordinate_policy,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<PositionStore> {
        &self.store
    }

    /// Handle one request. Never fails; errors become JSON responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "request",
            id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        async move {
            info!("{} {}", req.method(), req.uri().path());

            let mut response = guarded(self.dispatch(req)).await;
            apply_cors(response.headers_mut());
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            debug!("-> {}", response.status().as_u16());
            response
        }
        .instrument(span)
        .await
    }

    async fn dispatch<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match (&method, path.as_str()) {
            (&Method::OPTIONS, _) => empty_response(StatusCode::NO_CONTENT),
            (&Method::POST, "/move") => self.post_move(req).await,
            (&Method::GET, "/move") => {
                let query = req.uri().query().unwrap_or("").to_string();
                self.get_move(&query).await
            }
            (&Method::GET, "/position") => {
                json_response(StatusCode::OK, &self.store.snapshot().await)
            }
            (&Method::GET, "/status") => self.status().await,
            (&Method::GET, "/health") => {
                let health = HealthResponse::from(self.store.health().await);
                json_response(StatusCode::OK, &health)
            }
            (&Method::GET, "/") => {
                let accept = req.headers().get(ACCEPT).and_then(|v| v.to_str().ok());
                let html = wants_html(accept);
                self.landing(html).await
            }
            _ => not_found(&method, &path),
        }
    }

    async fn post_move<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let update = match read_body(req.into_body(), self.max_body_bytes).await {
            Ok(body) => MoveRequest::from_body(&body).and_then(|r| r.into_update(self.policy)),
            Err(e) => Err(e),
        };
        self.apply_move(update).await
    }

    async fn get_move(&self, query: &str) -> Response<ResponseBody> {
        let update = MoveRequest::from_query(query).and_then(|r| r.into_update(self.policy));
        self.apply_move(update).await
    }

    async fn apply_move(
        &self,
        update: Result<PositionUpdate, RequestError>,
    ) -> Response<ResponseBody> {
        match update {
            Ok(update) => {
                let position = self.store.update(update).await;
                let reply = MoveResponse::accepted(self.store.view(position));
                json_response(StatusCode::OK, &reply)
            }
            Err(e) => {
                warn!("Rejected move: {}", e);
                json_response(e.status(), &ErrorResponse::new(e.to_string()))
            }
        }
    }

    async fn status(&self) -> Response<ResponseBody> {
        let health = self.store.health().await;
        let status = StatusResponse::from_health(health, self.store.stale_threshold_ms());
        json_response(StatusCode::OK, &status)
    }

    async fn landing(&self, html: bool) -> Response<ResponseBody> {
        if html {
            return build_response(StatusCode::OK, "text/html; charset=utf-8", LANDING_PAGE);
        }

        let health = self.store.health().await;
        let info = ServiceInfo {
            service: SERVICE_NAME,
            version: VERSION.to_string(),
            status: "online",
            uptime: health.uptime,
            update_count: health.update_count,
            position: health.position,
            endpoints: ROUTES.to_vec(),
        };
        json_response(StatusCode::OK, &info)
    }
}

/// Run a handler, turning a panic into a `500`.
///
/// The store's lock does not poison, so a panicking handler leaves the
/// stored record as it was before the write began.
pub async fn guarded<F>(handler: F) -> Response<ResponseBody>
where
    F: Future<Output = Response<ResponseBody>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            error!("Request handler panicked");
            build_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                INTERNAL_ERROR_BODY,
            )
        }
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(RequestError::BodyTooLarge { limit }),
        Err(e) => Err(RequestError::MalformedBody(e.to_string())),
    }
}

fn not_found(method: &Method, path: &str) -> Response<ResponseBody> {
    debug!("No route for {} {}", method, path);
    let body = NotFoundResponse {
        success: false,
        error: "Not found",
        method: method.to_string(),
        path: path.to_string(),
        available_routes: ROUTES.iter().map(RouteInfo::label).collect(),
    };
    json_response(StatusCode::NOT_FOUND, &body)
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST, OPTIONS"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(body) {
        Ok(bytes) => build_response(status, "application/json", bytes),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            build_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                INTERNAL_ERROR_BODY,
            )
        }
    }
}

fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn build_response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use serde_json::Value;

    fn create_test_router(policy: CoordinatePolicy) -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = Arc::new(PositionStore::with_clock(clock.clone()));
        let config = ServerConfig {
            coordinate_policy: policy,
            max_body_bytes: 256,
            ..Default::default()
        };
        (Router::new(store, &config), clock)
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn send(router: &Router, req: Request<Full<Bytes>>) -> (StatusCode, Value) {
        let response = router.handle(req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(router: &Router, body: &str) -> (StatusCode, Value) {
        send(router, request("POST", "/move", body)).await
    }

    async fn update_count(router: &Router) -> u64 {
        router.store().snapshot().await.position.update_count
    }

    #[tokio::test]
    async fn test_post_move_center() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);
        let (status, body) = post(&router, r#"{"x": 320, "y": 224}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["position"]["roblox_x"], 0.0);
        assert_eq!(body["position"]["roblox_y"], 0.0);
        assert_eq!(body["position"]["updateCount"], 1);
        assert_eq!(body["position"]["isStale"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_post_move_edges() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);

        let (_, body) = post(&router, r#"{"x": 0, "y": 0}"#).await;
        assert_eq!(body["position"]["roblox_x"], -50.0);
        assert_eq!(body["position"]["roblox_y"], -50.0);

        let (_, body) = post(&router, r#"{"x": 640, "y": 448}"#).await;
        assert_eq!(body["position"]["roblox_x"], 50.0);
        assert_eq!(body["position"]["roblox_y"], 50.0);
    }

    #[tokio::test]
    async fn test_post_move_clamps() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);
        let (status, body) = post(&router, r#"{"x": -100, "y": "9999"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"]["x"], 0.0);
        assert_eq!(body["position"]["y"], 448.0);
    }

    #[tokio::test]
    async fn test_post_move_explicit_target() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);
        post(&router, r#"{"x": 0, "y": 0, "roblox_x": 7, "roblox_y": -3}"#).await;

        let snap = router.store().snapshot().await;
        assert_eq!(snap.position.roblox_x, 7.0);
        assert_eq!(snap.position.roblox_y, -3.0);
    }

    #[tokio::test]
    async fn test_get_and_post_each_count_once() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);

        post(&router, r#"{"x": 1, "y": 1}"#).await;
        assert_eq!(update_count(&router).await, 1);

        let (status, body) = send(&router, request("GET", "/move?x=160&y=112", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"]["roblox_x"], -25.0);
        assert_eq!(update_count(&router).await, 2);
    }

    #[tokio::test]
    async fn test_missing_coordinates_rejected_without_mutation() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);

        let (status, body) = post(&router, r#"{"x": 10}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing coordinates");

        let (status, _) = send(&router, request("GET", "/move?y=3", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(update_count(&router).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Lenient);

        let (status, body) = post(&router, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(update_count(&router).await, 0);
    }

    #[tokio::test]
    async fn test_text_plain_body_accepted() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);
        let req = Request::builder()
            .method("POST")
            .uri("/move")
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from_static(br#"{"x": 480, "y": 336}"#)))
            .unwrap();

        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"]["roblox_x"], 25.0);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);
        let padding = " ".repeat(300);
        let (status, _) = post(&router, &format!(r#"{{"x": 1, "y": 1}}{}"#, padding)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(update_count(&router).await, 0);
    }

    #[tokio::test]
    async fn test_lenient_policy_defaults_to_center() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Lenient);
        let (status, body) = post(&router, "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"]["x"], 320.0);
        assert_eq!(body["position"]["y"], 224.0);
        assert_eq!(update_count(&router).await, 1);
    }

    #[tokio::test]
    async fn test_position_goes_stale() {
        let (router, clock) = create_test_router(CoordinatePolicy::Strict);
        post(&router, r#"{"x": 5, "y": 5, "timestamp": 42}"#).await;

        let (_, body) = send(&router, request("GET", "/position", "")).await;
        assert_eq!(body["isStale"], false);
        assert_eq!(body["timestamp"], 42);
        assert_eq!(body["dataAge"], 0);

        clock.advance(5_001);
        let (status, body) = send(&router, request("GET", "/position", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isStale"], true);
        assert_eq!(body["dataAge"], 5_001);
        assert_eq!(body["serverTime"], 1_700_000_005_001i64);
    }

    #[tokio::test]
    async fn test_status_connection_state() {
        let (router, clock) = create_test_router(CoordinatePolicy::Strict);
        post(&router, r#"{"x": 5, "y": 5}"#).await;

        let (_, body) = send(&router, request("GET", "/status", "")).await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["connected"], true);
        assert_eq!(body["updateCount"], 1);

        clock.advance(5_000);
        let (_, body) = send(&router, request("GET", "/status", "")).await;
        assert_eq!(body["connected"], false);
        assert_eq!(body["connection"], "disconnected");
    }

    #[tokio::test]
    async fn test_health() {
        let (router, clock) = create_test_router(CoordinatePolicy::Strict);
        post(&router, r#"{"x": 5, "y": 5}"#).await;
        clock.advance(1_500);

        let (status, body) = send(&router, request("GET", "/health", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["uptime"], 1.5);
        assert_eq!(body["totalUpdates"], 1);
        assert_eq!(body["currentPosition"]["x"], 5.0);
    }

    #[tokio::test]
    async fn test_landing_json_and_html() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);

        let (status, body) = send(&router, request("GET", "/", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], SERVICE_NAME);
        assert_eq!(body["endpoints"].as_array().unwrap().len(), ROUTES.len());

        let req = Request::builder()
            .uri("/")
            .header(ACCEPT, "text/html")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = router.handle(req).await;
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("PS2 -&gt; Roblox Bridge"));
    }

    #[tokio::test]
    async fn test_unknown_route_lists_routes() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);

        let (status, body) = send(&router, request("GET", "/teleport", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["path"], "/teleport");

        let routes: Vec<&str> = body["availableRoutes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(routes.contains(&"POST /move"));
        assert!(routes.contains(&"GET /position"));
        assert_eq!(routes.len(), ROUTES.len());

        let (status, _) = send(&router, request("DELETE", "/move", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_and_request_id_headers() {
        let (router, _clock) = create_test_router(CoordinatePolicy::Strict);

        let response = router.handle(request("OPTIONS", "/move", "")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let response = router.handle(request("GET", "/position", "")).await;
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_guarded_turns_panic_into_500() {
        let response = guarded(async {
            if true {
                panic!("boom");
            }
            empty_response(StatusCode::OK)
        })
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

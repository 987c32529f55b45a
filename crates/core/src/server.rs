//! HTTP transport for the relay.
//!
//! ```text
//! POST /v1/qs/{namespace}/{key}              body: JSON object
//!   200 {"next": "<cursor>"}
//! GET  /v1/qs/{namespace}/{key}?next=<cursor>
//!   200 {"data": [...], "next": "<cursor>"}
//! GET  /health
//! ```

use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn};

use crate::{
    cursor::Cursor,
    error::{ErrorKind, RelayError},
    relay::Relay,
    store::OrderedStore,
};

/// Server configuration options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 for auto-assign)
    pub port: u16,
    /// Largest request body accepted on append
    pub max_body_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServerOptions {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Application state shared across handlers.
pub struct AppState<S> {
    pub relay: Arc<Relay<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
        }
    }
}

impl<S: OrderedStore> AppState<S> {
    pub fn new(relay: Relay<S>) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }
}

/// Query parameters for GET requests.
#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub next: Cursor,
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub data: Vec<Value>,
    pub next: Cursor,
}

/// Create the router with all relay endpoints.
pub fn create_router<S: OrderedStore + 'static>(
    state: AppState<S>,
    options: &ServerOptions,
) -> Router {
    Router::new()
        .route(
            "/v1/qs/{*path}",
            get(handle_read::<S>).post(handle_append::<S>),
        )
        .route("/health", get(handle_health::<S>))
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
}

/// POST - Append a JSON object under a key
async fn handle_append<S: OrderedStore>(
    State(state): State<AppState<S>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let Some((namespace, key)) = split_path(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.relay.append_json(namespace, key, &body) {
        Ok(next) => (StatusCode::OK, Json(AppendResponse { next })).into_response(),
        Err(e) => {
            let status = append_status(&e);
            log_failure(status, "append", namespace, key, &e);
            error_response(status, &e)
        }
    }
}

/// GET - Read values appended after a cursor
async fn handle_read<S: OrderedStore>(
    State(state): State<AppState<S>>,
    Path(path): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Response {
    let Some((namespace, key)) = split_path(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    // An empty `next` is the same as no cursor.
    let cursor = query.next.as_deref().filter(|c| !c.is_empty());

    match state.relay.read(namespace, key, cursor) {
        Ok(result) => (
            StatusCode::OK,
            Json(ReadResponse {
                data: result.values,
                next: result.next,
            }),
        )
            .into_response(),
        Err(e) => {
            let status = read_status(&e);
            log_failure(status, "read", namespace, key, &e);
            error_response(status, &e)
        }
    }
}

async fn handle_health<S: OrderedStore>(State(state): State<AppState<S>>) -> Response {
    match state.relay.store().ping() {
        Ok(()) => Json(json!({
            "status": "healthy",
            "service": "relay"
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "service": "relay",
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// Split `{namespace}/{key}`. Either part may be empty and is rejected by the
/// relay; a deeper path is not a relay path at all.
fn split_path(path: &str) -> Option<(&str, &str)> {
    let (namespace, key) = path.split_once('/').unwrap_or((path, ""));
    if key.contains('/') {
        return None;
    }
    Some((namespace, key))
}

fn append_status(error: &RelayError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation | ErrorKind::Format => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::Storage | ErrorKind::Encoding => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn read_status(error: &RelayError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation | ErrorKind::Format => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::Storage => StatusCode::NOT_FOUND,
        ErrorKind::Encoding => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, error: &RelayError) -> Response {
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn log_failure(status: StatusCode, operation: &str, namespace: &str, key: &str, e: &RelayError) {
    if status.is_server_error() {
        error!(operation, namespace = %namespace, key = %key, error = %e, "Request failed");
    } else {
        warn!(operation, namespace = %namespace, key = %key, error = %e, "Request rejected");
    }
}

/// One log line per request with status, method, path, client address and latency.
async fn log_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    info!(
        status = response.status().as_u16(),
        method = %method,
        path = %path,
        ip = %ip,
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        user_agent = %user_agent,
        "request completed"
    );
    response
}

/// Start the server and block until Ctrl-C.
///
/// The store is dropped, releasing its connections, once in-flight requests
/// have drained.
pub async fn start_server<S: OrderedStore + 'static>(
    store: S,
    options: ServerOptions,
) -> std::io::Result<()> {
    let relay = Arc::new(Relay::new(store));
    let router = create_router(
        AppState {
            relay: relay.clone(),
        },
        &options,
    );

    let addr = options.bind_address();
    info!("Starting relay server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    match Arc::try_unwrap(relay) {
        Ok(relay) => {
            drop(relay.into_store());
            info!("Relay server stopped, store released");
        }
        Err(_) => warn!("Relay server stopped while the store is still referenced"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! HTTP server setup and the front controller.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (tracing, timeout)
//! - Turn each axum request into a [`RawTransport`] and a [`WebRequest`]
//! - Detect the entry point, interpolate routing parameters, resolve the
//!   client IP and dispatch
//!
//! # Design Decisions
//! - Site state lives in an `ArcSwap`; each request takes one snapshot
//! - Request handling after the body is read is synchronous, so no request
//!   state is held across an await point
//! - Client IP failures are answered with 400 before any handler runs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwap;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::{DispatchError, RequestError};
use crate::http::describe::DescribeHandler;
use crate::http::request::WebRequest;
use crate::http::request_id::X_REQUEST_ID;
use crate::http::transport::RawTransport;
use crate::observability::metrics;
use crate::routing::dispatch::Dispatcher;
use crate::site::Site;

/// Largest request body read into the transport snapshot.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub site: Arc<ArcSwap<Site>>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(site: Arc<ArcSwap<Site>>, dispatcher: Dispatcher) -> Self {
        Self {
            site,
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// HTTP front end for the wiki.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server over `site` with handlers from `dispatcher`.
    pub fn new(site: Arc<ArcSwap<Site>>, dispatcher: Dispatcher) -> Self {
        let timeout = Duration::from_secs(site.load().config().server.request_timeout_secs);
        let state = AppState::new(site, dispatcher);
        let router = build_router(state, timeout);
        Self { router }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, timeout: Duration) -> Router {
    Router::new()
        .fallback(front_controller)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
}

/// A dispatcher that answers every entry point of `site` with
/// [`DescribeHandler`].
pub fn default_dispatcher(site: &Site) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    let handler = Arc::new(DescribeHandler);
    dispatcher.register_all(
        site.entry_points()
            .descriptors()
            .iter()
            .map(|d| d.name.as_str()),
        handler.clone(),
    );
    dispatcher.register(site.entry_points().default_name(), handler);
    dispatcher
}

/// Catch-all handler: every request goes through the same pipeline.
async fn front_controller(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    parts: Parts,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let site = state.site.load_full();

    // Over-limit bodies map to 413, transport failures to 400.
    let body = match body {
        Ok(bytes) => bytes.to_vec(),
        Err(rejection) => {
            let status = rejection.status();
            tracing::warn!(
                error = %rejection.body_text(),
                status = status.as_u16(),
                path = %parts.uri.path(),
                "Failed to read request body"
            );
            return (status, rejection.body_text()).into_response();
        }
    };

    let transport = transport_from_parts(&parts, body, peer, site.config().server.https);
    handle(site, &state.dispatcher, transport, start)
}

fn handle(site: Arc<Site>, dispatcher: &Dispatcher, transport: RawTransport, start: Instant) -> Response {
    let mut request = WebRequest::real(site, transport);
    let request_id = request.request_id().to_string();

    if let Err(e) = request.interpolate_title() {
        return reject(&request, &request_id, StatusCode::BAD_REQUEST, &e, start);
    }

    if let Err(e) = request.ip() {
        if let RequestError::Ip(reason) = &e {
            metrics::record_ip_resolution_failure(reason.kind());
        }
        tracing::warn!(
            request_id = %request_id,
            remote_addr = ?request.transport().remote_addr(),
            xff = ?request.header("X-Forwarded-For"),
            error = %e,
            "Rejecting request with unresolvable client IP"
        );
        return reject(&request, &request_id, StatusCode::BAD_REQUEST, &e, start);
    }

    match dispatcher.dispatch(&mut request) {
        Ok(()) => {}
        Err(DispatchError::UnknownEntryPoint(name)) => {
            tracing::warn!(request_id = %request_id, entry_point = %name, "No handler for entry point");
            let e = DispatchError::UnknownEntryPoint(name);
            return reject(&request, &request_id, StatusCode::NOT_FOUND, &e, start);
        }
        Err(DispatchError::Request(e)) => {
            tracing::warn!(request_id = %request_id, error = %e, "Handler failed");
            return reject(&request, &request_id, StatusCode::BAD_REQUEST, &e, start);
        }
    }

    let entry_point = request.entry_point().to_string();
    request
        .response_mut()
        .header(&format!("{X_REQUEST_ID}: {request_id}"), true, None);
    let status = request.response().status_code();
    metrics::record_request(&entry_point, status, start);

    tracing::debug!(
        request_id = %request_id,
        entry_point = %entry_point,
        status,
        elapsed_ms = request.elapsed().as_millis() as u64,
        "Request handled"
    );
    request.into_response().into_http()
}

fn reject(
    request: &WebRequest,
    request_id: &str,
    status: StatusCode,
    error: &dyn std::error::Error,
    start: Instant,
) -> Response {
    metrics::record_request(request.entry_point(), status.as_u16(), start);
    let mut response = (status, error.to_string()).into_response();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// Snapshot an axum request. `https` comes from config since TLS is
/// terminated in front of this service.
pub fn transport_from_parts(parts: &Parts, body: Vec<u8>, peer: SocketAddr, https: bool) -> RawTransport {
    let request_uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| parts.uri.path());

    let mut builder = RawTransport::builder()
        .method(parts.method.as_str())
        .request_uri(request_uri)
        .remote_addr(peer.ip().to_string())
        .request_time(SystemTime::now())
        .body(body);

    if let Some(query) = parts.uri.query() {
        builder = builder.query_string(query);
    }
    if https {
        builder = builder.https("on");
    }
    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        builder = builder.header(name.as_str(), value);
    }
    builder.build()
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}

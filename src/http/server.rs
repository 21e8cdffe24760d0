//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all handler
//! - Wire up middleware (tracing, request ID)
//! - Bind the server to a listener with graceful shutdown
//! - Dispatch each classified request to its forwarding strategy
//! - Record per-route metrics

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::directory::Resolution;
use crate::error::{GatewayError, GatewayResult};
use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::lifecycle::Gateway;
use crate::observability::metrics;
use crate::proxy::file;
use crate::routing::Route;
use crate::security::headers::{apply_cors, apply_preflight};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// Public HTTP server of the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            router: build_router(gateway),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/{*path}", any(gateway_handler))
        .route("/", any(gateway_handler))
        .with_state(AppState { gateway })
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    dispatch(&state.gateway, request).await
}

/// Classify `request` and hand it to the matching strategy.
pub async fn dispatch(gateway: &Gateway, request: Request<Body>) -> Response {
    let start = Instant::now();
    let ctx = RequestContext::from_request(&request, &gateway.config.listener);
    let route = gateway
        .router
        .classify(request.method(), ctx.host.as_deref(), request.uri().path());
    let route_name = route.name();

    tracing::debug!(
        request_id = %ctx.request_id,
        client = %ctx.client_id,
        route = route_name,
        "Dispatching request"
    );

    let response = match forward(gateway, &ctx, route, request).await {
        Ok(response) => response,
        Err(err) => {
            if err.status_code().is_server_error() {
                tracing::warn!(request_id = %ctx.request_id, route = route_name, error = %err, "Request failed");
            } else {
                tracing::debug!(request_id = %ctx.request_id, route = route_name, error = %err, "Request refused");
            }
            err.into_response()
        }
    };

    metrics::record_request(route_name, response.status().as_u16(), start);
    response
}

async fn forward(
    gateway: &Gateway,
    ctx: &RequestContext,
    route: Route,
    request: Request<Body>,
) -> GatewayResult<Response> {
    let headers = request.headers();
    match route {
        Route::Preflight => Ok(preflight_response()),
        Route::Subdomain(label) => gateway
            .directory
            .resolve_subdomain(&label)
            .await
            .map(Resolution::into_response),
        Route::Api => gateway.directory.forward_api(request).await,
        Route::FileProxy => {
            let target = query_param(request.uri().query(), "url").ok_or_else(|| {
                GatewayError::MissingParameter {
                    name: "url",
                    usage: format!("{}{}", ctx.origin, file::USAGE),
                }
            })?;
            gateway
                .file_proxy
                .proxy(&target, headers.get(header::RANGE), headers.get(header::USER_AGENT))
                .await
        }
        Route::RegistryRoot => {
            gateway
                .registry
                .root_check(ctx, headers.get(header::AUTHORIZATION))
                .await
        }
        Route::RegistryAuth => {
            gateway
                .registry
                .auth_exchange(request.uri().query(), headers.get(header::AUTHORIZATION))
                .await
        }
        Route::Registry => gateway.registry.resource(ctx, request).await,
        Route::ShortLink(code) => gateway
            .directory
            .resolve_short_link(&code)
            .await
            .map(Resolution::into_response),
        Route::SourceControl => gateway.source_control.proxy(ctx, request).await,
        Route::Fallback => Ok(status_document(ctx)),
    }
}

/// First non-empty value of `name` in a query string.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, value)| key == name && !value.trim().is_empty())
        .map(|(_, value)| value.into_owned())
}

fn preflight_response() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    apply_preflight(response.headers_mut());
    response
}

fn status_document(ctx: &RequestContext) -> Response {
    let origin = &ctx.origin;
    let body = json!({
        "service": env!("CARGO_PKG_NAME"),
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "features": ["source-control proxy", "file proxy", "container registry proxy"],
        "endpoints": [
            format!("GET {origin}/{{owner}}/{{repo}}[.git] - source-control proxy"),
            format!("GET {origin}/proxy/?url={{absolute url}} - file proxy"),
            format!("GET {origin}/v2/... - container registry proxy"),
            format!("GET {origin}/s/{{code}} - short link"),
            format!("{origin}/api/... - platform API"),
        ],
    });
    let mut response = Json(body).into_response();
    apply_cors(response.headers_mut());
    response
}

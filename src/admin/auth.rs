use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ErrorEnvelope;
use crate::http::server::AppState;

/// Require `Authorization: Bearer <admin.api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let expected = &state.gateway.config.admin.api_key;
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(token) if !expected.is_empty() && token == expected => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Admin request rejected");
            let envelope = ErrorEnvelope {
                error: "unauthorized".to_string(),
                message: Some("missing or invalid admin key".to_string()),
            };
            (axum::http::StatusCode::UNAUTHORIZED, Json(envelope)).into_response()
        }
    }
}

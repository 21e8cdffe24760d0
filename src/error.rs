//! Gateway error types and the synthesized error envelope.
//!
//! Every forwarding strategy returns `Result<Response, GatewayError>`; the error
//! side renders as `{ "error": ..., "message"?: ... }` with a status from the
//! taxonomy below.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::security::headers::apply_cors;

/// Errors surfaced to gateway callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A mandatory query parameter is absent.
    #[error("missing parameter {name}")]
    MissingParameter { name: &'static str, usage: String },

    /// The requested target could not be parsed or uses a disallowed protocol.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The requested target host is blocked.
    #[error("forbidden target: {0}")]
    ForbiddenTarget(String),

    /// The declared client signature matches no allowed client.
    #[error("client not allowed")]
    ClientNotAllowed,

    /// The path matches a blocked substring or extension.
    #[error("path blocked")]
    PathBlocked,

    /// The client exceeded its request budget for the current window.
    #[error("rate limited: at most {limit} requests per {}s", .retry_after.as_secs())]
    RateLimited { limit: u32, retry_after: Duration },

    /// Nothing to serve at this location.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upstream could not be reached or answered unusably.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// An outbound request exceeded its deadline.
    #[error("upstream timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// A setting required by this route is absent.
    #[error("not configured: {0}")]
    Configuration(&'static str),

    /// A collaborator is temporarily unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error envelope for all synthesized (non-streamed) errors.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GatewayError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter { .. } | Self::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            Self::ForbiddenTarget(_) | Self::ClientNotAllowed | Self::PathBlocked => {
                StatusCode::FORBIDDEN
            }
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Configuration(_) | Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short machine-readable error label.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter { .. } => "missing_parameter",
            Self::InvalidTarget(_) => "invalid_target",
            Self::ForbiddenTarget(_) => "forbidden_target",
            Self::ClientNotAllowed => "client_not_allowed",
            Self::PathBlocked => "path_blocked",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream_error",
            Self::Timeout(_) => "timeout",
            Self::Configuration(_) => "configuration_error",
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// Human-readable detail, when there is more to say than the code.
    fn message(&self) -> Option<String> {
        match self {
            Self::MissingParameter { name, usage } => {
                Some(format!("missing `{name}` parameter, usage: {usage}"))
            }
            Self::ClientNotAllowed => {
                Some("unsupported client, use git, curl, wget or a similar tool".to_string())
            }
            Self::PathBlocked => Some("this path may not be proxied".to_string()),
            _ => Some(self.to_string()),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.envelope())).into_response();
        let headers = response.headers_mut();
        apply_cors(headers);
        if let Self::RateLimited { retry_after, .. } = &self {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }
        response
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        // Deadlines are enforced by `resilience::timeouts`, so a reqwest
        // timeout here is a connect timeout and counts as unreachable.
        Self::Upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(GatewayError::InvalidTarget("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::ClientNotAllowed.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::PathBlocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::Timeout(Duration::from_secs(3)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(GatewayError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            GatewayError::Configuration("directory.api_base").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = GatewayError::RateLimited {
            limit: 60,
            retry_after: Duration::from_secs(60),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn missing_parameter_message_includes_usage() {
        let envelope = GatewayError::MissingParameter {
            name: "url",
            usage: "https://gw.example/proxy/?url=https://example.com/file.zip".into(),
        }
        .envelope();
        assert_eq!(envelope.error, "missing_parameter");
        assert!(envelope.message.unwrap().contains("/proxy/?url="));
    }
}

//! Forwarding strategies.
//!
//! # Data Flow
//! ```text
//! classified request
//!     → source_control.rs (policy guard, fixed upstream, Location rewrite)
//!     → registry.rs (challenge rewrite, token exchange, blob follow-through)
//!     → file.rs (target validation, Range pass-through, deadline)
//!     → relay (stream upstream body back, header table applied)
//! ```
//!
//! # Design Decisions
//! - Bodies are streamed in both directions, never buffered
//! - Two outbound clients: one follows redirects, one leaves them to the caller
//! - Upstream failures become 502 at the strategy boundary; no retries

pub mod file;
pub mod registry;
pub mod source_control;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::Response;

use crate::config::TimeoutConfig;
use crate::security::headers::{apply_cors, copy_response_headers, ResponseHeaderPolicy};

pub use file::FileProxy;
pub use registry::RegistryProxy;
pub use source_control::SourceControlProxy;

/// Outbound HTTP clients shared by every strategy.
#[derive(Clone)]
pub struct UpstreamClients {
    /// Follows redirects (source control, file downloads, token requests).
    pub following: reqwest::Client,
    /// Returns 3xx responses as-is so the gateway can inspect them.
    pub manual: reqwest::Client,
}

impl UpstreamClients {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let connect_timeout = Duration::from_secs(timeouts.connect_secs);
        let following = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        let manual = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { following, manual })
    }
}

/// Turn an upstream response into a streamed gateway response.
pub fn relay(upstream: reqwest::Response, policy: ResponseHeaderPolicy) -> Response {
    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    copy_response_headers(&upstream_headers, response.headers_mut(), policy);
    apply_cors(response.headers_mut());
    response
}

/// Request body to forward, or none for methods that carry no body.
pub fn forward_body(method: &Method, body: Body) -> Option<reqwest::Body> {
    if *method == Method::GET || *method == Method::HEAD {
        None
    } else {
        Some(reqwest::Body::wrap_stream(body.into_data_stream()))
    }
}

/// Point a `Location` that addresses `upstream_base` back at `origin`.
/// Returns true when the header was rewritten.
pub fn rewrite_location(headers: &mut HeaderMap, upstream_base: &str, origin: &str) -> bool {
    let Some(location) = headers.get(header::LOCATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(rest) = location.strip_prefix(upstream_base) else {
        return false;
    };
    if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
        return false;
    }
    match HeaderValue::from_str(&format!("{origin}{rest}")) {
        Ok(value) => {
            headers.insert(header::LOCATION, value);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_upstream_locations_only() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LOCATION,
            HeaderValue::from_static("https://github.com/owner/repo.git/info/refs?service=git-upload-pack"),
        );
        assert!(rewrite_location(&mut headers, "https://github.com", "https://gw.example"));
        assert_eq!(
            headers[header::LOCATION],
            "https://gw.example/owner/repo.git/info/refs?service=git-upload-pack"
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("https://github.community/x"));
        assert!(!rewrite_location(&mut headers, "https://github.com", "https://gw.example"));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::LOCATION,
            HeaderValue::from_static("https://objects.githubusercontent.com/x"),
        );
        assert!(!rewrite_location(&mut headers, "https://github.com", "https://gw.example"));
    }
}

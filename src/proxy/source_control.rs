//! Source-control proxy.
//!
//! Forwards any sub-path to the fixed upstream host after the policy guard
//! admits it, and points redirect locations back at the gateway.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::response::Response;

use crate::config::SourceControlConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::proxy::{forward_body, relay, rewrite_location};
use crate::security::headers::{forwardable_request_headers, ResponseHeaderPolicy};
use crate::security::{Admission, PolicyGuard};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_WINDOW: &str = "x-ratelimit-window";

pub struct SourceControlProxy {
    client: reqwest::Client,
    upstream: String,
    guard: Arc<PolicyGuard>,
}

impl SourceControlProxy {
    pub fn new(client: reqwest::Client, config: &SourceControlConfig, guard: Arc<PolicyGuard>) -> Self {
        Self {
            client,
            upstream: config.upstream.trim_end_matches('/').to_string(),
            guard,
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub async fn proxy(&self, ctx: &RequestContext, request: Request<Body>) -> GatewayResult<Response> {
        let path = request.uri().path();
        let admission = self.guard.admit(&ctx.client_id, &ctx.signature, path)?;

        let target = match request.uri().query() {
            Some(query) => format!("{}{}?{}", self.upstream, path, query),
            None => format!("{}{}", self.upstream, path),
        };

        let (parts, body) = request.into_parts();
        let mut outbound = self
            .client
            .request(parts.method.clone(), &target)
            .headers(forwardable_request_headers(&parts.headers));
        if let Some(body) = forward_body(&parts.method, body) {
            outbound = outbound.body(body);
        }

        let upstream = outbound.send().await.map_err(|e| {
            tracing::warn!(
                request_id = %ctx.request_id,
                upstream = %target,
                error = %e,
                "Source-control upstream unreachable"
            );
            metrics::record_upstream_error("source_control");
            GatewayError::Upstream(format!("{target}: {e}"))
        })?;

        tracing::debug!(
            request_id = %ctx.request_id,
            upstream = %target,
            status = upstream.status().as_u16(),
            "Source-control response"
        );

        let mut response = relay(upstream, ResponseHeaderPolicy::Passthrough);
        rewrite_location(response.headers_mut(), &self.upstream, &ctx.origin);
        apply_rate_limit_headers(response.headers_mut(), &admission);
        Ok(response)
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, admission: &Admission) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(admission.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(admission.remaining));
    if let Ok(window) = HeaderValue::from_str(&format!("{}s", admission.window.as_secs())) {
        headers.insert(X_RATELIMIT_WINDOW, window);
    }
}

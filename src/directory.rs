//! Directory collaborator.
//!
//! The surrounding platform (subdomain registry, short links, mailbox and
//! donor APIs) lives behind `directory.api_base`. The router reaches it
//! through the [`Directory`] trait; the forwarding strategies never do.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::config::DirectoryConfig;
use crate::error::{ErrorEnvelope, GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::proxy::{forward_body, relay};
use crate::security::headers::{apply_cors, forwardable_request_headers, ResponseHeaderPolicy};

/// Outcome of a redirect lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Redirect the caller here.
    Found(String),
    /// No target; answer with `status`.
    Missing { status: StatusCode, message: String },
}

impl Resolution {
    pub fn into_response(self) -> Response {
        match self {
            Self::Found(target) => {
                let mut response = StatusCode::FOUND.into_response();
                match HeaderValue::from_str(&target) {
                    Ok(location) => {
                        response.headers_mut().insert(header::LOCATION, location);
                    }
                    Err(_) => {
                        return GatewayError::Upstream(format!("unusable redirect target {target}"))
                            .into_response();
                    }
                }
                apply_cors(response.headers_mut());
                response
            }
            Self::Missing { status, message } => {
                let envelope = ErrorEnvelope {
                    error: "not_found".to_string(),
                    message: Some(message),
                };
                let mut response = (status, Json(envelope)).into_response();
                apply_cors(response.headers_mut());
                response
            }
        }
    }
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Redirect target registered for a wildcard subdomain label.
    async fn resolve_subdomain(&self, label: &str) -> GatewayResult<Resolution>;

    /// Redirect target of a short-link code.
    async fn resolve_short_link(&self, code: &str) -> GatewayResult<Resolution>;

    /// Pass an `/api/...` request through to the platform backend.
    async fn forward_api(&self, request: Request<Body>) -> GatewayResult<Response>;
}

/// Build the directory named by the configuration.
pub fn from_config(client: reqwest::Client, config: &DirectoryConfig) -> Arc<dyn Directory> {
    match &config.api_base {
        Some(base) => Arc::new(HttpDirectory::new(client, base)),
        None => Arc::new(UnconfiguredDirectory),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubdomainLookup {
    #[serde(default)]
    success: bool,
    target_url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShortLinkLookup {
    #[serde(default)]
    success: bool,
    url: Option<String>,
    error: Option<String>,
}

/// Directory backed by the platform's HTTP API.
pub struct HttpDirectory {
    client: reqwest::Client,
    api_base: String,
}

impl HttpDirectory {
    pub fn new(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> GatewayError {
        tracing::warn!(api_base = %self.api_base, error = %err, "Directory backend unavailable");
        metrics::record_upstream_error("directory");
        GatewayError::Unavailable("directory backend unavailable".to_string())
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn resolve_subdomain(&self, label: &str) -> GatewayResult<Resolution> {
        let url = format!("{}/api/subdomains/{label}/redirect", self.api_base);
        let lookup: SubdomainLookup = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?
            .json()
            .await
            .map_err(|e| self.unavailable(e))?;

        Ok(match lookup.target_url {
            Some(target) if lookup.success => Resolution::Found(target),
            _ => Resolution::Missing {
                status: StatusCode::NOT_FOUND,
                message: lookup
                    .error
                    .unwrap_or_else(|| format!("subdomain `{label}` is not registered")),
            },
        })
    }

    async fn resolve_short_link(&self, code: &str) -> GatewayResult<Resolution> {
        let url = format!("{}/api/links/{code}/redirect", self.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let status = response.status();
        let lookup: ShortLinkLookup = response.json().await.map_err(|e| self.unavailable(e))?;

        Ok(match lookup.url {
            Some(target) if status.is_success() && lookup.success => Resolution::Found(target),
            _ => Resolution::Missing {
                status: if status.is_success() {
                    StatusCode::NOT_FOUND
                } else {
                    status
                },
                message: lookup
                    .error
                    .unwrap_or_else(|| format!("short link `{code}` does not exist")),
            },
        })
    }

    async fn forward_api(&self, request: Request<Body>) -> GatewayResult<Response> {
        let target = match request.uri().query() {
            Some(q) => format!("{}{}?{q}", self.api_base, request.uri().path()),
            None => format!("{}{}", self.api_base, request.uri().path()),
        };
        let (parts, body) = request.into_parts();
        let mut outbound = self
            .client
            .request(parts.method.clone(), &target)
            .headers(forwardable_request_headers(&parts.headers));
        if let Some(body) = forward_body(&parts.method, body) {
            outbound = outbound.body(body);
        }
        let upstream = outbound.send().await.map_err(|e| self.unavailable(e))?;
        Ok(relay(upstream, ResponseHeaderPolicy::Passthrough))
    }
}

/// Stand-in used when no `directory.api_base` is configured.
pub struct UnconfiguredDirectory;

#[async_trait]
impl Directory for UnconfiguredDirectory {
    async fn resolve_subdomain(&self, _label: &str) -> GatewayResult<Resolution> {
        Err(GatewayError::Configuration("directory.api_base"))
    }

    async fn resolve_short_link(&self, _code: &str) -> GatewayResult<Resolution> {
        Err(GatewayError::Configuration("directory.api_base"))
    }

    async fn forward_api(&self, _request: Request<Body>) -> GatewayResult<Response> {
        Err(GatewayError::Configuration("directory.api_base"))
    }
}

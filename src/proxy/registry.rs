//! Container-registry protocol proxy.
//!
//! # Responsibilities
//! - Root check: answer unauthorized callers with a challenge naming the
//!   gateway's own token endpoint
//! - Token exchange: discover the real realm/service upstream, normalize
//!   the requested scope and relay the token response
//! - Resource access: canonicalize single-segment repository names,
//!   forward with manual redirects and follow blob redirects in-gateway
//!
//! # Design Decisions
//! - The upstream registry host never appears in a challenge or redirect
//!   handed back to the caller
//! - The blob follow-up fetch carries no caller headers and no policy state

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use url::Url;

use crate::config::RegistryConfig;
use crate::error::{ErrorEnvelope, GatewayError, GatewayResult};
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::proxy::{forward_body, relay, rewrite_location, UpstreamClients};
use crate::security::headers::{apply_cors, forwardable_request_headers, ResponseHeaderPolicy};

pub const DISTRIBUTION_API_VERSION: &str = "docker-distribution-api-version";
pub const AUTH_PATH: &str = "/v2/auth";

/// Realm and service parsed from an upstream `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
}

impl AuthChallenge {
    /// Parse a `Bearer` challenge, filling absent parameters from the defaults.
    /// Returns `None` for other schemes.
    pub fn parse(value: &str, default_realm: &str, default_service: &str) -> Option<Self> {
        let value = value.trim();
        let (scheme, params) = value.split_once(' ').unwrap_or((value, ""));
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut challenge = Self {
            realm: default_realm.to_string(),
            service: default_service.to_string(),
        };
        for (key, val) in challenge_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => challenge.realm = val,
                "service" => challenge.service = val,
                _ => {}
            }
        }
        Some(challenge)
    }

    /// Token endpoint URL carrying the service and the given scopes.
    pub fn token_url(&self, scopes: &[String]) -> GatewayResult<Url> {
        let mut url = Url::parse(&self.realm)
            .map_err(|e| GatewayError::Upstream(format!("bad token realm {}: {e}", self.realm)))?;
        {
            let mut query = url.query_pairs_mut();
            if !self.service.is_empty() {
                query.append_pair("service", &self.service);
            }
            for scope in scopes {
                query.append_pair("scope", scope);
            }
        }
        Ok(url)
    }
}

/// `key=value` and `key="value"` pairs separated by commas.
fn challenge_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_string();
        let after = after.trim_start();
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };
        params.push((key, value.trim().to_string()));
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }
    params
}

/// Insert the default namespace into `repository:<name>:<actions>` scopes
/// whose name has no namespace of its own.
pub fn normalize_scope(scope: &str, namespace: &str) -> String {
    let parts: Vec<&str> = scope.split(':').collect();
    match parts.as_slice() {
        ["repository", name, actions] if !name.is_empty() && !name.contains('/') => {
            format!("repository:{namespace}/{name}:{actions}")
        }
        _ => scope.to_string(),
    }
}

/// Canonical path for `/v2/{name}/{resource}/{reference}` with a
/// single-segment name, or `None` when the path is already canonical.
pub fn canonical_repository_path(path: &str, namespace: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        ["", "v2", name, resource, reference]
            if !name.is_empty() && !resource.is_empty() && !reference.is_empty() =>
        {
            Some(format!("/v2/{namespace}/{name}/{resource}/{reference}"))
        }
        _ => None,
    }
}

/// 401 whose challenge sends the caller to this gateway's token endpoint.
pub fn challenge_response(origin: &str, service: &str) -> Response {
    let envelope = ErrorEnvelope {
        error: "unauthorized".to_string(),
        message: Some("authentication required".to_string()),
    };
    let mut response = (StatusCode::UNAUTHORIZED, Json(envelope)).into_response();
    let headers = response.headers_mut();
    let challenge = format!("Bearer realm=\"{origin}{AUTH_PATH}\",service=\"{service}\"");
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        headers.insert(header::WWW_AUTHENTICATE, value);
    }
    headers.insert(DISTRIBUTION_API_VERSION, HeaderValue::from_static("registry/2.0"));
    apply_cors(headers);
    response
}

pub struct RegistryProxy {
    clients: UpstreamClients,
    upstream: String,
    service: String,
    default_realm: String,
    default_service: String,
    namespace: String,
}

impl RegistryProxy {
    pub fn new(clients: UpstreamClients, config: &RegistryConfig) -> Self {
        Self {
            clients,
            upstream: config.upstream.trim_end_matches('/').to_string(),
            service: config.service.clone(),
            default_realm: config.default_realm.clone(),
            default_service: config.default_service.clone(),
            namespace: config.default_namespace.clone(),
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    fn root_url(&self) -> String {
        format!("{}/v2/", self.upstream)
    }

    fn upstream_failure(&self, stage: &'static str, err: reqwest::Error) -> GatewayError {
        tracing::warn!(upstream = %self.upstream, stage, error = %err, "Registry upstream unreachable");
        metrics::record_upstream_error("registry");
        GatewayError::Upstream(format!("registry {stage}: {err}"))
    }

    /// `GET /v2/`: pass caller credentials through, rewrite the challenge.
    pub async fn root_check(
        &self,
        ctx: &RequestContext,
        authorization: Option<&HeaderValue>,
    ) -> GatewayResult<Response> {
        let mut outbound = self.clients.following.get(self.root_url());
        if let Some(auth) = authorization {
            outbound = outbound.header(header::AUTHORIZATION, auth.clone());
        }
        let upstream = outbound
            .send()
            .await
            .map_err(|e| self.upstream_failure("root", e))?;

        if upstream.status() == StatusCode::UNAUTHORIZED {
            return Ok(challenge_response(&ctx.origin, &self.service));
        }
        Ok(relay(upstream, ResponseHeaderPolicy::Passthrough))
    }

    /// `GET /v2/auth`: token exchange against the realm the upstream advertises.
    pub async fn auth_exchange(
        &self,
        query: Option<&str>,
        authorization: Option<&HeaderValue>,
    ) -> GatewayResult<Response> {
        let probe = self
            .clients
            .following
            .get(self.root_url())
            .send()
            .await
            .map_err(|e| self.upstream_failure("challenge", e))?;

        let challenge = if probe.status() == StatusCode::UNAUTHORIZED {
            probe
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| AuthChallenge::parse(v, &self.default_realm, &self.default_service))
        } else {
            None
        };
        let Some(challenge) = challenge else {
            tracing::debug!(status = probe.status().as_u16(), "Registry did not issue a bearer challenge");
            return Ok(relay(probe, ResponseHeaderPolicy::Passthrough));
        };

        let scopes: Vec<String> = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .filter(|(key, _)| key == "scope")
                    .map(|(_, scope)| normalize_scope(&scope, &self.namespace))
                    .collect()
            })
            .unwrap_or_default();

        let token_url = challenge.token_url(&scopes)?;
        tracing::debug!(realm = %challenge.realm, service = %challenge.service, ?scopes, "Requesting registry token");

        let mut outbound = self.clients.following.get(token_url);
        if let Some(auth) = authorization {
            outbound = outbound.header(header::AUTHORIZATION, auth.clone());
        }
        let token = outbound
            .send()
            .await
            .map_err(|e| self.upstream_failure("token", e))?;
        Ok(relay(token, ResponseHeaderPolicy::Passthrough))
    }

    /// Any other `/v2/...` path.
    pub async fn resource(&self, ctx: &RequestContext, request: Request<Body>) -> GatewayResult<Response> {
        let path = request.uri().path();
        let query = request.uri().query();

        if let Some(canonical) = canonical_repository_path(path, &self.namespace) {
            let location = match query {
                Some(q) => format!("{}{canonical}?{q}", ctx.origin),
                None => format!("{}{canonical}", ctx.origin),
            };
            return Ok(permanent_redirect(&location));
        }

        let target = match query {
            Some(q) => format!("{}{path}?{q}", self.upstream),
            None => format!("{}{path}", self.upstream),
        };

        let (parts, body) = request.into_parts();
        let mut outbound = self
            .clients
            .manual
            .request(parts.method.clone(), &target)
            .headers(forwardable_request_headers(&parts.headers));
        if let Some(body) = forward_body(&parts.method, body) {
            outbound = outbound.body(body);
        }
        let upstream = outbound
            .send()
            .await
            .map_err(|e| self.upstream_failure("resource", e))?;

        match upstream.status() {
            StatusCode::UNAUTHORIZED => Ok(challenge_response(&ctx.origin, &self.service)),
            StatusCode::TEMPORARY_REDIRECT => {
                match redirect_target(upstream.headers(), &target) {
                    Some(location) => self.follow_blob(ctx, location).await,
                    None => Ok(relay(upstream, ResponseHeaderPolicy::Passthrough)),
                }
            }
            _ => {
                let mut response = relay(upstream, ResponseHeaderPolicy::Passthrough);
                rewrite_location(response.headers_mut(), &self.upstream, &ctx.origin);
                Ok(response)
            }
        }
    }

    async fn follow_blob(&self, ctx: &RequestContext, location: Url) -> GatewayResult<Response> {
        tracing::debug!(request_id = %ctx.request_id, host = ?location.host_str(), "Following blob redirect");
        let blob = self
            .clients
            .following
            .get(location)
            .send()
            .await
            .map_err(|e| self.upstream_failure("blob", e))?;
        Ok(relay(blob, ResponseHeaderPolicy::Passthrough))
    }
}

fn redirect_target(headers: &HeaderMap, base: &str) -> Option<Url> {
    let location = headers.get(header::LOCATION)?.to_str().ok()?;
    Url::parse(base).ok()?.join(location).ok()
}

fn permanent_redirect(location: &str) -> Response {
    let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    apply_cors(response.headers_mut());
    response
}

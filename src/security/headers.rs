//! Header tables shared by every forwarding strategy.
//!
//! # Responsibilities
//! - Declare which request headers never leave the gateway
//! - Declare which response headers are relayed, per strategy
//! - Provide the CORS headers stamped on gateway responses
//!
//! # Design Decisions
//! - One table per concern, no per-handler header lists
//! - Hop-by-hop headers are dropped in both directions
//! - Edge-identifying headers never reach an upstream

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Headers added by the edge network in front of the gateway.
pub const EDGE_REQUEST_HEADERS: &[&str] = &[
    "host",
    "cf-connecting-ip",
    "cf-ray",
    "cf-visitor",
    "cf-ipcountry",
];

/// Connection-scoped headers (RFC 9110 §7.6.1).
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers the file proxy relays from an arbitrary origin.
pub const FILE_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "content-disposition",
    "accept-ranges",
    "content-range",
    "etag",
    "last-modified",
];

pub const CORS_ALLOW_METHODS: &str = "GET, HEAD, POST, PUT, PATCH, DELETE, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str =
    "Authorization, Content-Type, Range, X-Requested-With, X-Admin-Key";
pub const CORS_EXPOSE_HEADERS: &str =
    "Content-Length, Content-Range, Content-Disposition, Docker-Content-Digest, WWW-Authenticate";

/// How an upstream response's headers are relayed to the caller.
#[derive(Debug, Clone, Copy)]
pub enum ResponseHeaderPolicy {
    /// Everything except hop-by-hop headers.
    Passthrough,
    /// Only the listed headers.
    AllowList(&'static [&'static str]),
}

fn is_listed(name: &HeaderName, table: &[&str]) -> bool {
    table.iter().any(|entry| name.as_str().eq_ignore_ascii_case(entry))
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    is_listed(name, HOP_BY_HOP_HEADERS)
}

/// Request headers that may be sent to an upstream: everything the caller sent
/// minus edge-identifying and hop-by-hop headers.
pub fn forwardable_request_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming {
        if is_listed(name, EDGE_REQUEST_HEADERS) || is_hop_by_hop(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Copy upstream response headers into `target` according to `policy`.
pub fn copy_response_headers(
    upstream: &HeaderMap,
    target: &mut HeaderMap,
    policy: ResponseHeaderPolicy,
) {
    for (name, value) in upstream {
        if is_hop_by_hop(name) {
            continue;
        }
        let keep = match policy {
            ResponseHeaderPolicy::Passthrough => true,
            ResponseHeaderPolicy::AllowList(table) => is_listed(name, table),
        };
        if keep {
            target.append(name.clone(), value.clone());
        }
    }
}

/// Stamp the permissive CORS headers every gateway response carries.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
}

/// Full preflight header set.
pub fn apply_preflight(headers: &mut HeaderMap) {
    apply_cors(headers);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(CORS_EXPOSE_HEADERS),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
}

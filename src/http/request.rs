//! Request inspection.
//!
//! # Responsibilities
//! - Resolve the client id used for rate limiting
//! - Extract the declared client signature (User-Agent)
//! - Derive the gateway's own origin for rewritten headers
//!
//! # Design Decisions
//! - Edge-supplied forwarding headers are trusted only when configured
//! - Origin derivation never fails; it falls back to configured defaults

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request};
use uuid::Uuid;

use crate::config::ListenerConfig;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Per-request facts every forwarding strategy needs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub client_id: String,
    pub signature: String,
    pub host: Option<String>,
    pub origin: String,
}

impl RequestContext {
    pub fn from_request(request: &Request<Body>, listener: &ListenerConfig) -> Self {
        let headers = request.headers();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let host = request_host(request);

        Self {
            request_id: header_str(headers, X_REQUEST_ID)
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            client_id: client_id(headers, peer, listener.trust_forwarded_headers),
            signature: header_str(headers, header::USER_AGENT.as_str())
                .unwrap_or_default()
                .to_string(),
            origin: gateway_origin(host.as_deref(), headers, listener),
            host,
        }
    }
}

/// `Host` header, else the URI authority (HTTP/2 `:authority`).
pub fn request_host(request: &Request<Body>) -> Option<String> {
    header_str(request.headers(), header::HOST.as_str())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client id: edge headers (when trusted), then the TCP peer, then `0.0.0.0`.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = header_str(headers, "cf-connecting-ip")
            .or_else(|| header_str(headers, "x-real-ip"))
            .or_else(|| {
                header_str(headers, "x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            });
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string())
}

/// `scheme://host[:port]` under which callers reach this gateway.
pub fn gateway_origin(host: Option<&str>, headers: &HeaderMap, listener: &ListenerConfig) -> String {
    if let Some(origin) = &listener.public_origin {
        return origin.trim_end_matches('/').to_string();
    }

    let scheme = if listener.trust_forwarded_headers {
        header_str(headers, "x-forwarded-proto")
            .filter(|p| matches!(*p, "http" | "https"))
            .unwrap_or(listener.default_scheme.as_str())
    } else {
        listener.default_scheme.as_str()
    };
    let host = host.unwrap_or("localhost");
    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn client_id_prefers_edge_headers() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let h = headers(&[
            ("x-forwarded-for", "198.51.100.2, 10.0.0.9"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(client_id(&h, Some(peer), true), "203.0.113.7");

        let h = headers(&[("x-forwarded-for", "198.51.100.2, 10.0.0.9")]);
        assert_eq!(client_id(&h, Some(peer), true), "198.51.100.2");
        assert_eq!(client_id(&h, Some(peer), false), "10.0.0.1");
        assert_eq!(client_id(&HeaderMap::new(), None, true), "0.0.0.0");
    }

    #[test]
    fn origin_uses_forwarded_proto_and_host() {
        let listener = ListenerConfig::default();
        let h = headers(&[("x-forwarded-proto", "http")]);
        assert_eq!(gateway_origin(Some("gw.example"), &h, &listener), "http://gw.example");

        let h = HeaderMap::new();
        assert_eq!(gateway_origin(Some("gw.example:8443"), &h, &listener), "https://gw.example:8443");
        assert_eq!(gateway_origin(None, &h, &listener), "https://localhost");
    }

    #[test]
    fn public_origin_overrides_host() {
        let listener = ListenerConfig {
            public_origin: Some("https://mirror.example/".into()),
            ..ListenerConfig::default()
        };
        assert_eq!(
            gateway_origin(Some("internal:8080"), &HeaderMap::new(), &listener),
            "https://mirror.example"
        );
    }

    #[test]
    fn host_falls_back_to_uri_authority() {
        let request = Request::get("http://gw.example:8080/v2/")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&request).as_deref(), Some("gw.example:8080"));

        let request = Request::get("http://ignored.example/v2/")
            .header(header::HOST, "gw.example")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&request).as_deref(), Some("gw.example"));

        let request = Request::get("/v2/").body(Body::empty()).unwrap();
        assert_eq!(request_host(&request), None);
    }
}

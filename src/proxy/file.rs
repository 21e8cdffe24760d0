//! Generic file proxy.
//!
//! # Responsibilities
//! - Validate the caller-supplied target (protocol, blocked hosts)
//! - Forward `Range` verbatim and stream the body back
//! - Bound the upstream call by a hard deadline
//!
//! # Design Decisions
//! - The deadline covers the wait for response headers; once streaming
//!   starts the body is relayed as it arrives
//! - Only the file allow-list of response headers is relayed

use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::response::Response;
use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::config::FileProxyConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::proxy::relay;
use crate::resilience::with_deadline;
use crate::security::headers::{ResponseHeaderPolicy, FILE_RESPONSE_HEADERS};

pub const USAGE: &str = "/proxy/?url=https://example.com/file.zip";

pub struct FileProxy {
    client: reqwest::Client,
    allowed_protocols: Vec<String>,
    blocked_domains: Vec<String>,
    timeout: Duration,
    default_user_agent: String,
}

impl FileProxy {
    pub fn new(client: reqwest::Client, config: &FileProxyConfig) -> Self {
        Self {
            client,
            allowed_protocols: config
                .allowed_protocols
                .iter()
                .map(|p| p.trim_end_matches(':').to_ascii_lowercase())
                .collect(),
            blocked_domains: config
                .blocked_domains
                .iter()
                .map(|d| normalize_host(d))
                .collect(),
            timeout: Duration::from_secs(config.timeout_secs),
            default_user_agent: config.default_user_agent.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Parse `target` and check it against the protocol and host policy.
    pub fn validate_target(&self, target: &str) -> GatewayResult<Url> {
        let url = Url::parse(target.trim())
            .map_err(|e| GatewayError::InvalidTarget(format!("{target}: {e}")))?;

        if !self.allowed_protocols.iter().any(|p| p == url.scheme()) {
            return Err(GatewayError::InvalidTarget(format!(
                "protocol `{}` is not allowed",
                url.scheme()
            )));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) => normalize_host(domain),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(GatewayError::InvalidTarget(format!("{target}: no host"))),
        };
        if self.is_blocked(&host) {
            return Err(GatewayError::ForbiddenTarget(host));
        }
        Ok(url)
    }

    fn is_blocked(&self, host: &str) -> bool {
        self.blocked_domains.iter().any(|blocked| {
            host == blocked
                || host
                    .strip_suffix(blocked.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Fetch `target` and stream it back.
    pub async fn proxy(
        &self,
        target: &str,
        range: Option<&HeaderValue>,
        user_agent: Option<&HeaderValue>,
    ) -> GatewayResult<Response> {
        let url = self.validate_target(target)?;

        let mut outbound = self.client.get(url.clone());
        outbound = match user_agent {
            Some(ua) => outbound.header(header::USER_AGENT, ua.clone()),
            None => outbound.header(header::USER_AGENT, self.default_user_agent.as_str()),
        };
        if let Some(range) = range {
            outbound = outbound.header(header::RANGE, range.clone());
        }

        let upstream = with_deadline(self.timeout, outbound.send())
            .await
            .inspect_err(|e| {
                tracing::warn!(target = %url, error = %e, "File fetch failed");
                metrics::record_upstream_error("file");
            })?;

        let mut response = relay(upstream, ResponseHeaderPolicy::AllowList(FILE_RESPONSE_HEADERS));
        if !response.headers().contains_key(header::CONTENT_DISPOSITION) {
            if let Some(value) = attachment_disposition(&url) {
                response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
            }
        }
        Ok(response)
    }
}

fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// `attachment; filename="<last segment>"` when the decoded last segment looks like a file.
fn attachment_disposition(url: &Url) -> Option<HeaderValue> {
    let segment = url.path_segments()?.next_back()?;
    let name = percent_decode_str(segment).decode_utf8().ok()?;
    if name.is_empty() || !name.contains('.') || name.contains(['"', '\\']) {
        return None;
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> FileProxy {
        FileProxy::new(reqwest::Client::new(), &FileProxyConfig::default())
    }

    #[test]
    fn accepts_public_http_targets() {
        let url = proxy().validate_target("https://example.com/file.bin").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn rejects_bad_protocols_and_garbage() {
        let p = proxy();
        assert!(matches!(
            p.validate_target("ftp://example.com/file.bin"),
            Err(GatewayError::InvalidTarget(_))
        ));
        assert!(matches!(
            p.validate_target("not a url"),
            Err(GatewayError::InvalidTarget(_))
        ));
    }

    #[test]
    fn rejects_loopback_hosts() {
        let p = proxy();
        for target in [
            "http://localhost/x",
            "http://LOCALHOST:8080/x",
            "http://api.localhost/x",
            "http://127.0.0.1/x",
            "http://[::1]:9000/x",
            "http://0.0.0.0/x",
        ] {
            assert!(
                matches!(p.validate_target(target), Err(GatewayError::ForbiddenTarget(_))),
                "{target} should be forbidden"
            );
        }
        assert!(p.validate_target("http://notlocalhost.example/x").is_ok());
    }

    #[test]
    fn disposition_from_last_segment() {
        let url = Url::parse("https://example.com/dl/archive.tar.gz?sig=1").unwrap();
        assert_eq!(
            attachment_disposition(&url).unwrap(),
            "attachment; filename=\"archive.tar.gz\""
        );
        let url = Url::parse("https://example.com/dl/latest").unwrap();
        assert!(attachment_disposition(&url).is_none());
    }

    #[test]
    fn disposition_decodes_percent_escapes() {
        let url = Url::parse("https://example.com/dl/my%20file.zip").unwrap();
        assert_eq!(
            attachment_disposition(&url).unwrap(),
            "attachment; filename=\"my file.zip\""
        );
        let url = Url::parse("https://example.com/dl/bad%FF.zip").unwrap();
        assert!(attachment_disposition(&url).is_none());
        let url = Url::parse("https://example.com/dl/a%22b.zip").unwrap();
        assert!(attachment_disposition(&url).is_none());
    }
}

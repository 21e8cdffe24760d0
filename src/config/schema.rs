//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, origin derivation).
    pub listener: ListenerConfig,

    /// Outbound timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-client sliding window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Source-control proxy (allow-list, blocklists, upstream host).
    pub source_control: SourceControlConfig,

    /// Container registry protocol proxy.
    pub registry: RegistryConfig,

    /// Generic file proxy.
    pub file_proxy: FileProxyConfig,

    /// Surrounding API backend (admin API, short links, subdomains).
    pub directory: DirectoryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin listener.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Scheme used for the gateway origin when no `X-Forwarded-Proto` is present.
    pub default_scheme: String,

    /// Fixed public origin (e.g. "https://gw.example.com"), overrides the Host header.
    pub public_origin: Option<String>,

    /// Trust `CF-Connecting-IP` / `X-Real-IP` / `X-Forwarded-*` from the edge.
    pub trust_forwarded_headers: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            default_scheme: "https".to_string(),
            public_origin: None,
            trust_forwarded_headers: true,
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 10 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per client within one window.
    pub limit: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Entry count above which stale clients are evicted.
    pub max_entries: usize,

    /// Interval of the scheduled sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 60,
            window_secs: 60,
            max_entries: 10_000,
            sweep_interval_secs: 300,
        }
    }
}

/// Source-control proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceControlConfig {
    /// Upstream base URL (scheme + host).
    pub upstream: String,

    /// Client signature substrings allowed through (case-insensitive).
    pub allowed_clients: Vec<String>,

    /// Path substrings that are never proxied (case-insensitive).
    pub blocked_paths: Vec<String>,

    /// File extensions that are never proxied (case-insensitive).
    pub blocked_extensions: Vec<String>,
}

impl Default for SourceControlConfig {
    fn default() -> Self {
        Self {
            upstream: "https://github.com".to_string(),
            allowed_clients: to_strings(&[
                "git/",
                "curl/",
                "wget/",
                "libcurl/",
                "Go-http-client",
                "python-requests",
                "axios/",
                "node-fetch",
                "Mozilla/",
            ]),
            blocked_paths: to_strings(&[
                "/login",
                "/logout",
                "/signup",
                "/join",
                "/sessions",
                "/settings",
                "/password_reset",
                "/users/",
                "/orgs/",
                "/.git/config",
            ]),
            blocked_extensions: to_strings(&[
                ".zip", ".tar.gz", ".tgz", ".exe", ".dmg", ".pkg", ".deb", ".rpm", ".msi", ".iso",
            ]),
        }
    }
}

/// Container registry proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Upstream registry base URL.
    pub upstream: String,

    /// Service name advertised in the rewritten challenge.
    pub service: String,

    /// Token realm assumed when the upstream challenge has none.
    pub default_realm: String,

    /// Token service assumed when the upstream challenge has none.
    pub default_service: String,

    /// Namespace inserted in front of single-segment repository names.
    pub default_namespace: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            upstream: "https://registry-1.docker.io".to_string(),
            service: "edge-registry-proxy".to_string(),
            default_realm: "https://auth.docker.io/token".to_string(),
            default_service: "registry.docker.io".to_string(),
            default_namespace: "library".to_string(),
        }
    }
}

/// Generic file proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileProxyConfig {
    /// URL schemes accepted as targets.
    pub allowed_protocols: Vec<String>,

    /// Hostnames (and their subdomains) that may never be fetched.
    pub blocked_domains: Vec<String>,

    /// Deadline for the upstream to answer, in seconds.
    pub timeout_secs: u64,

    /// User-Agent sent upstream when the caller did not send one.
    pub default_user_agent: String,
}

impl Default for FileProxyConfig {
    fn default() -> Self {
        Self {
            allowed_protocols: to_strings(&["https", "http"]),
            blocked_domains: to_strings(&["localhost", "127.0.0.1", "0.0.0.0", "::1"]),
            timeout_secs: 300,
            default_user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

/// Surrounding API backend used by the router for non-proxy routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Base URL of the API backend. Unset means those routes answer 503.
    pub api_base: Option<String>,

    /// Parent domain for wildcard subdomain redirects (e.g. "example.com").
    pub subdomain_suffix: Option<String>,

    /// Subdomain labels that are never treated as redirects.
    pub reserved_subdomains: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            subdomain_suffix: None,
            reserved_subdomains: to_strings(&["www"]),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin listener bind address.
    pub bind_address: String,
}

/// Placeholder key shipped in defaults; validation refuses it when admin is enabled.
pub const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_ADMIN_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

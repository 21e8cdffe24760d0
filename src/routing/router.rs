//! Request classification.
//!
//! # Responsibilities
//! - Map (method, host, path) onto exactly one [`Route`]
//! - Keep the dispatch order in one place
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Pure: no I/O, no request body access
//! - First match wins

use axum::http::Method;

use crate::config::DirectoryConfig;
use crate::routing::matcher::{is_reserved_path, SubdomainMatcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Preflight,
    Subdomain(String),
    Api,
    FileProxy,
    RegistryRoot,
    RegistryAuth,
    Registry,
    ShortLink(String),
    SourceControl,
    Fallback,
}

impl Route {
    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Subdomain(_) => "subdomain",
            Self::Api => "api",
            Self::FileProxy => "file_proxy",
            Self::RegistryRoot => "registry_root",
            Self::RegistryAuth => "registry_auth",
            Self::Registry => "registry",
            Self::ShortLink(_) => "short_link",
            Self::SourceControl => "source_control",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestRouter {
    subdomains: Option<SubdomainMatcher>,
}

impl RequestRouter {
    pub fn from_config(config: &DirectoryConfig) -> Self {
        let subdomains = config
            .subdomain_suffix
            .as_deref()
            .filter(|suffix| !suffix.trim().is_empty())
            .map(|suffix| SubdomainMatcher::new(suffix, &config.reserved_subdomains));
        Self { subdomains }
    }

    pub fn classify(&self, method: &Method, host: Option<&str>, path: &str) -> Route {
        if *method == Method::OPTIONS {
            return Route::Preflight;
        }

        if let (Some(matcher), Some(host)) = (&self.subdomains, host) {
            if let Some(label) = matcher.label(host) {
                return Route::Subdomain(label);
            }
        }

        match path {
            "/proxy" | "/proxy/" => return Route::FileProxy,
            "/v2" | "/v2/" => return Route::RegistryRoot,
            "/v2/auth" => return Route::RegistryAuth,
            _ => {}
        }
        if path.starts_with("/api/") {
            return Route::Api;
        }
        if path.starts_with("/v2/") {
            return Route::Registry;
        }
        if let Some(code) = path.strip_prefix("/s/") {
            if !code.is_empty() && !code.contains('/') {
                return Route::ShortLink(code.to_string());
            }
        }
        if path.len() > 1 && !is_reserved_path(path) {
            return Route::SourceControl;
        }
        Route::Fallback
    }
}

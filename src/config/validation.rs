//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits, windows, timeouts > 0)
//! - Validate upstream URLs and bind addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_ADMIN_KEY};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if !matches!(config.listener.default_scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "listener.default_scheme",
            "must be \"http\" or \"https\"",
        ));
    }
    if let Some(origin) = &config.listener.public_origin {
        check_http_url(&mut errors, "listener.public_origin", origin);
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }

    let rate = &config.rate_limit;
    if rate.limit == 0 {
        errors.push(ValidationError::new("rate_limit.limit", "must be greater than 0"));
    }
    if rate.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if rate.max_entries == 0 {
        errors.push(ValidationError::new("rate_limit.max_entries", "must be greater than 0"));
    }
    if rate.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    check_http_url(&mut errors, "source_control.upstream", &config.source_control.upstream);
    if config.source_control.allowed_clients.is_empty() {
        errors.push(ValidationError::new(
            "source_control.allowed_clients",
            "must list at least one client signature",
        ));
    }

    check_http_url(&mut errors, "registry.upstream", &config.registry.upstream);
    check_http_url(&mut errors, "registry.default_realm", &config.registry.default_realm);
    if config.registry.default_namespace.is_empty() || config.registry.default_namespace.contains('/') {
        errors.push(ValidationError::new(
            "registry.default_namespace",
            "must be a single non-empty path segment",
        ));
    }

    if config.file_proxy.allowed_protocols.is_empty() {
        errors.push(ValidationError::new(
            "file_proxy.allowed_protocols",
            "must list at least one protocol",
        ));
    }
    if config.file_proxy.timeout_secs == 0 {
        errors.push(ValidationError::new("file_proxy.timeout_secs", "must be greater than 0"));
    }

    if let Some(api_base) = &config.directory.api_base {
        check_http_url(&mut errors, "directory.api_base", api_base);
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a non-placeholder value when admin is enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address {value:?}")));
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(field, format!("{value:?} is not an http(s) URL"))),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL {value:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut config = GatewayConfig::default();
        config.rate_limit.limit = 0;
        config.rate_limit.window_secs = 0;
        config.registry.upstream = "ftp://registry.example".into();
        config.directory.api_base = Some("not a url".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "rate_limit.limit",
                "rate_limit.window_secs",
                "registry.upstream",
                "directory.api_base",
            ]
        );
    }

    #[test]
    fn admin_requires_real_key() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");

        config.admin.api_key = "s3cret".into();
        assert!(validate_config(&config).is_ok());
    }
}

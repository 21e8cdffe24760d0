//! Host and path matchers used by request classification.
//!
//! # Design Decisions
//! - Host matching is case-insensitive and ignores the port
//! - Path matching is case-sensitive
//! - No regex; labels are validated by hand

/// Path prefixes that never reach the source-control proxy.
pub const RESERVED_PREFIXES: &[&str] = &["/api/", "/proxy", "/s/", "/v2/"];

pub fn is_reserved_path(path: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Matches `<label>.<suffix>` hosts and extracts the label.
#[derive(Debug, Clone)]
pub struct SubdomainMatcher {
    suffix: String,
    reserved: Vec<String>,
}

impl SubdomainMatcher {
    /// The suffix and reserved labels are normalized to lowercase.
    pub fn new<I, S>(suffix: &str, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffix = suffix.trim().trim_matches('.').to_ascii_lowercase();
        let mut reserved: Vec<String> = reserved
            .into_iter()
            .map(|label| label.as_ref().trim().to_ascii_lowercase())
            .filter(|label| !label.is_empty())
            .collect();
        // The apex's own first label is never a tenant.
        if let Some(apex_label) = suffix.split('.').next() {
            reserved.push(apex_label.to_string());
        }
        Self { suffix, reserved }
    }

    /// Lowercased tenant label when `host` is a direct child of the suffix.
    pub fn label(&self, host: &str) -> Option<String> {
        let host = strip_port(host).trim_end_matches('.').to_ascii_lowercase();
        let label = host.strip_suffix(self.suffix.as_str())?.strip_suffix('.')?;
        if !is_dns_label(label) || self.reserved.iter().any(|r| r == label) {
            return None;
        }
        Some(label.to_string())
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host;
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Single DNS label: alphanumerics and inner hyphens, at most 63 bytes.
fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}

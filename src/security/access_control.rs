//! Client allow-listing and path blocking.
//!
//! Both lists are normalized to lowercase once at construction; matching is a
//! case-insensitive substring (or suffix, for extensions) test.

use crate::config::SourceControlConfig;

/// Client signatures (User-Agent substrings) allowed through.
#[derive(Debug, Clone)]
pub struct ClientAllowList {
    signatures: Vec<String>,
}

impl ClientAllowList {
    pub fn new<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            signatures: lowercase_all(signatures),
        }
    }

    /// An absent or empty signature is never allowed.
    pub fn allows(&self, signature: &str) -> bool {
        if signature.is_empty() {
            return false;
        }
        let signature = signature.to_lowercase();
        self.signatures.iter().any(|s| signature.contains(s.as_str()))
    }
}

/// Blocked path substrings and file extensions.
#[derive(Debug, Clone)]
pub struct PathBlocklist {
    paths: Vec<String>,
    extensions: Vec<String>,
}

impl PathBlocklist {
    pub fn new<P, E, S, T>(paths: P, extensions: E) -> Self
    where
        P: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            paths: lowercase_all(paths),
            extensions: lowercase_all(extensions),
        }
    }

    pub fn is_blocked(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.paths.iter().any(|p| path.contains(p.as_str()))
            || self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}

/// Build both lists from the source-control section.
pub fn from_config(config: &SourceControlConfig) -> (ClientAllowList, PathBlocklist) {
    (
        ClientAllowList::new(&config.allowed_clients),
        PathBlocklist::new(&config.blocked_paths, &config.blocked_extensions),
    )
}

fn lowercase_all<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_matches_case_insensitively() {
        let list = ClientAllowList::new(["git/", "curl/", "Go-http-client"]);
        assert!(list.allows("git/2.44.0"));
        assert!(list.allows("CURL/8.5.0"));
        assert!(list.allows("go-http-client/1.1"));
        assert!(!list.allows("python-urllib/3.11"));
        assert!(!list.allows(""));
    }

    #[test]
    fn blocklist_checks_substrings_and_extensions() {
        let (_, blocklist) = from_config(&SourceControlConfig::default());
        assert!(blocklist.is_blocked("/login"));
        assert!(blocklist.is_blocked("/owner/repo/SETTINGS/hooks"));
        assert!(blocklist.is_blocked("/owner/repo/archive/main.ZIP"));
        assert!(blocklist.is_blocked("/owner/repo/releases/v1.tar.gz"));
        assert!(!blocklist.is_blocked("/owner/repo.git/info/refs"));
        assert!(!blocklist.is_blocked("/owner/repo/blob/main/zip.rs"));
    }
}

//! Policy guard: the single admission point for the source-control proxy.

use std::sync::Arc;
use std::time::Duration;

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::access_control::{ClientAllowList, PathBlocklist};
use crate::security::rate_limit::{RateDecision, RateLimiter};

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ClientNotAllowed,
    PathBlocked,
    RateLimited { limit: u32, retry_after: Duration },
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ClientNotAllowed => "client_not_allowed",
            Self::PathBlocked => "path_blocked",
            Self::RateLimited { .. } => "rate_limited",
        }
    }
}

impl From<Rejection> for GatewayError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::ClientNotAllowed => GatewayError::ClientNotAllowed,
            Rejection::PathBlocked => GatewayError::PathBlocked,
            Rejection::RateLimited { limit, retry_after } => {
                GatewayError::RateLimited { limit, retry_after }
            }
        }
    }
}

/// Budget information for an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub limit: u32,
    pub remaining: u32,
    pub window: Duration,
}

pub struct PolicyGuard {
    clients: ClientAllowList,
    paths: PathBlocklist,
    limiter: Arc<RateLimiter>,
}

impl PolicyGuard {
    pub fn new(clients: ClientAllowList, paths: PathBlocklist, limiter: Arc<RateLimiter>) -> Self {
        Self {
            clients,
            paths,
            limiter,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Admit or reject a request. Only admitted requests consume rate budget.
    pub fn admit(
        &self,
        client_id: &str,
        client_signature: &str,
        path: &str,
    ) -> Result<Admission, Rejection> {
        let result = self.evaluate(client_id, client_signature, path);
        if let Err(rejection) = &result {
            tracing::warn!(
                client = %client_id,
                signature = %client_signature,
                path = %path,
                reason = rejection.reason(),
                "Request rejected by policy"
            );
            metrics::record_policy_rejection(rejection.reason());
        }
        result
    }

    fn evaluate(
        &self,
        client_id: &str,
        client_signature: &str,
        path: &str,
    ) -> Result<Admission, Rejection> {
        if !self.clients.allows(client_signature) {
            return Err(Rejection::ClientNotAllowed);
        }
        if self.paths.is_blocked(path) {
            return Err(Rejection::PathBlocked);
        }
        match self.limiter.check(client_id) {
            RateDecision::Allowed { remaining } => Ok(Admission {
                limit: self.limiter.limit(),
                remaining,
                window: self.limiter.window(),
            }),
            RateDecision::Limited { retry_after } => Err(Rejection::RateLimited {
                limit: self.limiter.limit(),
                retry_after,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceControlConfig;
    use crate::security::access_control;

    fn guard(limit: u32) -> PolicyGuard {
        let (clients, paths) = access_control::from_config(&SourceControlConfig::default());
        let limiter = Arc::new(RateLimiter::new(limit, Duration::from_secs(60), 100));
        PolicyGuard::new(clients, paths, limiter)
    }

    #[test]
    fn unknown_client_rejected_regardless_of_path() {
        let guard = guard(10);
        assert_eq!(
            guard.admit("1.2.3.4", "SomeBot/1.0", "/owner/repo"),
            Err(Rejection::ClientNotAllowed)
        );
        assert_eq!(
            guard.admit("1.2.3.4", "SomeBot/1.0", "/login"),
            Err(Rejection::ClientNotAllowed)
        );
    }

    #[test]
    fn blocked_path_rejected_for_allowed_client() {
        let guard = guard(10);
        assert_eq!(
            guard.admit("1.2.3.4", "git/2.44.0", "/settings/profile"),
            Err(Rejection::PathBlocked)
        );
    }

    #[test]
    fn rejections_do_not_consume_budget() {
        let guard = guard(1);
        let _ = guard.admit("1.2.3.4", "curl/8.0", "/login");
        let _ = guard.admit("1.2.3.4", "nope", "/owner/repo");
        let admission = guard.admit("1.2.3.4", "curl/8.0", "/owner/repo").unwrap();
        assert_eq!(admission.remaining, 0);
        assert_eq!(
            guard.admit("1.2.3.4", "curl/8.0", "/owner/repo"),
            Err(Rejection::RateLimited {
                limit: 1,
                retry_after: Duration::from_secs(60)
            })
        );
    }
}

//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Source-control request:
//!     → access_control.rs (client allow-list, path blocklist)
//!     → rate_limit.rs (per-client sliding window)
//!     → guard.rs (composes both, reports Admission or Rejection)
//!     → Pass to forwarding
//!
//! Every forwarding strategy:
//!     → headers.rs (strip edge/hop-by-hop headers, relay tables, CORS)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any policy check failure
//! - Only admitted requests consume rate budget
//! - No trust in client input beyond the configured forwarded headers

pub mod access_control;
pub mod guard;
pub mod headers;
pub mod rate_limit;

pub use guard::{Admission, PolicyGuard, Rejection};
pub use rate_limit::{RateDecision, RateLimiter};

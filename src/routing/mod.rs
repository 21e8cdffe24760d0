//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, host, path)
//!     → router.rs (classify in fixed order)
//!     → matcher.rs (subdomain labels, reserved prefixes)
//!     → Return: exactly one Route
//! ```
//!
//! # Design Decisions
//! - Built once at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always yields the same route

pub mod matcher;
pub mod router;

pub use router::{RequestRouter, Route};

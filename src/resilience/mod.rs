//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce deadline)
//!     → On failure: reported immediately as 502/504
//! ```
//!
//! # Design Decisions
//! - No retries: a failed or timed-out upstream call goes straight back to
//!   the caller, who owns retrying
//! - Once response bytes are streaming, the response cannot be substituted

pub mod timeouts;

pub use timeouts::with_deadline;

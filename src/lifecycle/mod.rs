//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build Gateway → Start listeners
//!
//! Scheduled work (scheduled.rs):
//!     Ticker → run_scheduled(SweepRateLimits)
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → broadcast → stop accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - One broadcast stops every task

pub mod scheduled;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use scheduled::{run_scheduled, JobReport, ScheduledJob, Scheduler};
pub use shutdown::Shutdown;
pub use startup::{Gateway, StartupError};

//! Edge gateway library.
//!
//! One hostname in front of a source-control host, a container registry and
//! arbitrary file origins, with a uniform admission policy and the protocol
//! rewrites that keep git, curl, wget and docker working unmodified.

pub mod admin;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::GatewayServer;
pub use lifecycle::{Gateway, Shutdown};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (client id, signature, gateway origin)
//!     → routing (classify)
//!     → proxy / directory (forward, stream back)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{build_router, dispatch, GatewayServer};

//! Serving-layer adapter.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → TraceLayer
//!     → security headers (stamped on the response)
//!     → middleware/csrf.rs (state-changing methods only)
//!     → handler
//! ```

pub mod middleware;
pub mod server;

pub use server::{build_router, AppState, HttpServer};

//! Outbound network layer.
//!
//! # Data Flow
//! ```text
//! Application call
//!     → Guard::dispatch (allowlist, anti-forgery header)
//!     → dispatch.rs (Dispatch trait; reqwest in production)
//!     → Backend
//! ```
//!
//! # Design Decisions
//! - Explicit decorator instead of patching a global call primitive
//! - Exactly one underlying call site, owned by the guard

pub mod dispatch;
pub mod request;

pub use dispatch::{Dispatch, ReqwestDispatcher};
pub use request::{OutboundRequest, OutboundResponse};

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Guard::initialize (token, headers, monitors) → Active
//!     Cache::init_global → sweeper task
//!
//! Teardown:
//!     Cache::shutdown → Shutdown::trigger → sweeper exits
//! ```
//!
//! # Design Decisions
//! - One instance per process through explicit `global()` factories
//! - Every singleton has a reset hook for deterministic tests
//! - Background tasks always listen on a shutdown channel

pub mod shutdown;
pub mod singleton;

pub use shutdown::Shutdown;
pub use singleton::Singleton;

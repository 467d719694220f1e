//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ShieldConfig (validated, immutable)
//!     → handed to each component constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the trusted-origin set in particular
//!   is fixed for the lifetime of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AppConfig;
pub use schema::CacheConfig;
pub use schema::CsrfConfig;
pub use schema::ObservabilityConfig;
pub use schema::RateLimitConfig;
pub use schema::ServerConfig;
pub use schema::ShieldConfig;

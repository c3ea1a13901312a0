//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (PORT, HOST, MONGO_URI)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc through the application context
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CorsConfig, DatabaseConfig, DocsConfig, ExternalConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, RoutingConfig, SecurityConfig, ServerConfig,
    StaticFilesConfig,
};
pub use validation::ValidationError;

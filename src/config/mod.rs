//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to HttpServer::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    RetryConfig, TimeoutConfig, TransformerConfig,
};
pub use validation::{validate_config, ValidationError};

//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ObservabilityConfig};

#[derive(Debug, thiserror::Error)]
#[error("tracing init failed: {0}")]
pub struct LoggingError(String);

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("ldp_transforming_proxy={level},tower_http={level}"))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = filter(&config.log_level);
    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    result.map_err(|e| LoggingError(e.to_string()))
}

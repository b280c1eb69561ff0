//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that the backend URI and media ranges are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::http::media_type::MediaRange;
use crate::http::origin::BackendOrigin;

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Err(e) = BackendOrigin::parse(&config.backend.base_uri) {
        errors.push(ValidationError::new("backend.base_uri", e.to_string()));
    }

    let timeouts = [
        ("timeouts.request_ms", config.timeouts.request_ms),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
        ("timeouts.backend_ms", config.timeouts.backend_ms),
        ("timeouts.description_ms", config.timeouts.description_ms),
        ("timeouts.transformer_ms", config.timeouts.transformer_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    // The backend deadline must fire before the request deadline.
    if config.timeouts.request_ms <= config.timeouts.backend_ms {
        errors.push(ValidationError::new(
            "timeouts.request_ms",
            "must be greater than timeouts.backend_ms",
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than zero"));
    }
    if config.limits.max_description_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_description_bytes",
            "must be greater than zero",
        ));
    }

    if config.transformer.max_concurrent == 0 {
        errors.push(ValidationError::new(
            "transformer.max_concurrent",
            "must be greater than zero",
        ));
    }
    for range in &config.transformer.supported_media_types {
        if let Err(e) = MediaRange::parse(range) {
            errors.push(ValidationError::new(
                "transformer.supported_media_types",
                e.to_string(),
            ));
        }
    }

    let retries = &config.transformer.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new(
            "transformer.retries.max_attempts",
            "must be at least 1",
        ));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "transformer.retries.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "localhost".to_string();
        config.backend.base_uri = "ftp://example.org".to_string();
        config.timeouts.transformer_ms = 0;
        config.transformer.supported_media_types = vec!["text".to_string()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "backend.base_uri",
                "timeouts.transformer_ms",
                "transformer.supported_media_types",
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_request_deadline_must_outlast_backend_deadline() {
        let mut config = ProxyConfig::default();
        config.timeouts.request_ms = 200;
        config.timeouts.backend_ms = 2_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "timeouts.request_ms");

        config.timeouts.request_ms = 2_000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_error_display_names_field() {
        let error = ValidationError::new("limits.max_body_bytes", "must be greater than zero");
        assert_eq!(error.to_string(), "limits.max_body_bytes: must be greater than zero");
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = ProxyConfig::default();
        config.transformer.retries.base_delay_ms = 10_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "transformer.retries.base_delay_ms");
    }
}

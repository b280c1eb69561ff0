//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the transforming proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The LDP backend every request is forwarded to.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body and description size limits.
    pub limits: LimitsConfig,

    /// Transformer discovery and invocation.
    pub transformer: TransformerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8181").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8181".to_string(),
        }
    }
}

/// Backend origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URI of the LDP server. May carry a path prefix
    /// (e.g., "http://localhost:8080/ldp").
    pub base_uri: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time for a client request/response.
    pub request_ms: u64,

    /// Connection establishment to the backend.
    pub connect_ms: u64,

    /// Waiting for the backend's response head.
    pub backend_ms: u64,

    /// Fetching a container description or probing a transformer.
    pub description_ms: u64,

    /// A single transformer call.
    pub transformer_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            connect_ms: 5_000,
            backend_ms: 25_000,
            description_ms: 5_000,
            transformer_ms: 30_000,
        }
    }
}

/// Size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest POST body buffered for forwarding and transformation.
    pub max_body_bytes: usize,

    /// Largest container or transformer description read for parsing.
    pub max_description_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            max_description_bytes: 1024 * 1024,
        }
    }
}

/// Transformer discovery and invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Media ranges forwarded to transformers that declare none themselves.
    pub supported_media_types: Vec<String>,

    /// GET the transformer for its supported input formats before calling it.
    pub probe_capabilities: bool,

    /// Upper bound on transformer calls running at once.
    pub max_concurrent: usize,

    /// Route transformer traffic through the system HTTP proxy.
    pub use_system_proxy: bool,

    /// Retry configuration for failed calls.
    pub retries: RetryConfig,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            supported_media_types: vec!["text/*".to_string()],
            probe_capabilities: true,
            max_concurrent: 64,
            use_system_proxy: false,
            retries: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

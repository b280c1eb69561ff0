//! LDP transforming reverse proxy.
//!
//! Relays every request to a Linked Data Platform backend unchanged. When a
//! POST creates a resource in a container that links to a transformer, the
//! posted payload is handed to that transformer asynchronously.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rdf;
pub mod resilience;
pub mod transform;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

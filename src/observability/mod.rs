//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay path and dispatch tasks produce:
//!     → logging.rs (structured log events, request ID in every event)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;

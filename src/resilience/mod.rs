//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transformer call fails:
//!     → retries.rs (attempt budget, which failures are worth repeating)
//!     → backoff.rs (jittered exponential delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Every external call already carries its own deadline at the call site
//! - Retrying is opt-in; the default policy makes a single attempt
//! - Backend relays are never retried: the client owns that decision

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;

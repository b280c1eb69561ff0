//! Transformation subsystem.
//!
//! # Data Flow
//! ```text
//! relayed POST (Exchange + snooped body?)
//!     → dispatch.rs (screen, then spawn)
//!     → [task] container description (snooped or GET Accept: text/turtle)
//!     → locator.rs (transformer IRI, declared formats, optional probe)
//!     → policy.rs (NoOp or Invoke)
//!     → invoker.rs (per-key dedup via inflight.rs, bounded pool, timeout)
//!     → transformer
//! ```
//!
//! # Design Decisions
//! - Best effort, at most once: nothing is queued or persisted
//! - The in-flight registry is the only shared mutable state

pub mod dispatch;
pub mod inflight;
pub mod invoker;
pub mod locator;
pub mod policy;

pub use dispatch::Dispatcher;
pub use invoker::{AsyncInvoker, Submission};
pub use policy::{Action, DispatchPolicy, Exchange, SkipReason, TransformationRequest};

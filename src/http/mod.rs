//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace)
//!     → request.rs (buffer POST body, rewrite headers for the backend)
//!     → origin.rs (backend URL, pooled client)
//!     → response.rs (strip hop-by-hop, snoop small Turtle bodies)
//!     → Send to client
//!     → [POST only] transform::Dispatcher
//! ```

pub mod body;
pub mod headers;
pub mod media_type;
pub mod origin;
pub mod request;
pub mod response;
pub mod server;

pub use media_type::{MediaType, MediaTypeSupport, SupportedMediaTypes};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;

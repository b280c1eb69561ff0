//! RDF handling subsystem.
//!
//! # Data Flow
//! ```text
//! backend body + Content-Type
//!     → description.rs (content-type gate, subject selection)
//!     → turtle.rs (lenient Turtle → triples)
//!     → vocab.rs (known predicate IRIs)
//!     → ContainerDescription
//! ```
//!
//! # Design Decisions
//! - Not a triple store: triples live only for the duration of one parse
//! - Lookup is keyed by predicate IRI over a fixed vocabulary
//! - Parsing never fails the client path

pub mod description;
pub mod turtle;
pub mod vocab;

pub use description::{parse, ContainerDescription, ParseError};

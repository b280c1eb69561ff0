//! Media types and media ranges.
//!
//! # Design Decisions
//! - Parameters (`charset`, `q`, ...) never take part in matching
//! - Type and subtype compare case-insensitively
//! - The original header value is kept verbatim so it can be forwarded as-is

use std::fmt;
use std::str::FromStr;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content types read as Turtle (N-Triples and N3 documents of the shape
/// LDP servers produce are Turtle-compatible).
const TURTLE_FAMILY: [&str; 5] = [
    "text/turtle",
    "application/x-turtle",
    "text/n3",
    "text/rdf+n3",
    "application/n-triples",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid media type '{0}'")]
pub struct MediaTypeError(pub String);

fn split_essence(value: &str) -> Result<(String, String), MediaTypeError> {
    let essence = value.split(';').next().unwrap_or_default().trim();
    let (main, sub) = essence
        .split_once('/')
        .ok_or_else(|| MediaTypeError(value.to_string()))?;
    let valid = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
    if !valid(main) || !valid(sub) {
        return Err(MediaTypeError(value.to_string()));
    }
    Ok((main.to_ascii_lowercase(), sub.to_ascii_lowercase()))
}

/// A concrete media type such as `text/plain;charset=UTF-8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    raw: String,
    main: String,
    sub: String,
}

impl MediaType {
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let (main, sub) = split_essence(value)?;
        if main == "*" || sub == "*" {
            return Err(MediaTypeError(value.to_string()));
        }
        Ok(Self {
            raw: value.trim().to_string(),
            main,
            sub,
        })
    }

    pub fn octet_stream() -> Self {
        Self {
            raw: OCTET_STREAM.to_string(),
            main: "application".to_string(),
            sub: "octet-stream".to_string(),
        }
    }

    /// The header value exactly as received, parameters included.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn main_type(&self) -> &str {
        &self.main
    }

    pub fn subtype(&self) -> &str {
        &self.sub
    }

    /// `type/subtype`, lowercased, without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main, self.sub)
    }

    pub fn is_turtle_family(&self) -> bool {
        TURTLE_FAMILY.contains(&self.essence().as_str())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// True when a `Content-Type` value names a Turtle-compatible serialization.
pub fn is_turtle(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| MediaType::parse(ct).ok())
        .is_some_and(|mt| mt.is_turtle_family())
}

/// A media range: `*/*`, `text/*` or a concrete `type/subtype`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    main: String,
    sub: String,
}

impl MediaRange {
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let (main, sub) = split_essence(value)?;
        if main == "*" && sub != "*" {
            return Err(MediaTypeError(value.to_string()));
        }
        Ok(Self { main, sub })
    }

    pub fn matches(&self, media_type: &MediaType) -> bool {
        (self.main == "*" || self.main == media_type.main_type())
            && (self.sub == "*" || self.sub == media_type.subtype())
    }
}

impl FromStr for MediaRange {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MediaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)
    }
}

/// Decides whether a transformer accepts a given media type.
///
/// Implementations must be cheap and side-effect free; they run on the
/// dispatch path for every created resource.
pub trait MediaTypeSupport: Send + Sync + fmt::Debug {
    fn supports(&self, media_type: &MediaType) -> bool;
}

/// A fixed list of accepted media ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedMediaTypes {
    ranges: Vec<MediaRange>,
}

impl SupportedMediaTypes {
    pub fn new(ranges: Vec<MediaRange>) -> Self {
        Self { ranges }
    }

    /// Accepts any `text/*` media type.
    pub fn text_only() -> Self {
        Self {
            ranges: vec![MediaRange {
                main: "text".to_string(),
                sub: "*".to_string(),
            }],
        }
    }

    pub fn parse_all<I, S>(values: I) -> Result<Self, MediaTypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ranges = values
            .into_iter()
            .map(|v| MediaRange::parse(v.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(ranges))
    }

    /// Lenient variant for capability declarations found in the wild:
    /// entries that do not parse are dropped.
    pub fn parse_lenient<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ranges = values
            .into_iter()
            .filter_map(|v| MediaRange::parse(v.as_ref()).ok())
            .collect();
        Self::new(ranges)
    }

    pub fn ranges(&self) -> &[MediaRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl Default for SupportedMediaTypes {
    fn default() -> Self {
        Self::text_only()
    }
}

impl MediaTypeSupport for SupportedMediaTypes {
    fn supports(&self, media_type: &MediaType) -> bool {
        self.ranges.iter().any(|range| range.matches(media_type))
    }
}

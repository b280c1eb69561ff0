//! Transformer location and capability discovery.
//!
//! # Responsibilities
//! - Turn a container description into a [`TransformerTarget`]
//! - Carry any media types declared for the transformer in the triples
//! - Optionally probe the transformer for the formats it accepts
//!
//! # Design Decisions
//! - The locator never decides eligibility; that is the dispatch policy's job
//! - A failed probe is not an error: the configured media types apply

use std::time::Duration;

use axum::body::Body;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::http::body::{collect_limited, Collected};
use crate::http::media_type::SupportedMediaTypes;
use crate::rdf::{self, ContainerDescription, ParseError};

/// Where to send a transformation, and what it claims to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerTarget {
    pub uri: Url,
    /// Subject IRI of the container that linked to the transformer.
    pub container: Option<Url>,
    /// Media ranges the transformer declared, if it declared any.
    pub declared: Option<SupportedMediaTypes>,
}

impl TransformerTarget {
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            container: None,
            declared: None,
        }
    }
}

fn declared_from(formats: Option<&[String]>) -> Option<SupportedMediaTypes> {
    formats
        .map(|formats| SupportedMediaTypes::parse_lenient(formats))
        .filter(|declared| !declared.is_empty())
}

/// Find the transformer a container links to.
pub fn locate(description: &ContainerDescription) -> Option<TransformerTarget> {
    let uri = description.transformer.clone()?;
    let declared = declared_from(description.supported_formats(&uri));
    Some(TransformerTarget {
        uri,
        container: description.subject.clone(),
        declared,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("transformer did not answer the probe within {0:?}")]
    Timeout(Duration),
    #[error("probe request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("probe answered {0}")]
    Status(reqwest::StatusCode),
    #[error("probe body failed: {0}")]
    Body(#[from] axum::Error),
    #[error("transformer description exceeds {0} bytes")]
    TooLarge(usize),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Asks a transformer which input formats it supports by reading its own
/// RDF description.
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl CapabilityProbe {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    /// Fill `target.declared` from the transformer's description when it
    /// declares supported input formats. Leaves it untouched otherwise.
    pub async fn discover(&self, target: &mut TransformerTarget) {
        let outcome = tokio::time::timeout(self.timeout, self.fetch(&target.uri))
            .await
            .unwrap_or(Err(ProbeError::Timeout(self.timeout)));

        match outcome {
            Ok(Some(declared)) => {
                tracing::debug!(
                    transformer = %target.uri,
                    formats = declared.ranges().len(),
                    "Transformer declared supported formats"
                );
                target.declared = Some(declared);
            }
            Ok(None) => {
                tracing::debug!(transformer = %target.uri, "Transformer declares no input formats");
            }
            Err(e) => {
                tracing::debug!(
                    transformer = %target.uri,
                    error = %e,
                    "Capability probe failed, falling back to configured media types"
                );
            }
        }
    }

    async fn fetch(&self, uri: &Url) -> Result<Option<SupportedMediaTypes>, ProbeError> {
        let response = self
            .client
            .get(uri.clone())
            .header(ACCEPT, "text/turtle")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes as u64) {
            return Err(ProbeError::TooLarge(self.max_bytes));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = match collect_limited(Body::new(reqwest::Body::from(response)), self.max_bytes).await? {
            Collected::Complete(bytes) => bytes,
            Collected::TooLarge => return Err(ProbeError::TooLarge(self.max_bytes)),
        };

        let description = rdf::parse(&body, content_type.as_deref(), uri)?;
        Ok(declared_from(
            description
                .supported_formats(uri)
                .or_else(|| description.own_supported_formats()),
        ))
    }
}

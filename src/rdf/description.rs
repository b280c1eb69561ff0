//! Container descriptions.
//!
//! # Responsibilities
//! - Parse a backend's RDF body into a [`ContainerDescription`]
//! - Pick the primary subject the body talks about
//! - Extract the LDP membership triples and the transformer link
//!
//! # Design Decisions
//! - Non-Turtle bodies yield an empty description, not an error
//! - First transformer link wins when several are present
//! - Pure function of its input; nothing is cached

use std::collections::{BTreeSet, HashMap};

use url::Url;

use crate::http::media_type;
use crate::rdf::turtle::{self, Term, Triple};
use crate::rdf::vocab;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("description is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// The parts of an LDP container description the proxy cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDescription {
    pub subject: Option<Url>,
    pub types: BTreeSet<String>,
    pub membership_resource: Option<Url>,
    pub has_member_relation: Option<Url>,
    pub inserted_content_relation: Option<Url>,
    pub transformer: Option<Url>,
    /// `Content-Type` of the response the description came from.
    pub content_type: Option<String>,
    /// `trans:supportedInputFormat` values, keyed by subject IRI.
    supported_formats: HashMap<String, Vec<String>>,
}

impl ContainerDescription {
    /// A description with nothing in it.
    pub fn empty(content_type: Option<&str>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            ..Self::default()
        }
    }

    /// Input formats the document declares for `subject`, if any.
    pub fn supported_formats(&self, subject: &Url) -> Option<&[String]> {
        self.supported_formats
            .get(subject.as_str())
            .map(Vec::as_slice)
    }

    /// Input formats declared for the primary subject.
    pub fn own_supported_formats(&self) -> Option<&[String]> {
        self.subject.as_ref().and_then(|s| self.supported_formats(s))
    }
}

/// Parse a backend body into a container description.
///
/// `base` is the URL the body was fetched from; relative IRIs resolve
/// against it.
pub fn parse(
    bytes: &[u8],
    content_type: Option<&str>,
    base: &Url,
) -> Result<ContainerDescription, ParseError> {
    let mut description = ContainerDescription::empty(content_type);
    if !media_type::is_turtle(content_type) {
        tracing::debug!(content_type = ?content_type, "Not a Turtle body, no description extracted");
        return Ok(description);
    }

    let text = std::str::from_utf8(bytes)?;
    let document = turtle::read(text, base);
    if document.skipped > 0 {
        tracing::debug!(
            base = %base,
            skipped = document.skipped,
            "Ignored malformed statements in description"
        );
    }

    for triple in &document.triples {
        if triple.predicate == vocab::TRANS_SUPPORTED_INPUT_FORMAT {
            if let (Some(subject), Some(format)) =
                (triple.subject.as_iri(), triple.object.as_literal())
            {
                description
                    .supported_formats
                    .entry(subject.to_string())
                    .or_default()
                    .push(format.to_string());
            }
        }
    }

    let Some(primary) = primary_subject(&document.triples, base) else {
        return Ok(description);
    };
    description.subject = primary.as_iri().and_then(|iri| Url::parse(iri).ok());

    for triple in document.triples.iter().filter(|t| t.subject == primary) {
        match triple.predicate.as_str() {
            vocab::RDF_TYPE => {
                if let Some(iri) = triple.object.as_iri() {
                    description.types.insert(iri.to_string());
                }
            }
            vocab::LDP_MEMBERSHIP_RESOURCE => {
                set_once(&mut description.membership_resource, &triple.object)
            }
            vocab::LDP_HAS_MEMBER_RELATION => {
                set_once(&mut description.has_member_relation, &triple.object)
            }
            vocab::LDP_INSERTED_CONTENT_RELATION => {
                set_once(&mut description.inserted_content_relation, &triple.object)
            }
            predicate if vocab::is_transformer_predicate(predicate) => {
                if description.transformer.is_some() {
                    tracing::debug!(
                        ignored = ?triple.object,
                        "Multiple transformer links, keeping the first"
                    );
                }
                set_once(&mut description.transformer, &triple.object)
            }
            _ => {}
        }
    }

    Ok(description)
}

fn set_once(slot: &mut Option<Url>, object: &Term) {
    if slot.is_none() {
        *slot = object.as_iri().and_then(|iri| Url::parse(iri).ok());
    }
}

/// The resource a description is about: the subject equal to the base URL,
/// else the first subject typed as an LDP container, else the first subject.
fn primary_subject(triples: &[Triple], base: &Url) -> Option<Term> {
    let base_term = Term::Iri(base.as_str().to_string());
    if triples.iter().any(|t| t.subject == base_term) {
        return Some(base_term);
    }
    triples
        .iter()
        .find(|t| {
            t.predicate == vocab::RDF_TYPE
                && t.object.as_iri().is_some_and(vocab::is_container_type)
        })
        .or_else(|| triples.first())
        .map(|t| t.subject.clone())
}

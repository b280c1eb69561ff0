//! Vocabulary IRIs the proxy understands.
//!
//! Only the handful of predicates needed to find a transformer and describe
//! container membership are listed. Everything else in a container
//! description is ignored.

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const LDP: &str = "http://www.w3.org/ns/ldp#";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const ELDP: &str = "http://vocab.fusepool.info/eldp#";
pub const FP3: &str = "http://vocab.fusepool.info/fp3#";
pub const TRANS: &str = "http://vocab.fusepool.info/transformer#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";

pub const LDP_MEMBERSHIP_RESOURCE: &str = "http://www.w3.org/ns/ldp#membershipResource";
pub const LDP_HAS_MEMBER_RELATION: &str = "http://www.w3.org/ns/ldp#hasMemberRelation";
pub const LDP_INSERTED_CONTENT_RELATION: &str = "http://www.w3.org/ns/ldp#insertedContentRelation";

pub const LDP_CONTAINER: &str = "http://www.w3.org/ns/ldp#Container";
pub const LDP_BASIC_CONTAINER: &str = "http://www.w3.org/ns/ldp#BasicContainer";
pub const LDP_DIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#DirectContainer";
pub const LDP_INDIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#IndirectContainer";

pub const ELDP_TRANSFORMER: &str = "http://vocab.fusepool.info/eldp#transformer";
pub const FP3_TRANSFORMER: &str = "http://vocab.fusepool.info/fp3#transformer";

pub const TRANS_SUPPORTED_INPUT_FORMAT: &str =
    "http://vocab.fusepool.info/transformer#supportedInputFormat";

/// Predicates that link a container to its transformer.
pub const TRANSFORMER_PREDICATES: [&str; 2] = [ELDP_TRANSFORMER, FP3_TRANSFORMER];

/// Container types defined by LDP.
pub const CONTAINER_TYPES: [&str; 4] = [
    LDP_CONTAINER,
    LDP_BASIC_CONTAINER,
    LDP_DIRECT_CONTAINER,
    LDP_INDIRECT_CONTAINER,
];

/// Namespace for a prefix that a document used without declaring it.
///
/// Fusepool descriptions routinely write `fp:transformer` without an
/// `@prefix fp:` line, so the common prefixes resolve implicitly. A
/// declaration in the document always takes precedence.
pub fn well_known_prefix(prefix: &str) -> Option<&'static str> {
    match prefix {
        "rdf" => Some(RDF),
        "rdfs" => Some(RDFS),
        "xsd" => Some(XSD),
        "ldp" => Some(LDP),
        "dcterms" | "dct" => Some(DCTERMS),
        "eldp" => Some(ELDP),
        "fp" | "fp3" => Some(FP3),
        "trans" => Some(TRANS),
        _ => None,
    }
}

pub fn is_transformer_predicate(iri: &str) -> bool {
    TRANSFORMER_PREDICATES.contains(&iri)
}

pub fn is_container_type(iri: &str) -> bool {
    CONTAINER_TYPES.contains(&iri)
}

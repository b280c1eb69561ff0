//! Dispatch policy.
//!
//! Decides, for one relayed exchange, whether the transformer should be
//! called and builds the call if so. Pure: no I/O, no shared state.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use url::Url;
use uuid::Uuid;

use crate::http::media_type::{MediaType, MediaTypeSupport};
use crate::transform::inflight::InFlightKey;
use crate::transform::locator::TransformerTarget;

/// What the proxy saw of one client request and the backend's answer.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request_id: String,
    pub method: Method,
    /// Backend URL the request was forwarded to.
    pub request_url: Url,
    pub status: StatusCode,
    pub response_content_type: Option<String>,
    /// `Location` of the created resource, resolved against `request_url`.
    pub location: Option<Url>,
    pub posted_body: Bytes,
    pub posted_media_type: Option<MediaType>,
}

/// One transformer call, owned by the invoker once submitted.
#[derive(Debug, Clone)]
pub struct TransformationRequest {
    pub id: Uuid,
    pub request_id: String,
    pub transformer: Url,
    pub body: Bytes,
    pub media_type: MediaType,
    pub resource: Url,
    pub created_at: SystemTime,
}

impl TransformationRequest {
    pub fn key(&self) -> InFlightKey {
        InFlightKey {
            transformer: self.transformer.clone(),
            resource: self.resource.clone(),
        }
    }
}

/// Why no transformation was dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotCreatingMethod(Method),
    NotCreated(StatusCode),
    NoTransformer,
    UnsupportedMediaType(String),
}

impl SkipReason {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotCreatingMethod(_) => "not_post",
            SkipReason::NotCreated(_) => "not_created",
            SkipReason::NoTransformer => "no_transformer",
            SkipReason::UnsupportedMediaType(_) => "unsupported_media_type",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotCreatingMethod(method) => write!(f, "{method} does not create resources"),
            SkipReason::NotCreated(status) => write!(f, "backend answered {status}, nothing was created"),
            SkipReason::NoTransformer => f.write_str("container has no transformer"),
            SkipReason::UnsupportedMediaType(mt) => write!(f, "transformer does not accept {mt}"),
        }
    }
}

#[derive(Debug)]
pub enum Action {
    NoOp(SkipReason),
    Invoke(TransformationRequest),
}

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    support: Arc<dyn MediaTypeSupport>,
}

impl DispatchPolicy {
    /// `support` applies to transformers that declare no formats themselves.
    pub fn new(support: Arc<dyn MediaTypeSupport>) -> Self {
        Self { support }
    }

    /// Checks that need no container description. `None` means the exchange
    /// may still lead to a transformation.
    pub fn screen(&self, exchange: &Exchange) -> Option<SkipReason> {
        if exchange.method != Method::POST {
            return Some(SkipReason::NotCreatingMethod(exchange.method.clone()));
        }
        if exchange.status != StatusCode::CREATED {
            return Some(SkipReason::NotCreated(exchange.status));
        }
        None
    }

    pub fn decide(&self, exchange: &Exchange, target: Option<&TransformerTarget>) -> Action {
        if let Some(reason) = self.screen(exchange) {
            return Action::NoOp(reason);
        }
        let Some(target) = target else {
            return Action::NoOp(SkipReason::NoTransformer);
        };

        let media_type = exchange
            .posted_media_type
            .clone()
            .unwrap_or_else(MediaType::octet_stream);
        let supported = match &target.declared {
            Some(declared) => declared.supports(&media_type),
            None => self.support.supports(&media_type),
        };
        if !supported {
            return Action::NoOp(SkipReason::UnsupportedMediaType(media_type.essence()));
        }

        // Without a Location the container stands in for the member, which
        // coarsens deduplication to one call per container.
        let resource = exchange
            .location
            .clone()
            .or_else(|| target.container.clone())
            .unwrap_or_else(|| exchange.request_url.clone());

        Action::Invoke(TransformationRequest {
            id: Uuid::new_v4(),
            request_id: exchange.request_id.clone(),
            transformer: target.uri.clone(),
            body: exchange.posted_body.clone(),
            media_type,
            resource,
            created_at: SystemTime::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::http::media_type::SupportedMediaTypes;

    fn policy() -> DispatchPolicy {
        DispatchPolicy::new(Arc::new(SupportedMediaTypes::default()))
    }

    fn exchange() -> Exchange {
        Exchange {
            request_id: "req-1".to_string(),
            method: Method::POST,
            request_url: Url::parse("http://backend:8080/my/resource").unwrap(),
            status: StatusCode::CREATED,
            response_content_type: None,
            location: None,
            posted_body: Bytes::from_static(b"hello"),
            posted_media_type: Some(MediaType::parse("text/plain;charset=UTF-8").unwrap()),
        }
    }

    fn target() -> TransformerTarget {
        TransformerTarget {
            uri: Url::parse("http://t.example/simple-transformer").unwrap(),
            container: Some(Url::parse("http://example.org/container1/").unwrap()),
            declared: None,
        }
    }

    fn skipped(action: Action) -> SkipReason {
        match action {
            Action::NoOp(reason) => reason,
            Action::Invoke(request) => panic!("unexpected invoke: {request:?}"),
        }
    }

    fn invoked(action: Action) -> TransformationRequest {
        match action {
            Action::Invoke(request) => request,
            Action::NoOp(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_invokes_with_posted_bytes() {
        let request = invoked(policy().decide(&exchange(), Some(&target())));
        assert_eq!(request.body, Bytes::from_static(b"hello"));
        assert_eq!(request.media_type.as_str(), "text/plain;charset=UTF-8");
        assert_eq!(request.transformer.as_str(), "http://t.example/simple-transformer");
        assert_eq!(request.request_id, "req-1");
    }

    #[test]
    fn test_get_is_never_dispatched() {
        let mut ex = exchange();
        ex.method = Method::GET;
        ex.status = StatusCode::OK;
        assert_eq!(
            skipped(policy().decide(&ex, Some(&target()))),
            SkipReason::NotCreatingMethod(Method::GET)
        );
    }

    #[test]
    fn test_failed_creation_is_skipped() {
        let mut ex = exchange();
        ex.status = StatusCode::CONFLICT;
        assert_eq!(
            skipped(policy().decide(&ex, Some(&target()))),
            SkipReason::NotCreated(StatusCode::CONFLICT)
        );
    }

    #[test]
    fn test_missing_target_is_skipped() {
        assert_eq!(skipped(policy().decide(&exchange(), None)), SkipReason::NoTransformer);
    }

    #[test]
    fn test_unsupported_media_type_is_skipped() {
        let mut ex = exchange();
        ex.posted_media_type = Some(MediaType::parse("application/pdf").unwrap());
        assert_eq!(
            skipped(policy().decide(&ex, Some(&target()))),
            SkipReason::UnsupportedMediaType("application/pdf".into())
        );
    }

    #[test]
    fn test_missing_content_type_counts_as_octet_stream() {
        let mut ex = exchange();
        ex.posted_media_type = None;
        assert_eq!(
            skipped(policy().decide(&ex, Some(&target()))),
            SkipReason::UnsupportedMediaType("application/octet-stream".into())
        );
    }

    #[test]
    fn test_declared_formats_override_configured_support() {
        let mut t = target();
        t.declared = Some(SupportedMediaTypes::parse_all(["application/pdf"]).unwrap());

        let mut pdf = exchange();
        pdf.posted_media_type = Some(MediaType::parse("application/pdf").unwrap());
        invoked(policy().decide(&pdf, Some(&t)));

        assert!(matches!(
            policy().decide(&exchange(), Some(&t)),
            Action::NoOp(SkipReason::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn test_resource_prefers_location() {
        let mut ex = exchange();
        ex.location = Some(Url::parse("http://backend:8080/my/resource/member-1").unwrap());
        let request = invoked(policy().decide(&ex, Some(&target())));
        assert_eq!(request.resource.as_str(), "http://backend:8080/my/resource/member-1");
    }

    #[test]
    fn test_resource_falls_back_to_container_then_request_url() {
        let request = invoked(policy().decide(&exchange(), Some(&target())));
        assert_eq!(request.resource.as_str(), "http://example.org/container1/");

        let mut t = target();
        t.container = None;
        let request = invoked(policy().decide(&exchange(), Some(&t)));
        assert_eq!(request.resource.as_str(), "http://backend:8080/my/resource");
    }

    #[test]
    fn test_custom_support_predicate() {
        #[derive(Debug)]
        struct Everything;
        impl MediaTypeSupport for Everything {
            fn supports(&self, _: &MediaType) -> bool {
                true
            }
        }

        let policy = DispatchPolicy::new(Arc::new(Everything));
        let mut ex = exchange();
        ex.posted_media_type = Some(MediaType::parse("image/png").unwrap());
        invoked(policy.decide(&ex, Some(&target())));
    }
}

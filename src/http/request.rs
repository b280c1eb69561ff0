//! Request handling and forwarding.
//!
//! # Responsibilities
//! - Read the request ID set by the request-id layer
//! - Buffer POST bodies under the configured size limit
//! - Prepare the request for forwarding to the backend
//!
//! # Design Decisions
//! - Declared `Content-Length` is checked before any body byte is read
//! - Hop-by-hop headers never cross the proxy
//! - Method, end-to-end headers and body are forwarded unchanged

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{Request, Uri};

use crate::error::ProxyError;
use crate::http::body::{collect_limited, Collected};
use crate::http::headers::strip_hop_by_hop;
use crate::http::origin::BackendOrigin;

pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Value appended to `Via` on forwarded requests.
pub const VIA: &str = "1.1 ldp-transforming-proxy";

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Read a request body fully, refusing anything over `limit` bytes.
pub async fn buffer_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ProxyError::BodyTooLarge(limit));
    }

    match collect_limited(body, limit).await.map_err(ProxyError::ClientBody)? {
        Collected::Complete(bytes) => Ok(bytes),
        Collected::TooLarge => Err(ProxyError::BodyTooLarge(limit)),
    }
}

/// Build the backend request for an inbound one.
pub fn forward_request(
    parts: &Parts,
    body: Body,
    origin: &BackendOrigin,
    target: &Uri,
    client_addr: SocketAddr,
    request_id: &str,
) -> Result<Request<Body>, ProxyError> {
    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);

    let original_host = headers.remove(header::HOST);
    headers.insert(header::HOST, HeaderValue::from_str(&origin.authority())?);

    let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {}", client_addr.ip()),
        None => client_addr.ip().to_string(),
    };
    headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(&forwarded_for)?);
    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    let via = match headers.get(header::VIA).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {VIA}"),
        None => VIA.to_string(),
    };
    headers.insert(header::VIA, HeaderValue::from_str(&via)?);
    headers.insert(X_REQUEST_ID, HeaderValue::from_str(request_id)?);

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(target.clone())
        .body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::Method;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_forward_rewrites_host_and_appends_forwarding_headers() {
        let origin = BackendOrigin::parse("http://ldp.internal:8080/ldp").unwrap();
        let inbound = parts(
            Request::builder()
                .method(Method::POST)
                .uri("/container1/")
                .header("host", "proxy.example")
                .header("content-type", "text/plain;charset=UTF-8")
                .header("connection", "keep-alive, x-secret")
                .header("x-secret", "1")
                .header("keep-alive", "timeout=5")
                .header("x-forwarded-for", "10.0.0.1"),
        );
        let target = origin.target_uri(&inbound.uri).unwrap();
        let client: SocketAddr = "192.168.1.7:5555".parse().unwrap();

        let request =
            forward_request(&inbound, Body::empty(), &origin, &target, client, "req-42").unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri(), "http://ldp.internal:8080/ldp/container1/");
        let h = request.headers();
        assert_eq!(h["host"], "ldp.internal:8080");
        assert_eq!(h["x-forwarded-host"], "proxy.example");
        assert_eq!(h["x-forwarded-for"], "10.0.0.1, 192.168.1.7");
        assert_eq!(h["x-forwarded-proto"], "http");
        assert_eq!(h["via"], VIA);
        assert_eq!(h["x-request-id"], "req-42");
        assert_eq!(h["content-type"], "text/plain;charset=UTF-8");
        assert!(h.get("connection").is_none());
        assert!(h.get("keep-alive").is_none());
        assert!(h.get("x-secret").is_none());
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_is_refused_early() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("100"));
        let err = buffer_body(&headers, Body::from("short"), 10).await.unwrap_err();
        assert!(matches!(err, ProxyError::BodyTooLarge(10)));
    }

    #[tokio::test]
    async fn test_undeclared_length_over_limit_is_refused() {
        let err = buffer_body(&HeaderMap::new(), Body::from("0123456789abc"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::BodyTooLarge(10)));
    }

    #[tokio::test]
    async fn test_buffer_body_keeps_bytes() {
        let bytes = buffer_body(&HeaderMap::new(), Body::from("hello"), 10).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_request_id_fallback() {
        assert_eq!(request_id(&HeaderMap::new()), "unknown");
    }
}

//! Response relay.
//!
//! # Responsibilities
//! - Hand the backend response to the client unchanged
//! - Strip hop-by-hop headers
//! - Keep a copy of small Turtle bodies for transformer discovery
//! - Signal when the client body has been written out
//!
//! # Design Decisions
//! - Streaming by default; a body is only buffered when it is Turtle and
//!   declares a length within the description limit
//! - Status, end-to-end headers and body bytes are never altered
//! - The delivery signal fires on end of stream or when the body is
//!   dropped, whichever comes first

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::response::Response;
use hyper::body::{Frame, Incoming, SizeHint};
use tokio::sync::oneshot;

use crate::error::ProxyError;
use crate::http::body::{collect_limited, Collected};
use crate::http::headers::{content_length, content_type, strip_hop_by_hop};
use crate::http::media_type::is_turtle;

/// A backend response ready for the client.
pub struct Relayed {
    pub response: Response,
    /// Copy of the body, when it was read for snooping.
    pub snooped: Option<Bytes>,
    /// Resolves once the client body is finished or abandoned.
    pub delivered: oneshot::Receiver<()>,
}

/// Whether a response with these headers is worth buffering for snooping.
pub fn is_snoopable(headers: &axum::http::HeaderMap, limit: usize) -> bool {
    is_turtle(content_type(headers)) && content_length(headers).is_some_and(|len| len <= limit as u64)
}

/// Convert a backend response for the client. With `snoop_limit`, a Turtle
/// body of known, small enough length is read and kept as well.
pub async fn relay(
    response: hyper::Response<Incoming>,
    snoop_limit: Option<usize>,
) -> Result<Relayed, ProxyError> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    let limit = snoop_limit.filter(|limit| is_snoopable(&parts.headers, *limit));
    let (body, snooped) = match limit {
        None => (Body::new(body), None),
        Some(limit) => match collect_limited(Body::new(body), limit)
            .await
            .map_err(ProxyError::UpstreamBody)?
        {
            Collected::Complete(bytes) => (Body::from(bytes.clone()), Some(bytes)),
            Collected::TooLarge => return Err(ProxyError::UpstreamLength),
        },
    };

    let (body, delivered) = DeliveryBody::wrap(body);
    Ok(Relayed {
        response: Response::from_parts(parts, Body::new(body)),
        snooped,
        delivered,
    })
}

/// Client body that reports when it is done.
struct DeliveryBody {
    inner: Body,
    done: Option<oneshot::Sender<()>>,
}

impl DeliveryBody {
    fn wrap(inner: Body) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { inner, done: Some(tx) }, rx)
    }
}

impl hyper::body::Body for DeliveryBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(poll, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            if let Some(done) = this.done.take() {
                let _ = done.send(());
            }
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
    use axum::http::{HeaderMap, HeaderValue};
    use tokio::sync::oneshot::error::TryRecvError;

    fn headers(ct: &'static str, len: Option<&'static str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        if let Some(len) = len {
            h.insert(CONTENT_LENGTH, HeaderValue::from_static(len));
        }
        h
    }

    #[test]
    fn test_snoopable_requires_turtle_and_known_small_length() {
        assert!(is_snoopable(&headers("text/turtle; charset=utf-8", Some("120")), 1024));
        assert!(!is_snoopable(&headers("text/turtle", None), 1024));
        assert!(!is_snoopable(&headers("text/turtle", Some("4096")), 1024));
        assert!(!is_snoopable(&headers("text/html", Some("120")), 1024));
    }

    #[tokio::test]
    async fn test_delivery_signalled_after_body_is_read() {
        let (body, mut delivered) = DeliveryBody::wrap(Body::from("created"));
        assert_eq!(delivered.try_recv(), Err(TryRecvError::Empty));

        let bytes = axum::body::to_bytes(Body::new(body), 64).await.unwrap();
        assert_eq!(bytes, "created");
        assert_eq!(delivered.try_recv(), Ok(()));
    }

    #[tokio::test]
    async fn test_delivery_resolves_when_body_is_dropped() {
        let (body, delivered) = DeliveryBody::wrap(Body::from("unread"));
        drop(body);
        assert!(delivered.await.is_err());
    }
}

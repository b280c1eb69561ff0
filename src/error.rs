//! Errors on the client path.
//!
//! Every variant is fatal to one request only. Transformer-side failures
//! have their own types and never reach this one.

use std::time::Duration;

use axum::http::header::InvalidHeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::http::media_type::MediaTypeError;
use crate::http::origin::OriginError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid backend: {0}")]
    InvalidBackend(#[from] OriginError),
    #[error("invalid media range: {0}")]
    MediaRange(#[from] MediaTypeError),
    #[error("could not build transformer client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("could not build backend request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("backend request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("backend did not respond within {0:?}")]
    UpstreamTimeout(Duration),
    #[error("backend response body failed: {0}")]
    UpstreamBody(#[source] axum::Error),
    #[error("backend response body longer than declared")]
    UpstreamLength,
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("could not read request body: {0}")]
    ClientBody(#[source] axum::Error),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(_) | ProxyError::UpstreamBody(_) | ProxyError::UpstreamLength => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::ClientBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidBackend(_)
            | ProxyError::MediaRange(_)
            | ProxyError::HttpClient(_)
            | ProxyError::InvalidRequest(_)
            | ProxyError::InvalidHeader(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::BAD_GATEWAY => "Upstream request failed",
            StatusCode::GATEWAY_TIMEOUT => "Upstream request timed out",
            StatusCode::PAYLOAD_TOO_LARGE => "Request body too large",
            StatusCode::BAD_REQUEST => "Unreadable request body",
            _ => "Internal proxy error",
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::UpstreamTimeout(Duration::from_secs(1)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(ProxyError::BodyTooLarge(10).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ProxyError::UpstreamLength.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_into_response_keeps_status() {
        let response = ProxyError::BodyTooLarge(10).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

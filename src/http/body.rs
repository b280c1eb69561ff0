//! Bounded body reads on top of `axum::body::to_bytes`.

use axum::body::{Body, Bytes};
use http_body_util::LengthLimitError;

/// Result of reading a body under a size cap.
#[derive(Debug, PartialEq, Eq)]
pub enum Collected {
    Complete(Bytes),
    TooLarge,
}

/// Read `body` to the end, giving up once it exceeds `limit` bytes.
pub async fn collect_limited(body: Body, limit: usize) -> Result<Collected, axum::Error> {
    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => Ok(Collected::Complete(bytes)),
        Err(e) if exceeds_limit(&e) => Ok(Collected::TooLarge),
        Err(e) => Err(e),
    }
}

fn exceeds_limit(error: &axum::Error) -> bool {
    std::error::Error::source(error).is_some_and(|source| source.is::<LengthLimitError>())
}

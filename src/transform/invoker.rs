//! Asynchronous transformer invocation.
//!
//! # Responsibilities
//! - Run transformer calls on their own tasks, off the client path
//! - Enforce at-most-one call in flight per (transformer, resource)
//! - Bound the number of concurrent calls
//! - Contain every failure: log it, count it, release the key
//!
//! # State Machine (per key)
//! ```text
//! Idle → Running: submit() claims the key
//! Running → Idle: call succeeded, failed, or timed out
//! submit() while Running: request dropped (Busy)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use tokio::sync::Semaphore;

use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::transform::inflight::InFlightRegistry;
use crate::transform::policy::TransformationRequest;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("transformer did not respond within {0:?}")]
    Timeout(Duration),
    #[error("transformer request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("transformer answered {0}")]
    Status(reqwest::StatusCode),
}

impl TransformError {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            TransformError::Timeout(_) => "timeout",
            TransformError::Request(_) => "request_error",
            TransformError::Status(_) => "status_error",
        }
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, TransformError::Status(status) if status.is_client_error())
    }
}

/// What happened to a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A task was spawned for the call.
    Accepted,
    /// A call for the same key is running; this one was dropped.
    Busy,
    /// The worker pool is full; this one was dropped.
    Saturated,
}

#[derive(Debug, Clone)]
pub struct AsyncInvoker {
    client: reqwest::Client,
    registry: Arc<InFlightRegistry>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AsyncInvoker {
    pub fn new(
        client: reqwest::Client,
        max_concurrent: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            registry: Arc::new(InFlightRegistry::new()),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            timeout,
            retry,
        }
    }

    /// Hand a request off. Never blocks and never fails; the returned value
    /// is informational.
    pub fn submit(&self, request: TransformationRequest) -> Submission {
        let Some(guard) = self.registry.try_acquire(request.key()) else {
            tracing::info!(
                transformation_id = %request.id,
                transformer = %request.transformer,
                resource = %request.resource,
                "Transformation already running for resource, dropping duplicate"
            );
            metrics::record_transformation("busy", None);
            return Submission::Busy;
        };

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(
                    transformation_id = %request.id,
                    transformer = %request.transformer,
                    "Transformer worker pool saturated, dropping request"
                );
                metrics::record_transformation("saturated", None);
                return Submission::Saturated;
            }
        };

        let client = self.client.clone();
        let timeout = self.timeout;
        let retry = self.retry;
        tokio::spawn(async move {
            let _guard = guard;
            let _permit = permit;
            let started = Instant::now();

            let outcome = execute(&client, &request, timeout, retry).await;
            match &outcome {
                Ok(status) => tracing::info!(
                    request_id = %request.request_id,
                    transformation_id = %request.id,
                    transformer = %request.transformer,
                    resource = %request.resource,
                    status = %status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Transformation accepted by transformer"
                ),
                Err(e) => tracing::warn!(
                    request_id = %request.request_id,
                    transformation_id = %request.id,
                    transformer = %request.transformer,
                    resource = %request.resource,
                    error = %e,
                    "Transformation failed"
                ),
            }
            let label = outcome.as_ref().map_or_else(TransformError::label, |_| "success");
            metrics::record_transformation(label, Some(started));
        });

        Submission::Accepted
    }

    /// Number of keys with a call currently running.
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }
}

async fn execute(
    client: &reqwest::Client,
    request: &TransformationRequest,
    timeout: Duration,
    retry: RetryPolicy,
) -> Result<reqwest::StatusCode, TransformError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call(client, request, timeout).await {
            Ok(status) => return Ok(status),
            Err(e) if e.is_retryable() && retry.should_retry(attempt) => {
                let delay = retry.delay(attempt);
                tracing::info!(
                    transformation_id = %request.id,
                    attempt,
                    delay = ?delay,
                    error = %e,
                    "Retrying transformer call"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn call(
    client: &reqwest::Client,
    request: &TransformationRequest,
    timeout: Duration,
) -> Result<reqwest::StatusCode, TransformError> {
    let send = client
        .post(request.transformer.clone())
        .header(CONTENT_TYPE, request.media_type.as_str())
        .header(X_REQUEST_ID, request.request_id.as_str())
        .body(request.body.clone())
        .send();

    let response = tokio::time::timeout(timeout, send)
        .await
        .map_err(|_| TransformError::Timeout(timeout))??;

    let status = response.status();
    if status.is_success() {
        Ok(status)
    } else {
        Err(TransformError::Status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::SystemTime;

    use axum::body::Bytes;
    use url::Url;
    use uuid::Uuid;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::http::media_type::MediaType;

    fn request(server: &MockServer, resource: &str) -> TransformationRequest {
        TransformationRequest {
            id: Uuid::new_v4(),
            request_id: "req-1".to_string(),
            transformer: Url::parse(&format!("{}/simple-transformer", server.uri())).unwrap(),
            body: Bytes::from_static(b"hello"),
            media_type: MediaType::parse("text/plain;charset=UTF-8").unwrap(),
            resource: Url::parse(resource).unwrap(),
            created_at: SystemTime::now(),
        }
    }

    fn invoker(timeout: Duration) -> AsyncInvoker {
        AsyncInvoker::new(reqwest::Client::new(), 8, timeout, RetryPolicy::none())
    }

    async fn post_count(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .count()
    }

    async fn wait_idle(invoker: &AsyncInvoker) {
        for _ in 0..100 {
            if invoker.in_flight() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("invoker never became idle");
    }

    #[tokio::test]
    async fn test_posts_body_and_media_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/simple-transformer"))
            .and(header("content-type", "text/plain;charset=UTF-8"))
            .and(body_string("hello"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let invoker = invoker(Duration::from_secs(2));
        assert_eq!(invoker.submit(request(&server, "http://e.org/a")), Submission::Accepted);
        wait_idle(&invoker).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn test_duplicate_while_running_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let invoker = invoker(Duration::from_secs(2));
        assert_eq!(invoker.submit(request(&server, "http://e.org/a")), Submission::Accepted);
        assert_eq!(invoker.submit(request(&server, "http://e.org/a")), Submission::Busy);
        assert_eq!(invoker.submit(request(&server, "http://e.org/b")), Submission::Accepted);

        wait_idle(&invoker).await;
        assert_eq!(post_count(&server).await, 2);

        // Key released: a later submission runs again.
        assert_eq!(invoker.submit(request(&server, "http://e.org/a")), Submission::Accepted);
        wait_idle(&invoker).await;
        assert_eq!(post_count(&server).await, 3);
    }

    #[tokio::test]
    async fn test_timeout_releases_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let invoker = invoker(Duration::from_millis(100));
        assert_eq!(invoker.submit(request(&server, "http://e.org/a")), Submission::Accepted);
        wait_idle(&invoker).await;
        assert_eq!(invoker.submit(request(&server, "http://e.org/a")), Submission::Accepted);
    }

    #[tokio::test]
    async fn test_saturated_pool_drops_and_releases_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let invoker = AsyncInvoker::new(reqwest::Client::new(), 1, Duration::from_secs(2), RetryPolicy::none());
        assert_eq!(invoker.submit(request(&server, "http://e.org/a")), Submission::Accepted);
        assert_eq!(invoker.submit(request(&server, "http://e.org/b")), Submission::Saturated);
        assert_eq!(invoker.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_when_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        };
        let invoker = AsyncInvoker::new(reqwest::Client::new(), 4, Duration::from_secs(2), retry);
        invoker.submit(request(&server, "http://e.org/a"));
        wait_idle(&invoker).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(415))
            .expect(1)
            .mount(&server)
            .await;

        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        };
        let invoker = AsyncInvoker::new(reqwest::Client::new(), 4, Duration::from_secs(2), retry);
        invoker.submit(request(&server, "http://e.org/a"));
        wait_idle(&invoker).await;
        server.verify().await;
    }
}

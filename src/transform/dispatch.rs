//! Post-relay dispatch.
//!
//! # Responsibilities
//! - Take a relayed exchange and, off the client path, decide whether a
//!   transformer should see the posted payload
//! - Obtain the container description: snooped response body first, a
//!   follow-up `GET` on the container otherwise
//! - Hand eligible requests to the invoker
//!
//! # Design Decisions
//! - Nothing here can fail the client: every error ends as a log line and
//!   a skipped transformation
//! - Spawned work waits for the client response to be delivered before it
//!   touches the backend
//! - The description fetch goes to the backend with the same client and
//!   request ID as the relay

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request};
use tokio::sync::oneshot;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::body::{collect_limited, Collected};
use crate::http::headers::content_type;
use crate::http::media_type::MediaTypeSupport;
use crate::http::origin::BackendClient;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::rdf::{self, ContainerDescription, ParseError};
use crate::resilience::RetryPolicy;
use crate::transform::invoker::{AsyncInvoker, Submission};
use crate::transform::locator::{self, CapabilityProbe};
use crate::transform::policy::{Action, DispatchPolicy, Exchange};

#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("container did not answer within {0:?}")]
    Timeout(Duration),
    #[error("container request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("could not build container request: {0}")]
    Build(#[from] axum::http::Error),
    #[error("container answered {0}")]
    Status(axum::http::StatusCode),
    #[error("container body failed: {0}")]
    Body(#[from] axum::Error),
    #[error("container description exceeds {0} bytes")]
    TooLarge(usize),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug)]
pub struct Dispatcher {
    client: BackendClient,
    policy: DispatchPolicy,
    probe: Option<CapabilityProbe>,
    invoker: AsyncInvoker,
    description_timeout: Duration,
    max_description_bytes: usize,
}

impl Dispatcher {
    pub fn new(
        client: BackendClient,
        config: &ProxyConfig,
        support: Arc<dyn MediaTypeSupport>,
    ) -> Result<Self, ProxyError> {
        let description_timeout = Duration::from_millis(config.timeouts.description_ms);
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.timeouts.connect_ms));
        if !config.transformer.use_system_proxy {
            builder = builder.no_proxy();
        }
        let transformer_client = builder.build()?;

        let probe = config.transformer.probe_capabilities.then(|| {
            CapabilityProbe::new(
                transformer_client.clone(),
                description_timeout,
                config.limits.max_description_bytes,
            )
        });
        let invoker = AsyncInvoker::new(
            transformer_client,
            config.transformer.max_concurrent,
            Duration::from_millis(config.timeouts.transformer_ms),
            RetryPolicy::from(&config.transformer.retries),
        );

        Ok(Self {
            client,
            policy: DispatchPolicy::new(support),
            probe,
            invoker,
            description_timeout,
            max_description_bytes: config.limits.max_description_bytes,
        })
    }

    pub fn invoker(&self) -> &AsyncInvoker {
        &self.invoker
    }

    /// Start dispatch work for a relayed exchange. Returns whether a task
    /// was spawned; exchanges that cannot lead to a transformation are
    /// dropped here without any I/O. The task starts once `delivered`
    /// resolves.
    pub fn schedule(
        self: &Arc<Self>,
        exchange: Exchange,
        snooped: Option<Bytes>,
        delivered: oneshot::Receiver<()>,
    ) -> bool {
        if let Some(reason) = self.policy.screen(&exchange) {
            tracing::debug!(
                request_id = %exchange.request_id,
                reason = %reason,
                "Transformation skipped"
            );
            metrics::record_dispatch(reason.label());
            return false;
        }

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let _ = delivered.await;
            dispatcher.run(exchange, snooped).await
        });
        true
    }

    async fn run(&self, exchange: Exchange, snooped: Option<Bytes>) {
        let description = self.describe(&exchange, snooped).await;
        let mut target = description.as_ref().and_then(locator::locate);

        if let (Some(target), Some(probe)) = (target.as_mut(), &self.probe) {
            if target.declared.is_none() {
                probe.discover(target).await;
            }
        }

        match self.policy.decide(&exchange, target.as_ref()) {
            Action::NoOp(reason) => {
                tracing::debug!(
                    request_id = %exchange.request_id,
                    reason = %reason,
                    "Transformation skipped"
                );
                metrics::record_dispatch(reason.label());
            }
            Action::Invoke(request) => {
                tracing::info!(
                    request_id = %request.request_id,
                    transformation_id = %request.id,
                    transformer = %request.transformer,
                    resource = %request.resource,
                    media_type = %request.media_type,
                    "Dispatching transformation"
                );
                metrics::record_dispatch("invoke");
                if self.invoker.submit(request) != Submission::Accepted {
                    tracing::debug!(request_id = %exchange.request_id, "Transformation not started");
                }
            }
        }
    }

    /// Description of the container the POST went to. The snooped body is
    /// used when it names a transformer; otherwise the container is asked.
    async fn describe(&self, exchange: &Exchange, snooped: Option<Bytes>) -> Option<ContainerDescription> {
        if let Some(bytes) = snooped {
            match rdf::parse(&bytes, exchange.response_content_type.as_deref(), &exchange.request_url) {
                Ok(description) if description.transformer.is_some() => return Some(description),
                Ok(_) => {}
                Err(e) => tracing::debug!(
                    request_id = %exchange.request_id,
                    error = %e,
                    "Snooped response is not a usable description"
                ),
            }
        }

        match self.fetch_description(&exchange.request_url, &exchange.request_id).await {
            Ok(description) => Some(description),
            Err(e) => {
                tracing::warn!(
                    request_id = %exchange.request_id,
                    container = %exchange.request_url,
                    error = %e,
                    "Could not read container description"
                );
                None
            }
        }
    }

    async fn fetch_description(
        &self,
        url: &Url,
        request_id: &str,
    ) -> Result<ContainerDescription, DescriptionError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(header::ACCEPT, "text/turtle")
            .header(X_REQUEST_ID, request_id)
            .body(Body::empty())?;

        let response = tokio::time::timeout(self.description_timeout, self.client.request(request))
            .await
            .map_err(|_| DescriptionError::Timeout(self.description_timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(DescriptionError::Status(status));
        }
        let media_type = content_type(response.headers()).map(str::to_string);

        let read = collect_limited(Body::new(response.into_body()), self.max_description_bytes);
        let bytes = match tokio::time::timeout(self.description_timeout, read)
            .await
            .map_err(|_| DescriptionError::Timeout(self.description_timeout))??
        {
            Collected::Complete(bytes) => bytes,
            Collected::TooLarge => return Err(DescriptionError::TooLarge(self.max_description_bytes)),
        };

        Ok(rdf::parse(&bytes, media_type.as_deref(), url)?)
    }
}

//! HTTP server setup and the relay handler.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all handler
//! - Wire up middleware (request timeout, request ID, tracing)
//! - Forward every request to the backend and relay its answer
//! - Hand relayed POSTs to the transformation dispatcher
//! - Observability (metrics, correlation IDs)
//!
//! # Design Decisions
//! - The request deadline answers 504, like the backend deadline inside it
//! - Dispatch work is scheduled from the handler but waits until the
//!   client body has been written out, so the relay always goes first

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::headers::{content_type, location};
use crate::http::media_type::{MediaType, MediaTypeSupport, SupportedMediaTypes};
use crate::http::origin::{backend_client, BackendClient, BackendOrigin};
use crate::http::request::{self, buffer_body, forward_request};
use crate::http::response;
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::transform::{Dispatcher, Exchange};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub origin: Arc<BackendOrigin>,
    pub client: BackendClient,
    pub dispatcher: Arc<Dispatcher>,
    pub backend_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_description_bytes: usize,
}

/// HTTP server for the transforming proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a server whose media-type policy comes from
    /// `transformer.supported_media_types`.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let support = SupportedMediaTypes::parse_all(&config.transformer.supported_media_types)?;
        Self::with_media_support(config, Arc::new(support))
    }

    /// Create a server with a caller-supplied media-type policy.
    pub fn with_media_support(
        config: ProxyConfig,
        support: Arc<dyn MediaTypeSupport>,
    ) -> Result<Self, ProxyError> {
        let origin = Arc::new(BackendOrigin::parse(&config.backend.base_uri)?);
        let client = backend_client(Duration::from_millis(config.timeouts.connect_ms));
        let dispatcher = Arc::new(Dispatcher::new(client.clone(), &config, support)?);

        let state = AppState {
            origin,
            client,
            dispatcher: Arc::clone(&dispatcher),
            backend_timeout: Duration::from_millis(config.timeouts.backend_ms),
            max_body_bytes: config.limits.max_body_bytes,
            max_description_bytes: config.limits.max_description_bytes,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            dispatcher,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_millis(config.timeouts.request_ms),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown_rx` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.base_uri,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

/// Relay handler for every method and path.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request::request_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    let response = match relay(&state, client_addr, &request_id, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %e,
                "Relay failed"
            );
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}

async fn relay(
    state: &AppState,
    client_addr: SocketAddr,
    request_id: &str,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let target = state.origin.target_uri(&parts.uri)?;

    // Only POST bodies are needed after the relay; everything else streams.
    let (body, posted) = if parts.method == Method::POST {
        let bytes = buffer_body(&parts.headers, body, state.max_body_bytes).await?;
        (Body::from(bytes.clone()), Some(bytes))
    } else {
        (body, None)
    };

    let outbound = forward_request(&parts, body, &state.origin, &target, client_addr, request_id)?;
    let snoop_limit = posted.is_some().then_some(state.max_description_bytes);

    // One deadline covers the backend answer and any snooped body.
    let relayed = tokio::time::timeout(state.backend_timeout, async {
        match state.client.request(outbound).await {
            Ok(upstream) => response::relay(upstream, snoop_limit).await,
            Err(e) => Err(ProxyError::Upstream(e)),
        }
    })
    .await
    .map_err(|_| ProxyError::UpstreamTimeout(state.backend_timeout))??;

    let Some(posted_body) = posted else {
        return Ok(relayed.response);
    };

    match Url::parse(&target.to_string()) {
        Ok(request_url) => {
            let exchange = build_exchange(
                request_id,
                &parts,
                request_url,
                &relayed.response,
                posted_body,
            );
            state
                .dispatcher
                .schedule(exchange, relayed.snooped, relayed.delivered);
        }
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Target is not a URL, no dispatch");
        }
    }
    Ok(relayed.response)
}

fn build_exchange(
    request_id: &str,
    parts: &axum::http::request::Parts,
    target: Url,
    response: &Response,
    posted_body: axum::body::Bytes,
) -> Exchange {
    let posted_media_type = content_type(&parts.headers).and_then(|value| match MediaType::parse(value) {
        Ok(media_type) => Some(media_type),
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Ignoring unparseable Content-Type");
            None
        }
    });

    Exchange {
        request_id: request_id.to_string(),
        method: parts.method.clone(),
        status: response.status(),
        response_content_type: content_type(response.headers()).map(str::to_string),
        location: location(response.headers(), &target),
        request_url: target,
        posted_body,
        posted_media_type,
    }
}

//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ldp_transforming_proxy::config::ProxyConfig;
use ldp_transforming_proxy::http::HttpServer;
use ldp_transforming_proxy::lifecycle::Shutdown;
use ldp_transforming_proxy::transform::Dispatcher;
use wiremock::MockServer;

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub dispatcher: Arc<Dispatcher>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Configuration pointing at `backend`, with short timeouts for tests.
pub fn config_for(backend: &MockServer) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backend.base_uri = backend.uri();
    config.timeouts.backend_ms = 2_000;
    config.timeouts.description_ms = 1_000;
    config.timeouts.transformer_ms = 1_000;
    config.transformer.probe_capabilities = false;
    config
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let server = HttpServer::new(config).expect("valid proxy config");
    let dispatcher = Arc::clone(server.dispatcher());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestProxy {
        addr,
        dispatcher,
        shutdown,
    }
}

/// Client that ignores any system proxy settings.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Requests `server` received with `method` on `path`.
pub async fn received(server: &MockServer, method: &str, path: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == method && r.url.path() == path)
        .collect()
}

/// The container description used by the transforming-container scenarios.
pub fn transforming_container(transformer: &str) -> String {
    format!(
        "@prefix dcterms: <http://purl.org/dc/terms/>.\n\
         @prefix ldp: <http://www.w3.org/ns/ldp#>.\n\
         @prefix eldp: <http://vocab.fusepool.info/eldp#>.\n\
         \n\
         <http://example.org/container1/>\n   \
            a ldp:DirectContainer;\n   \
            dcterms:title \"An extracting LDP Container using simple-transformer\";\n   \
            ldp:membershipResource <http://example.org/container1/>;\n   \
            ldp:hasMemberRelation ldp:member;\n   \
            ldp:insertedContentRelation ldp:MemberSubject;\n   \
            fp:transformer <{transformer}>."
    )
}

pub const PLAIN_CONTAINER: &str = "@prefix dcterms: <http://purl.org/dc/terms/>.\n\
@prefix ldp: <http://www.w3.org/ns/ldp#>.\n\
@prefix eldp: <http://vocab.fusepool.info/eldp#>.\n\
\n\
<http://example.org/container1/>\n   a ldp:DirectContainer;\n   \
dcterms:title \"An extracting LDP Container using simple-transformer\";\n   \
ldp:membershipResource <http://example.org/container1/>;\n   \
ldp:hasMemberRelation ldp:member;\n   \
ldp:insertedContentRelation ldp:MemberSubject.";

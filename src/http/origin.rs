//! Backend origin and the client used to reach it.
//!
//! # Design Decisions
//! - The backend base URI may carry a path prefix; inbound paths are
//!   appended to it byte for byte, dot segments and escapes included
//! - Only plain HTTP origins: the connector does not speak TLS

use std::time::Duration;

use axum::body::Body;
use axum::http::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

/// Pooled HTTP/1.1 + HTTP/2 client for backend traffic.
pub type BackendClient = Client<HttpConnector, Body>;

pub fn backend_client(connect_timeout: Duration) -> BackendClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("'{0}' is not an absolute URI")]
    Invalid(String),
    #[error("unsupported scheme '{0}', only http backends are supported")]
    UnsupportedScheme(String),
    #[error("'{0}' must not carry a query or fragment")]
    QueryOrFragment(String),
}

/// The configured LDP backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOrigin {
    base: Url,
    /// Base path without its trailing slash.
    prefix: String,
}

impl BackendOrigin {
    pub fn parse(value: &str) -> Result<Self, OriginError> {
        let base = Url::parse(value).map_err(|_| OriginError::Invalid(value.to_string()))?;
        if base.scheme() != "http" {
            return Err(OriginError::UnsupportedScheme(base.scheme().to_string()));
        }
        if base.host_str().is_none() {
            return Err(OriginError::Invalid(value.to_string()));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(OriginError::QueryOrFragment(value.to_string()));
        }
        let prefix = base.path().trim_end_matches('/').to_string();
        Ok(Self { base, prefix })
    }

    /// `host[:port]`, as sent in the `Host` header.
    pub fn authority(&self) -> String {
        match (self.base.host_str(), self.base.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        }
    }

    /// Backend URI for an inbound request URI: base path prefix, then the
    /// inbound path and query as received.
    pub fn target_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        Uri::builder()
            .scheme(self.base.scheme())
            .authority(self.authority().as_str())
            .path_and_query(format!("{}{path_and_query}", self.prefix))
            .build()
    }
}

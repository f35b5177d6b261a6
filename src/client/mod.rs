//! Instrumented HTTP client.
//!
//! # Data Flow
//! ```text
//! HttpClient::send(request)
//!     → DiagnosticsService (record start, one outcome per call)
//!     → tower Timeout (request deadline)
//!     → hyper-util Client (pooled connections, connect timeout)
//!     → upstream server
//! ```
//!
//! Errors surface as `tower::BoxError` exactly as the stack produced them:
//! a `tower::timeout::error::Elapsed` for deadlines, a
//! `hyper_util::client::legacy::Error` for transport failures. Both `http://`
//! and `https://` targets are supported.

pub mod transport;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, USER_AGENT};
use hyper::{Request, Response};
use std::sync::Arc;
use tower::timeout::{Timeout, TimeoutLayer};
use tower::{BoxError, ServiceBuilder, ServiceExt};

use crate::config::{ClientConfig, DiagnosticsConfig};
use crate::diagnostics::{DiagnosticsLayer, DiagnosticsService};
use crate::observability::sink::{DiagnosticsSink, TracingSink};

pub use transport::{Transport, TransportError};

/// The full middleware stack behind [`HttpClient`].
pub type ClientService<K> = DiagnosticsService<Timeout<Transport>, K>;

/// HTTP client whose every call is observed by the diagnostics interceptor.
pub struct HttpClient<K = TracingSink> {
    service: ClientService<K>,
    sink: Arc<K>,
    user_agent: HeaderValue,
}

impl<K: DiagnosticsSink> HttpClient<K> {
    pub fn new(
        client: &ClientConfig,
        diagnostics: &DiagnosticsConfig,
        sink: K,
    ) -> Result<Self, TransportError> {
        Self::with_layer(client, DiagnosticsLayer::new(diagnostics, sink))
    }

    pub fn with_layer(
        config: &ClientConfig,
        layer: DiagnosticsLayer<K>,
    ) -> Result<Self, TransportError> {
        let sink = layer.sink().clone();
        let service = ServiceBuilder::new()
            .layer(layer)
            .layer(TimeoutLayer::new(transport::request_timeout(config)))
            .service(transport::build_transport(config)?);

        let user_agent = HeaderValue::from_str(&config.user_agent).unwrap_or_else(|_| {
            tracing::warn!(user_agent = %config.user_agent, "Invalid User-Agent, using default");
            HeaderValue::from_static("http-diagnostics")
        });

        Ok(Self {
            service,
            sink,
            user_agent,
        })
    }

    /// The sink receiving this client's outcome records.
    pub fn sink(&self) -> &Arc<K> {
        &self.sink
    }

    /// Send a request through the instrumented stack.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Incoming>, BoxError> {
        self.service.clone().oneshot(request).await
    }

    /// Issue a GET with the configured User-Agent.
    pub async fn get(&self, uri: &str) -> Result<Response<Incoming>, BoxError> {
        let request = Request::get(uri)
            .header(USER_AGENT, self.user_agent.clone())
            .body(Body::empty())?;
        self.send(request).await
    }
}

impl<K> Clone for HttpClient<K> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            sink: self.sink.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

impl HttpClient<TracingSink> {
    /// Client with default settings, logging through `tracing`.
    pub fn with_defaults() -> Result<Self, TransportError> {
        let diagnostics = DiagnosticsConfig::default();
        Self::new(
            &ClientConfig::default(),
            &diagnostics,
            TracingSink::from(&diagnostics),
        )
    }
}

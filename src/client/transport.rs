//! Transport construction and timeout enforcement.
//!
//! # Responsibilities
//! - Build the pooled hyper-util client with connector settings
//! - Terminate TLS for `https://` targets (rustls, webpki roots)
//! - Enforce connect timeout (connector) and request timeout (tower)
//!
//! # Design Decisions
//! - Every outbound call has a deadline
//! - Timeout errors stay distinct from other errors so they classify as timeouts
//! - The crypto provider is passed explicitly, never installed process-wide

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use rustls::{ClientConfig as TlsConfig, RootCertStore};

use crate::config::ClientConfig;

/// The pooled HTTP/1.1 + HTTP/2 client the interceptor wraps.
pub type Transport = Client<HttpsConnector<HttpConnector>, Body>;

/// Error building the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

pub fn connect_timeout(config: &ClientConfig) -> Duration {
    Duration::from_millis(config.connect_timeout_ms)
}

pub fn request_timeout(config: &ClientConfig) -> Duration {
    Duration::from_millis(config.request_timeout_ms)
}

pub fn connector(config: &ClientConfig) -> HttpConnector {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout(config)));
    connector.set_nodelay(true);
    // The TLS wrapper decides the scheme.
    connector.enforce_http(false);
    connector
}

/// Client TLS settings trusting the Mozilla root set.
pub fn tls_config() -> Result<TlsConfig, TransportError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = TlsConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(config)
}

pub fn build_transport(config: &ClientConfig) -> Result<Transport, TransportError> {
    let https = HttpsConnectorBuilder::new()
        .with_tls_config(tls_config()?)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(connector(config));

    Ok(Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build(https))
}

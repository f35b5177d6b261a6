//! Diagnostics demo.
//!
//! Loads configuration (from the file named by `HTTP_DIAGNOSTICS_CONFIG`,
//! else defaults), initializes logging, and issues one GET through the
//! instrumented client.
//!
//! ```text
//!   main ──▶ HttpClient ──▶ DiagnosticsService ──▶ Timeout ──▶ hyper-util Client ──▶ upstream
//!                                   │
//!                                   └──▶ (TracingSink, MetricsSink)
//! ```

use std::net::SocketAddr;
use std::path::Path;

use http_diagnostics::config::{load_config, AppConfig};
use http_diagnostics::observability::logging::init_logging;
use http_diagnostics::observability::metrics::{init_metrics, MetricsSink};
use http_diagnostics::{HttpClient, TracingSink};

const CONFIG_ENV: &str = "HTTP_DIAGNOSTICS_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => load_config(Path::new(&path))?,
        None => AppConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("http-diagnostics v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr);
    }

    let sink = (TracingSink::from(&config.diagnostics), MetricsSink);
    let client = HttpClient::new(&config.client, &config.diagnostics, sink)?;

    let response = client.get(&config.request.url).await?;
    let status = response.status();
    let body = axum::body::to_bytes(axum::body::Body::new(response.into_body()), usize::MAX).await?;

    tracing::info!(status = %status, bytes = body.len(), "Response received");
    Ok(())
}

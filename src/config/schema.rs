//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Outbound HTTP client settings.
    pub client: ClientConfig,

    /// Diagnostics interceptor settings.
    pub diagnostics: DiagnosticsConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// The request issued by the demo binary.
    pub request: RequestConfig,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Total time for request/response in milliseconds.
    pub request_timeout_ms: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,

    /// User-Agent sent on requests built by the client helpers.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
            user_agent: concat!("http-diagnostics/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Diagnostics interceptor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Include request/response header snapshots in each record.
    pub log_headers: bool,

    /// Headers whose values are masked in snapshots (case-insensitive).
    pub redact_headers: Vec<String>,

    /// Keep the query string in the logged URI.
    pub include_query: bool,

    /// Calls at least this slow are flagged and logged at WARN.
    pub slow_request_ms: Option<u64>,

    /// Level for successful, non-slow calls.
    pub success_level: LogLevel,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            log_headers: false,
            redact_headers: vec![
                "authorization".to_string(),
                "proxy-authorization".to_string(),
                "cookie".to_string(),
                "set-cookie".to_string(),
            ],
            include_query: true,
            slow_request_ms: None,
            success_level: LogLevel::Info,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directives (e.g. "info", "info,http_diagnostics=debug").
    pub log_level: String,

    /// Output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// The request issued by the demo binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Target URL (`http://` or `https://`).
    pub url: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            url: "https://api.duckduckgo.com/?q=apple&format=json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

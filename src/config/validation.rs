//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0)
//! - Validate header names/values, addresses, and the demo URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use hyper::header::{HeaderName, HeaderValue};
use hyper::Uri;
use tracing_subscriber::EnvFilter;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("client.connect_timeout_ms", "must be greater than 0"));
    }
    if config.client.request_timeout_ms == 0 {
        errors.push(ValidationError::new("client.request_timeout_ms", "must be greater than 0"));
    }
    if HeaderValue::from_str(&config.client.user_agent).is_err() {
        errors.push(ValidationError::new("client.user_agent", "not a valid header value"));
    }

    for name in &config.diagnostics.redact_headers {
        if HeaderName::from_bytes(name.trim().as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "diagnostics.redact_headers",
                format!("invalid header name {:?}", name),
            ));
        }
    }
    if config.diagnostics.slow_request_ms == Some(0) {
        errors.push(ValidationError::new("diagnostics.slow_request_ms", "must be greater than 0"));
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid filter {:?}", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    match config.request.url.parse::<Uri>() {
        Ok(uri)
            if matches!(uri.scheme_str(), Some("http" | "https")) && uri.authority().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(
            "request.url",
            "must be an absolute http:// or https:// URL",
        )),
        Err(e) => errors.push(ValidationError::new("request.url", e.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

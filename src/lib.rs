//! HTTP client diagnostics.
//!
//! A tower interceptor that observes outbound HTTP calls: it times each
//! call, classifies failures, emits exactly one structured record per call,
//! and hands the downstream response or error back untouched.
//!
//! ```no_run
//! use http_diagnostics::HttpClient;
//!
//! # async fn run() -> Result<(), tower::BoxError> {
//! let client = HttpClient::with_defaults()?;
//! let response = client.get("https://example.com/").await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

// Core
pub mod diagnostics;

// Client stack
pub mod client;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use client::HttpClient;
pub use config::AppConfig;
pub use diagnostics::{
    Classify, DiagnosticsLayer, DiagnosticsService, FailureKind, Outcome, OutcomeRecord,
};
pub use observability::{DiagnosticsSink, MemorySink, TracingSink};

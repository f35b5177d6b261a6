//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! DiagnosticsService produces one OutcomeRecord per call:
//!     → sink.rs (TracingSink: structured log event)
//!     → metrics.rs (MetricsSink: counters, histograms)
//!     → sink.rs (MemorySink: in-process capture)
//!
//! Process setup:
//!     → logging.rs (tracing-subscriber registry, filter, format)
//!     → metrics.rs (Prometheus exporter)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never preformatted strings
//! - Request ID flows through the record and the `http_request` span
//! - Metrics are cheap; with no recorder installed they are no-ops

pub mod logging;
pub mod metrics;
pub mod sink;

pub use sink::{DiagnosticsSink, MemorySink, TracingSink};

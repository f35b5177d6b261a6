//! Diagnostics interceptor subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request
//!     → layer.rs (DiagnosticsService::call: snapshot request, start clock)
//!     → guard.rs (InFlight guard owns the RequestRecord)
//!     → downstream service (exactly one call)
//!     → classify.rs (map downstream error to FailureKind)
//!     → record.rs (RequestRecord → OutcomeRecord)
//!     → DiagnosticsSink (one record per call)
//!     → caller receives the downstream result unchanged
//! ```
//!
//! # Design Decisions
//! - The service error type is the downstream error type
//! - Request and response are never mutated; the request id is log-only
//! - A dropped in-flight future is reported as a cancellation
//! - A panicking downstream is reported as unexpected, then the panic resumes

pub mod classify;
pub(crate) mod guard;
pub mod headers;
pub mod layer;
pub mod record;

pub use classify::{Classify, FailureKind};
pub use layer::{DiagnosticsLayer, DiagnosticsService};
pub use record::{Outcome, OutcomeRecord, RequestRecord};

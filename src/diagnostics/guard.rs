//! In-flight call guard.
//!
//! # Responsibilities
//! - Own the [`RequestRecord`] for the lifetime of one call
//! - Emit exactly one outcome record to the sink
//! - Report a cancellation when dropped before completion

use std::sync::Arc;

use hyper::header::HeaderMap;

use crate::diagnostics::classify::FailureKind;
use crate::diagnostics::headers::HeaderSnapshot;
use crate::diagnostics::layer::Settings;
use crate::diagnostics::record::{Outcome, RequestRecord};
use crate::observability::sink::DiagnosticsSink;

/// A RAII guard that closes the record of one call.
///
/// `succeed` and `fail` consume the record; if the guard is dropped while still holding
/// it, the call was abandoned and is recorded as cancelled.
pub(crate) struct InFlight<K: DiagnosticsSink> {
    record: Option<RequestRecord>,
    settings: Arc<Settings>,
    sink: Arc<K>,
}

impl<K: DiagnosticsSink> InFlight<K> {
    pub(crate) fn new(record: RequestRecord, settings: Arc<Settings>, sink: Arc<K>) -> Self {
        Self {
            record: Some(record),
            settings,
            sink,
        }
    }

    /// Record a response from the downstream service.
    pub fn succeed(mut self, status: hyper::StatusCode, headers: &HeaderMap) {
        let snapshot = self
            .settings
            .log_headers
            .then(|| self.settings.redactor.snapshot(headers));
        self.emit(Outcome::Status(status), None, snapshot);
    }

    /// Record a downstream failure.
    pub fn fail(mut self, kind: FailureKind, error: String) {
        self.emit(Outcome::Failed(kind), Some(error), None);
    }

    fn emit(
        &mut self,
        outcome: Outcome,
        error: Option<String>,
        response_headers: Option<HeaderSnapshot>,
    ) {
        if let Some(record) = self.record.take() {
            let outcome =
                record.complete(outcome, error, response_headers, self.settings.slow_threshold);
            self.sink.record(&outcome);
        }
    }
}

impl<K: DiagnosticsSink> Drop for InFlight<K> {
    fn drop(&mut self) {
        if self.record.is_none() {
            return;
        }
        let (kind, reason) = if std::thread::panicking() {
            (FailureKind::Unexpected, "downstream panicked")
        } else {
            (FailureKind::Cancelled, "request dropped before completion")
        };
        self.emit(Outcome::Failed(kind), Some(reason.to_string()), None);
    }
}

//! Outcome sinks.
//!
//! # Responsibilities
//! - Define where outcome records go ([`DiagnosticsSink`])
//! - Log each record as one structured `tracing` event ([`TracingSink`])
//! - Capture records in memory ([`MemorySink`])
//!
//! # Design Decisions
//! - Sinks are shared across concurrent calls: `Send + Sync`
//! - One `record` call writes one complete entry

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Level;

use crate::config::DiagnosticsConfig;
use crate::diagnostics::headers::HeaderSnapshot;
use crate::diagnostics::record::OutcomeRecord;

/// Log target for outcome events.
pub const TARGET: &str = "http_diagnostics";

/// Destination for outcome records.
pub trait DiagnosticsSink: Send + Sync + 'static {
    fn record(&self, outcome: &OutcomeRecord);
}

impl<T: DiagnosticsSink> DiagnosticsSink for Arc<T> {
    fn record(&self, outcome: &OutcomeRecord) {
        (**self).record(outcome)
    }
}

/// Fan-out to two sinks.
impl<A: DiagnosticsSink, B: DiagnosticsSink> DiagnosticsSink for (A, B) {
    fn record(&self, outcome: &OutcomeRecord) {
        self.0.record(outcome);
        self.1.record(outcome);
    }
}

/// Emits one `tracing` event per outcome.
///
/// Level: ERROR for failures, WARN for 5xx or slow calls, otherwise the
/// configured success level (INFO by default).
#[derive(Debug, Clone)]
pub struct TracingSink {
    success_level: Level,
}

impl TracingSink {
    pub fn new(success_level: Level) -> Self {
        Self { success_level }
    }

    fn level_for(&self, outcome: &OutcomeRecord) -> Level {
        if outcome.is_failure() {
            Level::ERROR
        } else if outcome.slow || outcome.status.map(|s| s.is_server_error()).unwrap_or(false) {
            Level::WARN
        } else {
            self.success_level
        }
    }
}

impl From<&DiagnosticsConfig> for TracingSink {
    fn from(config: &DiagnosticsConfig) -> Self {
        Self::new(config.success_level.into())
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

macro_rules! outcome_event {
    ($level:expr, $o:expr, $msg:expr) => {{
        let request_headers = $o.request_headers.as_ref().map(render_headers);
        let response_headers = $o.response_headers.as_ref().map(render_headers);
        tracing::event!(
            target: TARGET,
            $level,
            request_id = %$o.request_id,
            method = %$o.method,
            uri = %$o.uri,
            status = $o.status.map(|s| s.as_u16()),
            duration_ms = $o.duration_ms(),
            slow = $o.slow,
            error_kind = $o.failure.map(|k| k.as_str()),
            error = $o.error.as_deref(),
            request_headers = request_headers.as_deref(),
            response_headers = response_headers.as_deref(),
            "{}",
            $msg
        )
    }};
}

impl DiagnosticsSink for TracingSink {
    fn record(&self, outcome: &OutcomeRecord) {
        let message = if outcome.is_failure() {
            "HTTP request failed"
        } else {
            "HTTP request completed"
        };
        // `event!` needs a constant level.
        let level = self.level_for(outcome);
        if level == Level::ERROR {
            outcome_event!(Level::ERROR, outcome, message)
        } else if level == Level::WARN {
            outcome_event!(Level::WARN, outcome, message)
        } else if level == Level::INFO {
            outcome_event!(Level::INFO, outcome, message)
        } else if level == Level::DEBUG {
            outcome_event!(Level::DEBUG, outcome, message)
        } else {
            outcome_event!(Level::TRACE, outcome, message)
        }
    }
}

fn render_headers(headers: &HeaderSnapshot) -> String {
    headers
        .0
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic in another recorder must not lose the records already captured.
    fn lock(&self) -> MutexGuard<'_, Vec<OutcomeRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, outcome: &OutcomeRecord) {
        self.lock().push(outcome.clone());
    }
}

//! Request and outcome records.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use hyper::{Method, StatusCode};
use serde::{Serialize, Serializer};

use crate::diagnostics::classify::FailureKind;
use crate::diagnostics::headers::HeaderSnapshot;

/// State captured when a call begins.
///
/// Owned by a single interceptor invocation and consumed by [`RequestRecord::complete`].
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub request_id: String,
    pub method: Method,
    pub uri: String,
    /// Monotonic start, used for the elapsed duration.
    pub started: Instant,
    /// Wall-clock start, for log correlation.
    pub started_at: SystemTime,
    pub request_headers: Option<HeaderSnapshot>,
}

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Status(StatusCode),
    Failed(FailureKind),
}

impl Outcome {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Status(s) => Some(*s),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Outcome::Status(_) => None,
            Outcome::Failed(kind) => Some(*kind),
        }
    }

    /// Low-cardinality label: the status class or the failure kind.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Status(s) if s.is_server_error() => "5xx",
            Outcome::Status(s) if s.is_client_error() => "4xx",
            Outcome::Status(s) if s.is_redirection() => "3xx",
            Outcome::Status(s) if s.is_success() => "2xx",
            Outcome::Status(_) => "1xx",
            Outcome::Failed(kind) => kind.as_str(),
        }
    }
}

/// The single record emitted for every initiated call.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeRecord {
    pub request_id: String,
    #[serde(serialize_with = "serialize_display")]
    pub method: Method,
    pub uri: String,
    #[serde(serialize_with = "serialize_unix_millis")]
    pub started_at: SystemTime,
    #[serde(serialize_with = "serialize_status")]
    pub status: Option<StatusCode>,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub slow: bool,
    pub request_headers: Option<HeaderSnapshot>,
    pub response_headers: Option<HeaderSnapshot>,
}

impl RequestRecord {
    pub fn new(request_id: String, method: Method, uri: String) -> Self {
        Self {
            request_id,
            method,
            uri,
            started: Instant::now(),
            started_at: SystemTime::now(),
            request_headers: None,
        }
    }

    pub fn with_headers(mut self, headers: Option<HeaderSnapshot>) -> Self {
        self.request_headers = headers;
        self
    }

    /// Close the record. The elapsed time is measured here.
    pub fn complete(
        self,
        outcome: Outcome,
        error: Option<String>,
        response_headers: Option<HeaderSnapshot>,
        slow_threshold: Option<Duration>,
    ) -> OutcomeRecord {
        let duration = self.started.elapsed();
        let slow = slow_threshold.map(|t| duration >= t).unwrap_or(false);

        OutcomeRecord {
            request_id: self.request_id,
            method: self.method,
            uri: self.uri,
            started_at: self.started_at,
            status: outcome.status(),
            failure: outcome.failure(),
            error,
            duration,
            slow,
            request_headers: self.request_headers,
            response_headers,
        }
    }
}

impl OutcomeRecord {
    pub fn outcome(&self) -> Outcome {
        match (self.status, self.failure) {
            (Some(status), _) => Outcome::Status(status),
            (None, Some(kind)) => Outcome::Failed(kind),
            (None, None) => Outcome::Failed(FailureKind::Unexpected),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

fn serialize_display<S: Serializer>(value: &Method, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

fn serialize_status<S: Serializer>(value: &Option<StatusCode>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(status) => s.serialize_some(&status.as_u16()),
        None => s.serialize_none(),
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(value.as_secs_f64() * 1000.0)
}

fn serialize_unix_millis<S: Serializer>(value: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    let millis = value
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    s.serialize_u64(millis)
}

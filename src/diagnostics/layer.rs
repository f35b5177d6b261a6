//! Tower layer and service for outbound call diagnostics.
//!
//! # Responsibilities
//! - Capture the start of every call and invoke the downstream service once
//! - Close the call with a status or a classified failure
//! - Hand exactly one outcome record to the sink
//! - Return the downstream response or error untouched
//!
//! # Composition
//! ```text
//! ServiceBuilder::new()
//!     .layer(DiagnosticsLayer::new(&config, sink))
//!     .layer(TimeoutLayer::new(deadline))
//!     .service(client)
//! ```
//! Placing diagnostics outside the timeout lets deadline errors be classified.
//!
//! A panic in the downstream future is recorded as `Unexpected` and then
//! resumed, so the caller observes the same panic.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use hyper::{Request, Response};
use tower::{Layer, Service};
use tracing::Instrument;

use crate::config::DiagnosticsConfig;
use crate::diagnostics::classify::{Classify, FailureKind};
use crate::diagnostics::guard::InFlight;
use crate::diagnostics::headers::{display_uri, resolve_request_id, Redactor};
use crate::diagnostics::record::RequestRecord;
use crate::observability::sink::{DiagnosticsSink, TracingSink};

/// Immutable per-layer settings shared by every call.
#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) redactor: Redactor,
    pub(crate) log_headers: bool,
    pub(crate) include_query: bool,
    pub(crate) slow_threshold: Option<Duration>,
}

impl Settings {
    pub(crate) fn from_config(config: &DiagnosticsConfig) -> Self {
        Self {
            redactor: Redactor::new(&config.redact_headers),
            log_headers: config.log_headers,
            include_query: config.include_query,
            slow_threshold: config.slow_request_ms.map(Duration::from_millis),
        }
    }
}

/// Layer that wraps a service with [`DiagnosticsService`].
pub struct DiagnosticsLayer<K = TracingSink> {
    settings: Arc<Settings>,
    sink: Arc<K>,
}

impl<K: DiagnosticsSink> DiagnosticsLayer<K> {
    pub fn new(config: &DiagnosticsConfig, sink: K) -> Self {
        Self::with_shared_sink(config, Arc::new(sink))
    }

    /// Use a sink the caller keeps a handle to (e.g. to read captured records).
    pub fn with_shared_sink(config: &DiagnosticsConfig, sink: Arc<K>) -> Self {
        Self {
            settings: Arc::new(Settings::from_config(config)),
            sink,
        }
    }

    pub fn sink(&self) -> &Arc<K> {
        &self.sink
    }
}

impl DiagnosticsLayer<TracingSink> {
    /// Default settings, logging through `tracing`.
    pub fn with_defaults() -> Self {
        Self::new(&DiagnosticsConfig::default(), TracingSink::default())
    }
}

impl<K> Clone for DiagnosticsLayer<K> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S, K> Layer<S> for DiagnosticsLayer<K> {
    type Service = DiagnosticsService<S, K>;

    fn layer(&self, inner: S) -> Self::Service {
        DiagnosticsService {
            inner,
            settings: self.settings.clone(),
            sink: self.sink.clone(),
        }
    }
}

/// Observes each call made through `inner`.
///
/// The error type is the inner error type; failures are recorded and then
/// returned as they were received.
pub struct DiagnosticsService<S, K = TracingSink> {
    inner: S,
    settings: Arc<Settings>,
    sink: Arc<K>,
}

impl<S, K> DiagnosticsService<S, K> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Clone, K> Clone for DiagnosticsService<S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            settings: self.settings.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S, K, ReqBody, ResBody> Service<Request<ReqBody>> for DiagnosticsService<S, K>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Classify + 'static,
    ResBody: 'static,
    K: DiagnosticsSink,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // No call has started yet, so readiness errors produce no record.
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let settings = &self.settings;
        let headers = request.headers();
        let record = RequestRecord::new(
            resolve_request_id(headers),
            request.method().clone(),
            display_uri(request.uri(), settings.include_query),
        )
        .with_headers(settings.log_headers.then(|| settings.redactor.snapshot(headers)));

        let span = tracing::debug_span!(
            "http_request",
            request_id = %record.request_id,
            method = %record.method,
            uri = %record.uri,
        );
        let in_flight = InFlight::new(record, self.settings.clone(), self.sink.clone());

        let response = {
            let _enter = span.enter();
            self.inner.call(request)
        };

        Box::pin(
            async move {
                let result = match AssertUnwindSafe(response).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = format!("downstream panicked: {}", panic_message(&*payload));
                        in_flight.fail(FailureKind::Unexpected, message);
                        panic::resume_unwind(payload);
                    }
                };
                match &result {
                    Ok(response) => in_flight.succeed(response.status(), response.headers()),
                    Err(err) => in_flight.fail(err.failure_kind(), err.describe()),
                }
                result
            }
            .instrument(span),
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::headers::REDACTED;
    use crate::observability::sink::MemorySink;
    use hyper::header::{HeaderValue, AUTHORIZATION};
    use hyper::StatusCode;
    use std::fmt;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    fn capture(config: &DiagnosticsConfig) -> (DiagnosticsLayer<MemorySink>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (DiagnosticsLayer::with_shared_sink(config, sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_success_is_recorded_and_passed_through() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = ServiceBuilder::new().layer(layer).service(service_fn(|_req: Request<()>| async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            let response = Response::builder()
                .status(StatusCode::OK)
                .header("x-upstream", "a")
                .body("payload".to_string())
                .unwrap();
            Ok::<_, io::Error>(response)
        }));

        let request = Request::get("http://example.com/items").body(()).unwrap();
        let response = service.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-upstream"], "a");
        assert_eq!(response.body(), "payload");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.method, hyper::Method::GET);
        assert_eq!(record.uri, "http://example.com/items");
        assert_eq!(record.status, Some(StatusCode::OK));
        assert!(record.error.is_none());
        assert!(record.duration >= Duration::from_millis(120));
        assert!(record.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_failure() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = layer.layer(service_fn(|_req: Request<()>| async {
            let mut response = Response::new(());
            *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            Ok::<_, io::Error>(response)
        }));

        let response = service.oneshot(Request::new(())).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!records[0].is_failure());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_propagated_unchanged() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = layer.layer(service_fn(|_req: Request<()>| async {
            Err::<Response<()>, _>(io::Error::new(io::ErrorKind::ConnectionRefused, "refused by peer"))
        }));

        let err = service.oneshot(Request::new(())).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert_eq!(err.to_string(), "refused by peer");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].failure, Some(FailureKind::Network));
        assert_eq!(records[0].status, None);
        assert_eq!(records[0].error.as_deref(), Some("refused by peer"));
    }

    #[derive(Debug)]
    struct ConnectFailed(io::Error);

    impl fmt::Display for ConnectFailed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("client error (Connect)")
        }
    }

    impl std::error::Error for ConnectFailed {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[tokio::test]
    async fn test_failure_record_keeps_root_cause() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = layer.layer(service_fn(|_req: Request<()>| async {
            let cause = io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused");
            Err::<Response<()>, tower::BoxError>(Box::new(ConnectFailed(cause)))
        }));

        let err = service.oneshot(Request::new(())).await.unwrap_err();
        assert_eq!(err.to_string(), "client error (Connect)");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].failure, Some(FailureKind::Network));
        assert_eq!(
            records[0].error.as_deref(),
            Some("client error (Connect): Connection refused")
        );
    }

    #[tokio::test]
    async fn test_downstream_panic_is_recorded_and_resumed() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = layer.layer(service_fn(|_req: Request<()>| async {
            let explode = true;
            if explode {
                panic!("downstream exploded");
            }
            Ok::<_, io::Error>(Response::new(()))
        }));

        let handle = tokio::spawn(service.oneshot(Request::new(())));
        let err = handle.await.unwrap_err();
        assert!(err.is_panic());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].failure, Some(FailureKind::Unexpected));
        assert!(records[0]
            .error
            .as_deref()
            .unwrap()
            .contains("downstream exploded"));
    }

    #[tokio::test]
    async fn test_timeout_inside_is_classified() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = ServiceBuilder::new()
            .layer(layer)
            .timeout(Duration::from_millis(20))
            .service(service_fn(|_req: Request<()>| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, io::Error>(Response::new(()))
            }));

        let err = service.oneshot(Request::new(())).await.unwrap_err();
        assert!(err.is::<tower::timeout::error::Elapsed>());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].failure, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_dropped_call_is_cancelled() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = layer.layer(service_fn(|_req: Request<()>| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, io::Error>(Response::new(()))
        }));

        let call = service.oneshot(Request::new(()));
        let outer = tokio::time::timeout(Duration::from_millis(20), call).await;
        assert!(outer.is_err());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].failure, Some(FailureKind::Cancelled));
    }

    #[tokio::test]
    async fn test_downstream_called_once_and_request_untouched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = layer.layer(service_fn(move |req: Request<String>| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                assert!(req.headers().get("x-request-id").is_none());
                assert_eq!(req.body(), "body");
                Ok::<_, io::Error>(Response::new(()))
            }
        }));

        let request = Request::post("http://example.com/").body("body".to_string()).unwrap();
        service.oneshot(request).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_headers_redacted_and_query_stripped() {
        let config = DiagnosticsConfig {
            log_headers: true,
            include_query: false,
            ..DiagnosticsConfig::default()
        };
        let (layer, sink) = capture(&config);
        let service = layer.layer(service_fn(|_req: Request<()>| async {
            let response = Response::builder()
                .header("set-cookie", "session=abc")
                .header("content-type", "text/plain")
                .body(())
                .unwrap();
            Ok::<_, io::Error>(response)
        }));

        let mut request = Request::get("http://example.com/q?token=secret").body(()).unwrap();
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        request
            .headers_mut()
            .insert("x-request-id", HeaderValue::from_static("req-42"));
        service.oneshot(request).await.unwrap();

        let records = sink.records();
        let record = &records[0];
        assert_eq!(record.request_id, "req-42");
        assert_eq!(record.uri, "http://example.com/q");

        let request_headers = record.request_headers.as_ref().unwrap();
        assert_eq!(request_headers.get("authorization"), Some(REDACTED));

        let response_headers = record.response_headers.as_ref().unwrap();
        assert_eq!(response_headers.get("set-cookie"), Some(REDACTED));
        assert_eq!(response_headers.get("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_concurrent_calls_produce_complete_records() {
        let (layer, sink) = capture(&DiagnosticsConfig::default());
        let service = layer.layer(service_fn(|req: Request<()>| async move {
            let n: u64 = req.uri().path().trim_start_matches('/').parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(n % 7)).await;
            let mut response = Response::new(());
            *response.status_mut() = if n % 2 == 0 { StatusCode::OK } else { StatusCode::CREATED };
            Ok::<_, io::Error>(response)
        }));

        let mut handles = Vec::new();
        for n in 0..32u64 {
            let svc = service.clone();
            handles.push(tokio::spawn(async move {
                let request = Request::get(format!("http://example.com/{}", n)).body(()).unwrap();
                svc.oneshot(request).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records = sink.records();
        assert_eq!(records.len(), 32);
        for record in &records {
            let n: u64 = record.uri.rsplit('/').next().unwrap().parse().unwrap();
            let expected = if n % 2 == 0 { StatusCode::OK } else { StatusCode::CREATED };
            assert_eq!(record.status, Some(expected));
        }
        let mut ids: Vec<_> = records.iter().map(|r| r.request_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);
    }
}

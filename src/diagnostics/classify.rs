//! Failure classification.
//!
//! # Responsibilities
//! - Map a downstream error to a [`FailureKind`]
//! - Walk the full `source()` chain (hyper wraps io errors, tower boxes them)
//! - Render the chain as one message for the record
//!
//! # Precedence
//! ```text
//! Timeout > Network > Unexpected
//! ```
//! A connect error caused by a connect timeout is a timeout, not a network failure.
//! `Cancelled` is never derived from an error: it is reserved for calls the
//! caller abandoned. hyper's "canceled" (a pooled connection dropped before
//! dispatch) is a network failure.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::Serialize;

/// Why a call did not produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused/reset, DNS failure, closed connection.
    Network,
    /// A deadline elapsed before the response arrived.
    Timeout,
    /// The in-flight call was abandoned before completion.
    Cancelled,
    /// Anything the classifier does not recognize.
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors the interceptor knows how to classify.
///
/// Implemented for the error types produced by the client stack in this
/// crate. Downstream services with their own error types implement this
/// to get precise failure kinds; [`classify_chain`] and [`describe_chain`]
/// do the work.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;

    /// The message stored in the outcome record.
    fn describe(&self) -> String;
}

macro_rules! classify_std_error {
    ($($ty:ty),+) => {
        $(
            impl Classify for $ty {
                fn failure_kind(&self) -> FailureKind {
                    classify_chain(self)
                }

                fn describe(&self) -> String {
                    describe_chain(self)
                }
            }
        )+
    };
}

classify_std_error!(io::Error, hyper::Error, hyper_util::client::legacy::Error);

impl Classify for tower::BoxError {
    fn failure_kind(&self) -> FailureKind {
        classify_chain(&**self)
    }

    fn describe(&self) -> String {
        describe_chain(&**self)
    }
}

/// Classify an error by inspecting it and every error in its source chain.
pub fn classify_chain(err: &(dyn StdError + 'static)) -> FailureKind {
    let chain = || std::iter::successors(Some(err), |&e| e.source());

    if chain().any(is_timeout) {
        return FailureKind::Timeout;
    }
    if chain().any(is_network) {
        return FailureKind::Network;
    }
    FailureKind::Unexpected
}

fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    if err.is::<tower::timeout::error::Elapsed>() || err.is::<tokio::time::error::Elapsed>() {
        return true;
    }
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return e.kind() == io::ErrorKind::TimedOut;
    }
    if let Some(e) = err.downcast_ref::<hyper::Error>() {
        return e.is_timeout();
    }
    false
}

/// Join an error and its sources with `": "`.
///
/// A source whose message is already part of the previous one is skipped, so
/// errors that embed their cause are not repeated.
pub fn describe_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut previous = out.clone();
    for source in std::iter::successors(err.source(), |&e| e.source()) {
        let message = source.to_string();
        if message.is_empty() || previous.contains(&message) {
            continue;
        }
        out.push_str(": ");
        out.push_str(&message);
        previous = message;
    }
    out
}

fn is_network(err: &(dyn StdError + 'static)) -> bool {
    if err.is::<io::Error>() {
        return true;
    }
    if let Some(e) = err.downcast_ref::<hyper_util::client::legacy::Error>() {
        return e.is_connect();
    }
    if let Some(e) = err.downcast_ref::<hyper::Error>() {
        return e.is_canceled()
            || e.is_closed()
            || e.is_incomplete_message()
            || e.is_body_write_aborted();
    }
    false
}

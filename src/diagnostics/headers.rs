//! Header snapshots, redaction, and request id resolution.

use std::collections::HashSet;

use hyper::header::{HeaderMap, HeaderName};
use hyper::Uri;
use serde::Serialize;
use uuid::Uuid;

/// Header carrying a caller-supplied correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Replacement for values of redacted headers.
pub const REDACTED: &str = "[redacted]";

/// An owned, printable copy of a header map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderSnapshot(pub Vec<(String, String)>);

impl HeaderSnapshot {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Copies header maps, masking the values of sensitive headers.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    names: HashSet<HeaderName>,
}

impl Redactor {
    /// Build from configured header names. Names that are not valid header
    /// names are skipped; config validation reports them.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .filter_map(|n| HeaderName::from_bytes(n.as_ref().trim().as_bytes()).ok())
            .collect();
        Self { names }
    }

    pub fn is_redacted(&self, name: &HeaderName) -> bool {
        self.names.contains(name)
    }

    pub fn snapshot(&self, headers: &HeaderMap) -> HeaderSnapshot {
        let entries = headers
            .iter()
            .map(|(name, value)| {
                let value = if self.is_redacted(name) {
                    REDACTED.to_string()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name.as_str().to_string(), value)
            })
            .collect();
        HeaderSnapshot(entries)
    }
}

/// The id used to correlate log output for one call.
///
/// Reuses an inbound `x-request-id` when present; otherwise generates one.
/// The generated id is never written onto the request.
pub fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Render a URI for logging, optionally without its query string.
///
/// Userinfo (`user:pass@`) is always dropped.
pub fn display_uri(uri: &Uri, include_query: bool) -> String {
    let authority = uri.authority().map(|a| a.as_str());
    let has_userinfo = authority.map_or(false, |a| a.contains('@'));
    if !has_userinfo && (include_query || uri.query().is_none()) {
        return uri.to_string();
    }
    let host_port = authority.map(|a| a.rsplit_once('@').map_or(a, |(_, host_port)| host_port));

    let mut out = String::new();
    if let Some(scheme) = uri.scheme_str() {
        out.push_str(scheme);
        out.push_str("://");
    }
    if let Some(host_port) = host_port {
        out.push_str(host_port);
    }
    out.push_str(uri.path());
    if include_query {
        if let Some(query) = uri.query() {
            out.push('?');
            out.push_str(query);
        }
    }
    out
}

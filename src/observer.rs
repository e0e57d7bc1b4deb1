//! Helpers for request instrumentation built on the connector.
//!
//! A request observer extracts the caller-supplied correlation id from the
//! incoming request, logs one `requests` transaction per request and one
//! `exceptions` transaction per unhandled error.

use std::{collections::HashMap, hash::BuildHasher};

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::protocol::CORRELATION_HEADER;

/// Read access to request headers.
pub trait RequestMetadata {
    /// Value of header `name`, matched case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;
}

impl<S: BuildHasher> RequestMetadata for HashMap<String, String, S> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name)
            .or_else(|| {
                self.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }
}

/// Correlation id carried by `request`, if present and non-empty.
///
/// ```
/// use std::collections::HashMap;
///
/// use ustrouter_connector::observer::correlation_id;
///
/// let headers = HashMap::from([("Passenger-Txn-Id".to_owned(), "abc".to_owned())]);
/// assert_eq!(correlation_id(&headers), Some("abc"));
/// ```
#[must_use]
pub fn correlation_id<R: RequestMetadata + ?Sized>(request: &R) -> Option<&str> {
    request
        .header(CORRELATION_HEADER)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Log lines for a request to `url`.
#[must_use]
pub fn request_lines(url: &str) -> Vec<String> { vec![format!("Got request for: {url}")] }

/// Details of an unhandled error raised while serving a request.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionReport<'a> {
    /// Correlation id of the failing request, if it carried one.
    pub correlation_id: Option<&'a str>,
    /// Error message.
    pub message: &'a str,
    /// Error type name.
    pub class: &'a str,
    /// Rendered backtrace.
    pub backtrace: &'a str,
}

/// Log lines describing `report`.
///
/// The message and backtrace are base64 encoded so that embedded newlines
/// survive as a single log line.
#[must_use]
pub fn exception_lines(report: &ExceptionReport<'_>) -> Vec<String> {
    vec![
        format!(
            "Request transaction ID: {}",
            report.correlation_id.unwrap_or_default()
        ),
        format!("Message: {}", STANDARD.encode(report.message)),
        format!("Class: {}", report.class),
        format!("Backtrace: {}", STANDARD.encode(report.backtrace)),
    ]
}

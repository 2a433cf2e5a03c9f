//! Error helpers for the service clients
//!
//! Re-exports coderun-error and maps HTTP-level failures onto it.

pub use coderun_error::{Error, ErrorKind, ErrorStatus, Result};

// =============================================================================
// HTTP failure mapping
// =============================================================================

/// Map a transport error from reqwest.
///
/// Body decoding problems are parse failures; everything else (connect,
/// timeout, TLS, redirect loops) is a network failure.
pub fn request_failed(err: reqwest::Error) -> Error {
    let kind = if err.is_decode() {
        ErrorKind::ParseFailed
    } else {
        ErrorKind::NetworkFailed
    };
    let mut error = Error::new(kind, err.to_string());
    if err.is_timeout() {
        error = error.with_context("timeout", "true");
    }
    error.set_source(err)
}

/// Map a non-2xx response.
///
/// 401/403 are credential problems, 429 is throttling and retryable, and
/// 5xx responses are marked temporary. The response body is kept as the
/// message since both services put their explanation there.
pub fn status_failed(status: u16, body: impl Into<String>) -> Error {
    let kind = match status {
        401 | 403 => ErrorKind::AuthenticationFailed,
        429 => ErrorKind::RateLimited,
        _ => ErrorKind::Unexpected,
    };
    let error = Error::new(kind, body).with_context("http_status", status.to_string());
    if (500..600).contains(&status) {
        error.temporary()
    } else {
        error
    }
}

/// Map a JSON decoding error on a payload we already hold in memory
pub fn json_failed(what: &'static str, err: serde_json::Error) -> Error {
    Error::parse_failed(format!("invalid {}: {}", what, err))
        .with_context("payload", what)
        .set_source(err)
}

//! Error kinds for coderun operations

use std::fmt;

/// The kind of error that occurred.
///
/// Each phase of an invocation fails with its own kind, so callers can tell
/// a provisioning failure from a model failure or a malformed tool call by
/// matching on `ErrorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration, parameters or missing credentials
    ConfigInvalid,

    // =========================================================================
    // Sandbox errors
    // =========================================================================
    /// The sandbox service refused or failed to create a session
    ProvisionFailed,

    /// The sandbox service refused or failed to run the code
    ExecutionFailed,

    /// Tearing down a sandbox session failed
    ReleaseFailed,

    // =========================================================================
    // Inference/LLM errors
    // =========================================================================
    /// The completion request failed
    InferenceFailed,

    // =========================================================================
    // Transport errors
    // =========================================================================
    /// Network error talking to a remote service
    NetworkFailed,

    /// A remote service rejected the credentials
    AuthenticationFailed,

    /// A remote service is throttling us
    RateLimited,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse a payload (tool-call arguments, service responses)
    ParseFailed,

    /// File could not be read
    IoFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            // Sandbox
            ErrorKind::ProvisionFailed => "ProvisionFailed",
            ErrorKind::ExecutionFailed => "ExecutionFailed",
            ErrorKind::ReleaseFailed => "ReleaseFailed",

            // Inference
            ErrorKind::InferenceFailed => "InferenceFailed",

            // Transport
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::RateLimited => "RateLimited",

            // Parse / IO
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::IoFailed => "IoFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::NetworkFailed | ErrorKind::RateLimited)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

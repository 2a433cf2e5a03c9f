//! # Sandbox Service Interface
//!
//! A remote code interpreter: create a resource-bounded session, run code
//! in it, tear it down. The trait is the seam the coordinator is written
//! against; `CodeInterpreterClient` is the HTTP implementation.

pub mod client;

pub use client::CodeInterpreterClient;

use crate::config::{ResourceQuota, SessionConfig};
use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;

pub const DEFAULT_SANDBOX_URL: &str = "https://api.cognitora.dev";

/// A provisioned execution environment
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSession {
    /// Handle issued by the service
    pub id: String,
    pub language: String,
    /// Lease length; the service reclaims the session after this
    pub timeout_minutes: u32,
    pub resources: ResourceQuota,
    /// Expiry timestamp as reported by the service, if any
    pub expires_at: Option<String>,
}

impl SandboxSession {
    /// Describe a session the service just created from `config`
    pub fn from_config(id: impl Into<String>, config: &SessionConfig) -> Self {
        Self {
            id: id.into(),
            language: config.language.clone(),
            timeout_minutes: config.timeout_minutes,
            resources: config.resources.clone(),
            expires_at: None,
        }
    }
}

/// One code execution inside a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteRequest<'a> {
    pub session_id: &'a str,
    pub code: &'a str,
    pub language: &'a str,
    pub timeout_seconds: u32,
}

/// What the service reports back for an execution.
///
/// A failing program is still a successful call: the failure shows up in
/// `status` and `outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Opaque to us; passed through untouched
    #[serde(default)]
    pub outputs: serde_json::Value,
    pub status: String,
    /// Passed through as reported; integral or fractional. Missing or null is 0.
    #[serde(default = "zero", deserialize_with = "number_or_zero")]
    pub execution_time_ms: Number,
}

fn zero() -> Number {
    Number::from(0)
}

fn number_or_zero<'de, D>(deserializer: D) -> std::result::Result<Number, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Number>::deserialize(deserializer)?.unwrap_or_else(zero))
}

impl ExecutionOutput {
    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

/// Client configuration for the sandbox service
#[derive(Debug, Clone)]
pub struct SandboxClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl SandboxClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_SANDBOX_URL.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// The sandbox service trait
#[allow(async_fn_in_trait)]
pub trait SandboxService: Send + Sync {
    /// Get the service name
    fn name(&self) -> &str;

    /// Provision a fresh session
    async fn create_session(&self, config: &SessionConfig) -> Result<SandboxSession>;

    /// Run code inside an existing session
    async fn execute(&self, request: &ExecuteRequest<'_>) -> Result<ExecutionOutput>;

    /// Tear a session down. Releasing an already-gone session is not an error.
    async fn release(&self, session: &SandboxSession) -> Result<()>;
}

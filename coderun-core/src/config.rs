//! # Configuration
//!
//! Every literal the orchestration depends on (model, persona, sandbox
//! quota, timeouts) lives here with its default, so nothing is embedded at
//! call sites. Credentials are deliberately absent: they are handed to
//! [`CoderunConfig::provider_config`] and [`CoderunConfig::sandbox_config`]
//! by whoever owns them (the CLI reads them from the environment).
//!
//! A config file is JSON and may be partial; missing fields take defaults.
//!
//! ```json
//! { "model": { "name": "gpt-4o" }, "session": { "resources": { "memory_mb": 1024 } } }
//! ```

use crate::error::{self, Error, Result};
use crate::provider::ProviderConfig;
use crate::sandbox::SandboxClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a Python expert. Write and execute code to solve problems.";
pub const DEFAULT_LANGUAGE: &str = "python";

// ═══════════════════════════════════════════════════════════════════════════════
// Sandbox session & execution
// ═══════════════════════════════════════════════════════════════════════════════

/// Resource quota of one sandbox session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceQuota {
    /// CPU share
    pub cpu_cores: f64,
    pub memory_mb: u32,
    pub storage_gb: u32,
}

impl Default for ResourceQuota {
    fn default() -> Self {
        Self {
            cpu_cores: 1.0,
            memory_mb: 512,
            storage_gb: 5,
        }
    }
}

/// What a freshly provisioned session looks like.
///
/// Serialized as-is into the create-session request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Language runtime of the interpreter
    pub language: String,
    /// Maximum session lifetime, enforced by the sandbox service
    pub timeout_minutes: u32,
    pub resources: ResourceQuota,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            timeout_minutes: 30,
            resources: ResourceQuota::default(),
        }
    }
}

/// Per-execution limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Deadline for one code execution, enforced by the sandbox service
    pub timeout_seconds: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Remote endpoints
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model identifier sent with every completion request
    pub name: String,
    pub system_prompt: String,
    /// Override for the OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// HTTP transport timeout
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            base_url: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub base_url: Option<String>,
    /// HTTP transport timeout
    pub timeout_secs: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 120,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Top level
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoderunConfig {
    pub model: ModelSettings,
    pub sandbox: SandboxSettings,
    pub session: SessionConfig,
    pub execution: ExecutionConfig,
    /// Tear the session down after each run instead of waiting for its lease
    pub release_sessions: bool,
}

impl Default for CoderunConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            sandbox: SandboxSettings::default(),
            session: SessionConfig::default(),
            execution: ExecutionConfig::default(),
            release_sessions: true,
        }
    }
}

impl CoderunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| error::json_failed("config", e).with_operation("config::parse"))
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
        })?;
        Self::from_json_str(&text).map_err(|e| e.with_context("path", path.display().to_string()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model.name = model.into();
        self
    }

    pub fn with_execution_timeout(mut self, seconds: u32) -> Self {
        self.execution.timeout_seconds = seconds;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_release_sessions(mut self, release: bool) -> Self {
        self.release_sessions = release;
        self
    }

    /// Reject values the remote services would refuse anyway
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, msg: &str| -> Result<()> {
            Err(Error::config_invalid(field, msg).with_operation("config::validate"))
        };

        if self.model.name.trim().is_empty() {
            return invalid("model.name", "model must not be empty");
        }
        if self.session.language.trim().is_empty() {
            return invalid("session.language", "language must not be empty");
        }
        if self.session.timeout_minutes == 0 {
            return invalid("session.timeout_minutes", "must be greater than zero");
        }
        let quota = &self.session.resources;
        if !(quota.cpu_cores.is_finite() && quota.cpu_cores > 0.0) {
            return invalid("session.resources.cpu_cores", "must be a positive number");
        }
        if quota.memory_mb == 0 {
            return invalid("session.resources.memory_mb", "must be greater than zero");
        }
        if quota.storage_gb == 0 {
            return invalid("session.resources.storage_gb", "must be greater than zero");
        }
        if self.execution.timeout_seconds == 0 {
            return invalid("execution.timeout_seconds", "must be greater than zero");
        }
        if self.model.timeout_secs == 0 || self.sandbox.timeout_secs == 0 {
            return invalid("timeout_secs", "transport timeouts must be greater than zero");
        }
        Ok(())
    }

    /// Build the LLM client configuration
    pub fn provider_config(&self, api_key: impl Into<String>) -> ProviderConfig {
        let mut config = ProviderConfig::openai(api_key)
            .with_model(&self.model.name)
            .with_timeout(self.model.timeout_secs);
        if let Some(url) = &self.model.base_url {
            config = config.with_base_url(url);
        }
        config
    }

    /// Build the sandbox client configuration
    pub fn sandbox_config(&self, api_key: impl Into<String>) -> SandboxClientConfig {
        let mut config = SandboxClientConfig::new(api_key).with_timeout(self.sandbox.timeout_secs);
        if let Some(url) = &self.sandbox.base_url {
            config = config.with_base_url(url);
        }
        config
    }
}

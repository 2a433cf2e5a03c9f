//! # coderun core
//!
//! Clients for the two remote services coderun sits between.
//!
//! ## Core Concepts
//! - **Provider**: Trait-based LLM communication (OpenAI-compatible chat completions)
//! - **Sandbox**: Trait-based remote code interpreter (sessions, execution, release)
//! - **Config**: Every model, quota and timeout setting with its default

pub mod config;
pub mod error;
pub mod provider;
pub mod sandbox;

pub use config::{
    CoderunConfig, ExecutionConfig, ModelSettings, ResourceQuota, SandboxSettings, SessionConfig,
};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
    OpenAIProvider, ProviderConfig, Role, ToolCall, ToolChoice, ToolDefinition, Usage,
};
pub use sandbox::{
    CodeInterpreterClient, ExecuteRequest, ExecutionOutput, SandboxClientConfig, SandboxService,
    SandboxSession,
};

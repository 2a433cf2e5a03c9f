//! Session provisioning - one sandbox session plus the tool that advertises it

use coderun_core::{
    ErrorKind, Result, SandboxService, SandboxSession, SessionConfig, ToolDefinition,
};
use tracing::info;

/// Name of the single tool offered to the model
pub const EXECUTE_CODE_TOOL: &str = "execute_code";

/// Build the `execute_code` tool descriptor for a language runtime.
///
/// One required string parameter, `code`.
pub fn execute_code_tool(language: &str) -> ToolDefinition {
    let language = display_language(language);
    ToolDefinition::new(
        EXECUTE_CODE_TOOL,
        format!("Execute {} code in a secure sandbox", language),
    )
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {
            "code": {
                "type": "string",
                "description": format!("{} code to execute", language)
            }
        },
        "required": ["code"]
    }))
}

fn display_language(language: &str) -> String {
    let mut chars = language.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Requests a fresh session from the sandbox service
pub struct Provisioner<'a, S> {
    sandbox: &'a S,
    session: &'a SessionConfig,
}

impl<'a, S: SandboxService> Provisioner<'a, S> {
    pub fn new(sandbox: &'a S, session: &'a SessionConfig) -> Self {
        Self { sandbox, session }
    }

    /// Create the session and the matching tool descriptor.
    ///
    /// Exactly one network call. Failures come back as `ProvisionFailed`.
    pub async fn provision(&self) -> Result<(SandboxSession, ToolDefinition)> {
        let quota = &self.session.resources;
        info!(
            service = self.sandbox.name(),
            language = %self.session.language,
            timeout_minutes = self.session.timeout_minutes,
            cpu_cores = quota.cpu_cores,
            memory_mb = quota.memory_mb,
            storage_gb = quota.storage_gb,
            "provisioning sandbox session"
        );

        let session = self
            .sandbox
            .create_session(self.session)
            .await
            .map_err(|e| {
                e.with_kind(ErrorKind::ProvisionFailed)
                    .with_operation("provisioner::provision")
            })?;

        info!(session_id = %session.id, runtime = %session.language, "sandbox session ready");
        // The service may echo a runtime tag ("python3"); the tool follows the config.
        let tool = execute_code_tool(&self.session.language);
        Ok((session, tool))
    }
}

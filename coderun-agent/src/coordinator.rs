//! Coordinator - provisions a session, asks the model for code, runs it

use crate::provisioner::{Provisioner, EXECUTE_CODE_TOOL};
use crate::record::ExecutionRecord;
use coderun_core::config::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
use coderun_core::{
    ChatMessage, CoderunConfig, CompletionRequest, CompletionResponse, ErrorKind, ExecuteRequest,
    ExecutionConfig, LlmProvider, Result, SandboxService, SandboxSession, SessionConfig,
    ToolChoice, ToolDefinition,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Configuration for the coordinator
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier for the completion request
    pub model: String,
    /// Persona given to the model
    pub system_prompt: String,
    pub session: SessionConfig,
    pub execution: ExecutionConfig,
    /// Release the session when the run ends
    pub release_sessions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            session: SessionConfig::default(),
            execution: ExecutionConfig::default(),
            release_sessions: true,
        }
    }
}

impl From<&CoderunConfig> for AgentConfig {
    fn from(config: &CoderunConfig) -> Self {
        Self {
            model: config.model.name.clone(),
            system_prompt: config.model.system_prompt.clone(),
            session: config.session.clone(),
            execution: config.execution.clone(),
            release_sessions: config.release_sessions,
        }
    }
}

/// Arguments of an `execute_code` call
#[derive(Debug, Deserialize)]
struct ExecuteCodeArgs {
    code: String,
}

/// Runs one task end to end: session, completion, optional execution.
///
/// Every call is independent and provisions its own session; nothing is
/// shared between runs.
pub struct Coordinator<P, S> {
    provider: P,
    sandbox: S,
    config: AgentConfig,
}

impl<P: LlmProvider, S: SandboxService> Coordinator<P, S> {
    pub fn new(provider: P, sandbox: S, config: AgentConfig) -> Self {
        Self {
            provider,
            sandbox,
            config,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    /// Run a task.
    ///
    /// Returns `Ok(None)` when the model answers without calling
    /// `execute_code`. Once a session exists it is released on every path
    /// out of here, errors included; a failed release is only logged.
    #[tracing::instrument(name = "coordinator::run", skip_all, fields(query_len = user_query.len()))]
    pub async fn run(&self, user_query: &str) -> Result<Option<ExecutionRecord>> {
        let (session, tool) = Provisioner::new(&self.sandbox, &self.config.session)
            .provision()
            .await?;

        let outcome = self.generate_and_execute(&session, tool, user_query).await;

        if self.config.release_sessions {
            self.release(&session).await;
        } else {
            debug!(session_id = %session.id, "leaving session to expire");
        }

        outcome
    }

    async fn generate_and_execute(
        &self,
        session: &SandboxSession,
        tool: ToolDefinition,
        user_query: &str,
    ) -> Result<Option<ExecutionRecord>> {
        let response = self.complete(tool, user_query).await?;

        let Some(code) = Self::extract_code(&response)? else {
            info!("model answered without requesting code execution");
            return Ok(None);
        };

        let record = self.execute(session, code).await?;
        info!(
            status = %record.status,
            execution_time_ms = %record.execution_time,
            "execution finished"
        );
        Ok(Some(record))
    }

    async fn complete(&self, tool: ToolDefinition, user_query: &str) -> Result<CompletionResponse> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(&self.config.system_prompt),
            ChatMessage::user(user_query),
        ])
        .with_model(&self.config.model)
        .with_tools(vec![tool])
        .with_tool_choice(ToolChoice::Auto);

        info!(provider = self.provider.name(), model = %self.config.model, "querying model");

        self.provider.complete(request).await.map_err(|e| {
            e.with_kind(ErrorKind::InferenceFailed)
                .with_operation("coordinator::complete")
                .with_context("model", self.config.model.clone())
        })
    }

    /// Pull the code out of the first tool call, if it is `execute_code`
    fn extract_code(response: &CompletionResponse) -> Result<Option<String>> {
        let Some(call) = response.first_tool_call() else {
            return Ok(None);
        };

        if response.tool_calls.len() > 1 {
            warn!(
                ignored = response.tool_calls.len() - 1,
                "model returned several tool calls, acting on the first only"
            );
        }

        if call.name != EXECUTE_CODE_TOOL {
            debug!(tool = %call.name, "first tool call is not execute_code");
            return Ok(None);
        }

        let args: ExecuteCodeArgs = call
            .parse_arguments()
            .map_err(|e| e.with_operation("coordinator::extract_code"))?;
        debug!(code_bytes = args.code.len(), "extracted generated code");
        Ok(Some(args.code))
    }

    async fn execute(&self, session: &SandboxSession, code: String) -> Result<ExecutionRecord> {
        let request = ExecuteRequest {
            session_id: &session.id,
            code: &code,
            language: &self.config.session.language,
            timeout_seconds: self.config.execution.timeout_seconds,
        };

        info!(session_id = %session.id, "executing generated code");
        let output = self.sandbox.execute(&request).await.map_err(|e| {
            e.with_kind(ErrorKind::ExecutionFailed)
                .with_operation("coordinator::execute")
        })?;

        Ok(ExecutionRecord::new(code, output))
    }

    async fn release(&self, session: &SandboxSession) {
        match self.sandbox.release(session).await {
            Ok(()) => debug!(session_id = %session.id, "session released"),
            Err(e) => warn!(
                session_id = %session.id,
                error = %e,
                "failed to release session, it will expire after its lease"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderun_core::{Error, ExecutionOutput, FinishReason, ToolCall, Usage};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct FakeProvider {
        log: CallLog,
        response: Mutex<Option<Result<CompletionResponse>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn default_model(&self) -> &str {
            "fake-model"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.log.lock().unwrap().push("complete");
            self.requests.lock().unwrap().push(request);
            self.response
                .lock()
                .unwrap()
                .take()
                .expect("complete called more than once")
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Executed {
        session_id: String,
        code: String,
        language: String,
        timeout_seconds: u32,
    }

    struct FakeSandbox {
        log: CallLog,
        create: Mutex<Option<Result<SandboxSession>>>,
        output: Mutex<Option<Result<ExecutionOutput>>>,
        release_fails: bool,
        executed: Mutex<Vec<Executed>>,
        released: Mutex<Vec<String>>,
    }

    impl SandboxService for FakeSandbox {
        fn name(&self) -> &str {
            "fake"
        }

        async fn create_session(&self, config: &SessionConfig) -> Result<SandboxSession> {
            self.log.lock().unwrap().push("create");
            self.create
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(SandboxSession::from_config("sess_1", config)))
        }

        async fn execute(&self, request: &ExecuteRequest<'_>) -> Result<ExecutionOutput> {
            self.log.lock().unwrap().push("execute");
            self.executed.lock().unwrap().push(Executed {
                session_id: request.session_id.to_string(),
                code: request.code.to_string(),
                language: request.language.to_string(),
                timeout_seconds: request.timeout_seconds,
            });
            self.output
                .lock()
                .unwrap()
                .take()
                .expect("execute called more than once")
        }

        async fn release(&self, session: &SandboxSession) -> Result<()> {
            self.log.lock().unwrap().push("release");
            self.released.lock().unwrap().push(session.id.clone());
            if self.release_fails {
                return Err(Error::release_failed(&session.id, "service unavailable"));
            }
            Ok(())
        }
    }

    struct Harness {
        log: CallLog,
        coordinator: Coordinator<FakeProvider, FakeSandbox>,
    }

    impl Harness {
        fn new(completion: Result<CompletionResponse>) -> Self {
            Self::with_config(completion, AgentConfig::default())
        }

        fn with_config(completion: Result<CompletionResponse>, config: AgentConfig) -> Self {
            let log = CallLog::default();
            let provider = FakeProvider {
                log: log.clone(),
                response: Mutex::new(Some(completion)),
                requests: Mutex::new(Vec::new()),
            };
            let sandbox = FakeSandbox {
                log: log.clone(),
                create: Mutex::new(None),
                output: Mutex::new(Some(Ok(ExecutionOutput {
                    outputs: json!("120"),
                    status: "success".into(),
                    execution_time_ms: 42.into(),
                }))),
                release_fails: false,
                executed: Mutex::new(Vec::new()),
                released: Mutex::new(Vec::new()),
            };
            Self {
                log,
                coordinator: Coordinator::new(provider, sandbox, config),
            }
        }

        fn failing_create(self, err: Error) -> Self {
            *self.coordinator.sandbox().create.lock().unwrap() = Some(Err(err));
            self
        }

        fn with_output(self, output: Result<ExecutionOutput>) -> Self {
            *self.coordinator.sandbox().output.lock().unwrap() = Some(output);
            self
        }

        fn calls(&self) -> Vec<&'static str> {
            self.log.lock().unwrap().clone()
        }

        fn executed(&self) -> Vec<Executed> {
            self.coordinator.sandbox().executed.lock().unwrap().clone()
        }

        fn released(&self) -> Vec<String> {
            self.coordinator.sandbox().released.lock().unwrap().clone()
        }
    }

    fn completion(tool_calls: Vec<ToolCall>) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            id: "chatcmpl-1".into(),
            model: "gpt-4".into(),
            content: None,
            finish_reason: if tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            },
            tool_calls,
            usage: Usage::default(),
        })
    }

    fn execute_code(id: &str, code: &str) -> ToolCall {
        ToolCall::new(id, "execute_code", json!({ "code": code }).to_string())
    }

    const FACTORIAL: &str = "def factorial(n): ...";

    #[tokio::test]
    async fn test_factorial_scenario() {
        let harness = Harness::new(completion(vec![execute_code("call_1", FACTORIAL)]));

        let record = harness
            .coordinator
            .run("Write a Python function to calculate the factorial of a number.")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            record,
            ExecutionRecord {
                code: FACTORIAL.into(),
                result: json!("120"),
                status: "success".into(),
                execution_time: 42.into(),
            }
        );
        assert_eq!(harness.calls(), vec!["create", "complete", "execute", "release"]);
        assert_eq!(
            harness.executed(),
            vec![Executed {
                session_id: "sess_1".into(),
                code: FACTORIAL.into(),
                language: "python".into(),
                timeout_seconds: 30,
            }]
        );
        assert_eq!(harness.released(), vec!["sess_1".to_string()]);
    }

    #[tokio::test]
    async fn test_echoed_runtime_does_not_change_language() {
        let mut session = SandboxSession::from_config("sess_1", &SessionConfig::default());
        session.language = "python3".into();
        let harness = Harness::new(completion(vec![execute_code("call_1", FACTORIAL)]));
        *harness.coordinator.sandbox().create.lock().unwrap() = Some(Ok(session));

        harness.coordinator.run("compute 5!").await.unwrap().unwrap();

        let requests = harness.coordinator.provider().requests.lock().unwrap();
        let tools = requests[0].tools.as_ref().unwrap();
        assert_eq!(tools[0].description, "Execute Python code in a secure sandbox");
        assert_eq!(harness.executed()[0].language, "python");
    }

    #[tokio::test]
    async fn test_completion_request_shape() {
        let harness = Harness::new(completion(vec![]));
        harness.coordinator.run("compute 5!").await.unwrap();

        let requests = harness.coordinator.provider().requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model.as_deref(), Some("gpt-4"));
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.messages[1].content, "compute 5!");

        let tools = request.tools.as_ref().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "execute_code");
        assert_eq!(tools[0].parameters["required"], json!(["code"]));
    }

    #[tokio::test]
    async fn test_no_tool_call_returns_none() {
        let harness = Harness::new(completion(vec![]));

        let result = harness.coordinator.run("say hello").await.unwrap();
        assert!(result.is_none());
        assert!(harness.executed().is_empty());
        assert_eq!(harness.calls(), vec!["create", "complete", "release"]);
    }

    #[tokio::test]
    async fn test_other_tool_name_returns_none() {
        let harness = Harness::new(completion(vec![ToolCall::new(
            "call_1",
            "search_web",
            r#"{"code": "print(1)"}"#,
        )]));

        assert!(harness.coordinator.run("task").await.unwrap().is_none());
        assert!(harness.executed().is_empty());
        assert_eq!(harness.released(), vec!["sess_1".to_string()]);
    }

    #[tokio::test]
    async fn test_only_first_tool_call_is_used() {
        let harness = Harness::new(completion(vec![
            execute_code("call_1", "print('first')"),
            execute_code("call_2", "print('second')"),
            ToolCall::new("call_3", "execute_code", "not json"),
        ]));

        let record = harness.coordinator.run("task").await.unwrap().unwrap();
        assert_eq!(record.code, "print('first')");

        let executed = harness.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].code, "print('first')");
    }

    #[tokio::test]
    async fn test_later_matching_tool_call_is_ignored() {
        let harness = Harness::new(completion(vec![
            ToolCall::new("call_1", "lookup", "{}"),
            execute_code("call_2", "print('second')"),
        ]));

        assert!(harness.coordinator.run("task").await.unwrap().is_none());
        assert!(harness.executed().is_empty());
    }

    #[tokio::test]
    async fn test_code_round_trips_unmodified() {
        let code = "import math\n\nprint(math.factorial(5))  # \"quoted\" \\ tab\t\u{e9}\n";
        let harness = Harness::new(completion(vec![execute_code("call_1", code)]));

        let record = harness.coordinator.run("task").await.unwrap().unwrap();
        assert_eq!(record.code, code);
        assert_eq!(harness.executed()[0].code, code);
    }

    #[tokio::test]
    async fn test_outputs_pass_through() {
        let outputs = json!([
            { "type": "stdout", "data": "120\n" },
            { "type": "image/png", "data": "iVBORw0KGgo=" }
        ]);
        let harness = Harness::new(completion(vec![execute_code("call_1", "print(120)")]))
            .with_output(Ok(ExecutionOutput {
                outputs: outputs.clone(),
                status: "success".into(),
                execution_time_ms: 7.into(),
            }));

        let record = harness.coordinator.run("task").await.unwrap().unwrap();
        assert_eq!(record.status, "success");
        assert_eq!(record.result, outputs);
        assert_eq!(record.execution_time, serde_json::Number::from(7));
    }

    #[tokio::test]
    async fn test_failing_program_is_not_an_error() {
        let harness = Harness::new(completion(vec![execute_code("call_1", "1/0")]))
            .with_output(Ok(ExecutionOutput {
                outputs: json!("ZeroDivisionError: division by zero"),
                status: "error".into(),
                execution_time_ms: 3.into(),
            }));

        let record = harness.coordinator.run("task").await.unwrap().unwrap();
        assert!(!record.succeeded());
        assert_eq!(record.status, "error");
        assert_eq!(record.result, json!("ZeroDivisionError: division by zero"));
    }

    #[tokio::test]
    async fn test_provision_failure_skips_model() {
        let harness = Harness::new(completion(vec![execute_code("call_1", "1")]))
            .failing_create(Error::provision_failed("quota exceeded"));

        let err = harness.coordinator.run("task").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProvisionFailed);
        assert_eq!(harness.calls(), vec!["create"]);
        assert!(harness.coordinator.provider().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_skips_execution() {
        let harness = Harness::new(Err(Error::new(ErrorKind::RateLimited, "slow down")));

        let err = harness.coordinator.run("task").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
        assert_eq!(err.operation(), "coordinator::complete");
        assert_eq!(err.context_value("cause_kind"), Some("RateLimited"));
        assert!(err.is_retryable());
        assert!(harness.executed().is_empty());
        assert_eq!(harness.calls(), vec!["create", "complete", "release"]);
    }

    #[tokio::test]
    async fn test_malformed_arguments_fail() {
        let harness = Harness::new(completion(vec![ToolCall::new(
            "call_1",
            "execute_code",
            r#"{"code": "print(1)""#,
        )]));

        let err = harness.coordinator.run("task").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert_eq!(err.operation(), "coordinator::extract_code");
        assert!(harness.executed().is_empty());
        assert_eq!(harness.released(), vec!["sess_1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_code_field_fails() {
        let harness = Harness::new(completion(vec![ToolCall::new(
            "call_1",
            "execute_code",
            r#"{"source": "print(1)"}"#,
        )]));

        let err = harness.coordinator.run("task").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert!(harness.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_releases_session() {
        let harness = Harness::new(completion(vec![execute_code("call_1", "1")]))
            .with_output(Err(Error::network_failed("connection reset")));

        let err = harness.coordinator.run("task").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert_eq!(harness.calls(), vec!["create", "complete", "execute", "release"]);
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_result() {
        let mut harness = Harness::new(completion(vec![execute_code("call_1", FACTORIAL)]));
        harness.coordinator.sandbox.release_fails = true;

        let record = harness.coordinator.run("task").await.unwrap().unwrap();
        assert_eq!(record.code, FACTORIAL);
        assert_eq!(harness.released(), vec!["sess_1".to_string()]);
    }

    #[tokio::test]
    async fn test_release_can_be_disabled() {
        let config = AgentConfig {
            release_sessions: false,
            ..AgentConfig::default()
        };
        let harness = Harness::with_config(completion(vec![]), config);

        harness.coordinator.run("task").await.unwrap();
        assert_eq!(harness.calls(), vec!["create", "complete"]);
    }

    #[tokio::test]
    async fn test_config_drives_requests() {
        let mut config = CoderunConfig::default()
            .with_model("gpt-4o")
            .with_execution_timeout(5);
        config.session.resources.memory_mb = 2048;
        let agent_config = AgentConfig::from(&config);
        assert_eq!(agent_config.session.resources.memory_mb, 2048);

        let harness = Harness::with_config(
            completion(vec![execute_code("call_1", "print(1)")]),
            agent_config,
        );
        harness.coordinator.run("task").await.unwrap();

        assert_eq!(harness.executed()[0].timeout_seconds, 5);
        let requests = harness.coordinator.provider().requests.lock().unwrap();
        assert_eq!(requests[0].model.as_deref(), Some("gpt-4o"));
    }
}

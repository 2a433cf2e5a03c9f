//! HTTP client for the code interpreter service
//!
//! Endpoints (all JSON, bearer auth, responses wrapped in `{"data": ...}`):
//! - `POST   /api/v1/interpreter/sessions`       create a session
//! - `POST   /api/v1/interpreter/execute`        run code in a session
//! - `DELETE /api/v1/interpreter/sessions/{id}`  release a session

use super::*;
use crate::error::{self, Error, ErrorKind};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

pub struct CodeInterpreterClient {
    client: Client,
    config: SandboxClientConfig,
}

impl CodeInterpreterClient {
    pub fn new(config: SandboxClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::config_invalid("http_client", e.to_string())
                    .with_operation("sandbox::new")
                    .set_source(e)
            })?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/interpreter{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check status and unwrap the `data` envelope
    async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error::status_failed(status.as_u16(), text));
        }
        let envelope: Envelope<T> = response.json().await.map_err(error::request_failed)?;
        Ok(envelope.data)
    }
}

impl SandboxService for CodeInterpreterClient {
    fn name(&self) -> &str {
        "code-interpreter"
    }

    async fn create_session(&self, config: &SessionConfig) -> Result<SandboxSession> {
        let op = "sandbox::create_session";
        let fail = |e: Error| {
            e.with_kind(ErrorKind::ProvisionFailed)
                .with_operation(op)
                .with_context("language", config.language.clone())
        };

        let response = self
            .client
            .post(self.url("/sessions"))
            .bearer_auth(&self.config.api_key)
            .json(config)
            .send()
            .await
            .map_err(|e| fail(error::request_failed(e)))?;

        let created: CreatedSession = Self::read_data(response).await.map_err(fail)?;
        debug!(session_id = %created.session_id, status = ?created.status, "session created");

        let mut session = SandboxSession::from_config(created.session_id, config);
        if let Some(language) = created.language {
            session.language = language;
        }
        session.expires_at = created.expires_at;
        Ok(session)
    }

    async fn execute(&self, request: &ExecuteRequest<'_>) -> Result<ExecutionOutput> {
        let op = "sandbox::execute";
        let fail = |e: Error| {
            e.with_kind(ErrorKind::ExecutionFailed)
                .with_operation(op)
                .with_context("session_id", request.session_id)
        };

        debug!(
            session_id = request.session_id,
            code_bytes = request.code.len(),
            timeout_seconds = request.timeout_seconds,
            "submitting code"
        );

        let response = self
            .client
            .post(self.url("/execute"))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| fail(error::request_failed(e)))?;

        Self::read_data(response).await.map_err(fail)
    }

    async fn release(&self, session: &SandboxSession) -> Result<()> {
        let fail = |e: Error| {
            e.with_kind(ErrorKind::ReleaseFailed)
                .with_operation("sandbox::release")
                .with_context("session_id", session.id.clone())
        };

        let response = self
            .client
            .delete(self.url(&format!("/sessions/{}", session.id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| fail(error::request_failed(e)))?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            debug!(session_id = %session.id, http_status = status.as_u16(), "session released");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(fail(error::status_failed(status.as_u16(), text)))
    }
}

// ============================================================================
// Service API Types
// ============================================================================

#[derive(Debug, serde::Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, serde::Deserialize)]
struct CreatedSession {
    session_id: String,
    language: Option<String>,
    status: Option<String>,
    expires_at: Option<String>,
}

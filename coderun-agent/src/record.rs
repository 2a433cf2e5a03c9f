//! The normalized result handed back to the caller

use coderun_core::ExecutionOutput;
use serde::{Deserialize, Serialize};

/// Generated code together with what the sandbox made of it.
///
/// Serializes as `{"code", "result", "status", "execution_time"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// The code exactly as the model wrote it
    pub code: String,
    /// The service's `outputs`, untouched
    pub result: serde_json::Value,
    pub status: String,
    /// Milliseconds, as measured by the service
    pub execution_time: serde_json::Number,
}

impl ExecutionRecord {
    pub fn new(code: String, output: ExecutionOutput) -> Self {
        Self {
            code,
            result: output.outputs,
            status: output.status,
            execution_time: output.execution_time_ms,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

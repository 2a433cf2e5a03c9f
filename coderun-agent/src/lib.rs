//! # coderun agent
//!
//! Turns a natural-language task into executed code:
//! 1. Provision a resource-bounded sandbox session
//! 2. Offer the model a single `execute_code` tool
//! 3. If the model calls it, run the code in the session
//! 4. Normalize the outcome into an `ExecutionRecord`
//! 5. Release the session
//!
//! Strictly sequential, no retries. The model deciding not to run code is
//! a normal outcome (`Ok(None)`), not an error.

mod coordinator;
mod provisioner;
mod record;

pub use coordinator::{AgentConfig, Coordinator};
pub use provisioner::{execute_code_tool, Provisioner, EXECUTE_CODE_TOOL};
pub use record::ExecutionRecord;

//! # coderun-error
//!
//! Unified error handling for coderun.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what failed (e.g., ProvisionFailed, InferenceFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use coderun_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ProvisionFailed, "quota exceeded")
//!         .with_operation("provisioner::provision")
//!         .with_context("language", "python")
//!         .with_context("memory_mb", "512"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, coderun_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using coderun Error
pub type Result<T> = std::result::Result<T, Error>;

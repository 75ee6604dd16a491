//! # code-agent-shared
//!
//! Shared result types, error handling, and request context for the
//! code-agent workspace.
//!
//! - [`ErrorEnvelope`] and the [`ErrorCategory`] taxonomy
//! - [`RequestContext`] (correlation + cooperative cancellation)
//! - Secret redaction helpers
//!
//! This crate has no workspace dependencies.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod context;
pub mod errors;
pub mod redaction;
pub mod result;

pub use context::{CancellationToken, CorrelationId, RequestContext};
pub use errors::{
    ErrorCategory, ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, REDACTED_VALUE,
    redact_metadata,
};
pub use redaction::{REDACTED, SecretString, is_secret_key, redact_if_secret};
pub use result::{Result, ResultExt};

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

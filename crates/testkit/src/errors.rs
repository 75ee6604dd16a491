//! Test fixtures for shared error codes and envelopes.

use code_agent_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Return a list of common error codes used in tests.
pub fn common_error_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode::cancelled(),
        ErrorCode::invalid_input(),
        ErrorCode::not_found(),
        ErrorCode::already_exists(),
        ErrorCode::provisioning(),
        ErrorCode::compensation(),
        ErrorCode::persistence(),
        ErrorCode::schema(),
        ErrorCode::internal(),
    ]
}

/// A cancellation error fixture.
pub fn cancelled_error() -> ErrorEnvelope {
    ErrorEnvelope::cancelled("cancelled")
}

/// A retriable collaborator outage, e.g. `unavailable("store unavailable")`.
pub fn unavailable(message: &str) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(ErrorCode::new("fake", "unavailable"), message, ErrorClass::Retriable)
}

/// A record-store write failure fixture.
pub fn persistence_failure(message: &str) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(ErrorCode::persistence(), message, ErrorClass::Retriable)
        .with_metadata("operation", "create")
        .with_metadata("table", "agents")
}

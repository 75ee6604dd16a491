//! Agent lifecycle states.

use code_agent_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an agent.
///
/// `Deleted` is terminal and never persisted: deleting an agent removes its
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Accepted, nothing provisioned yet.
    Pending,
    /// Provisioning in progress.
    Initializing,
    /// Fully provisioned.
    Ready,
    /// Provisioning failed.
    Failed,
    /// Torn down.
    Deleted,
}

impl AgentStatus {
    /// Stable lowercase label, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a persisted label.
    pub fn parse(input: &str) -> Result<Self, StatusTransitionError> {
        match input.trim() {
            "pending" => Ok(Self::Pending),
            "initializing" => Ok(Self::Initializing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            "deleted" => Ok(Self::Deleted),
            other => Err(StatusTransitionError::Unknown {
                input: other.to_owned(),
            }),
        }
    }

    /// Whether `self -> next` is an allowed lifecycle edge.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Ready | Self::Failed, Self::Initializing)
                | (Self::Initializing, Self::Ready | Self::Failed)
                | (_, Self::Deleted)
        )
    }

    /// Move to `next`, rejecting edges outside the lifecycle.
    pub fn transition(self, next: Self) -> Result<Self, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError::Disallowed {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Invalid status label or lifecycle edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransitionError {
    /// Label is not part of the status vocabulary.
    Unknown {
        /// Offending label.
        input: String,
    },
    /// Edge is not part of the lifecycle.
    Disallowed {
        /// Current status.
        from: AgentStatus,
        /// Requested status.
        to: AgentStatus,
    },
}

impl fmt::Display for StatusTransitionError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { input } => write!(formatter, "unknown agent status `{input}`"),
            Self::Disallowed { from, to } => {
                write!(formatter, "agent status cannot move from {from} to {to}")
            },
        }
    }
}

impl std::error::Error for StatusTransitionError {}

impl From<StatusTransitionError> for ErrorEnvelope {
    fn from(error: StatusTransitionError) -> Self {
        match &error {
            StatusTransitionError::Unknown { input } => Self::expected(
                ErrorCode::new("domain", "invalid_status"),
                error.to_string(),
            )
            .with_metadata("input", input.clone()),
            StatusTransitionError::Disallowed { from, to } => Self::invariant(
                ErrorCode::new("domain", "invalid_status_transition"),
                error.to_string(),
            )
            .with_metadata("from", from.as_str())
            .with_metadata("to", to.as_str()),
        }
    }
}

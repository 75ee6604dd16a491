//! Request validation helpers for CLI surfaces.

use crate::InfraResult;
use code_agent_config::{
    parse_agent_id_request_json, parse_create_agent_request_json, parse_list_agents_request_json,
    parse_update_agent_request_json,
};
use code_agent_domain::{AgentId, CreateAgentCommand, ListAgentsCommand, UpdateAgentCommand};
use std::fmt;

/// Supported request kinds for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Create-agent request.
    CreateAgent,
    /// Update-agent request.
    UpdateAgent,
    /// List-agents request.
    ListAgents,
    /// Get/delete request addressing one agent.
    AgentId,
}

/// Validated request payloads by kind.
#[derive(Debug)]
pub enum ValidatedRequest {
    /// Validated create command.
    CreateAgent(CreateAgentCommand),
    /// Validated update command.
    UpdateAgent(UpdateAgentCommand),
    /// Validated list command.
    ListAgents(ListAgentsCommand),
    /// Validated agent id.
    AgentId(AgentId),
}

impl RequestKind {
    /// Canonical string representation (for CLI/UI).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateAgent => "createAgent",
            Self::UpdateAgent => "updateAgent",
            Self::ListAgents => "listAgents",
            Self::AgentId => "agentId",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validate a request payload provided as JSON for the given kind.
pub fn validate_request_json(kind: RequestKind, input_json: &str) -> InfraResult<ValidatedRequest> {
    match kind {
        RequestKind::CreateAgent => {
            parse_create_agent_request_json(input_json).map(ValidatedRequest::CreateAgent)
        },
        RequestKind::UpdateAgent => {
            parse_update_agent_request_json(input_json).map(ValidatedRequest::UpdateAgent)
        },
        RequestKind::ListAgents => {
            parse_list_agents_request_json(input_json).map(ValidatedRequest::ListAgents)
        },
        RequestKind::AgentId => {
            parse_agent_id_request_json(input_json).map(ValidatedRequest::AgentId)
        },
    }
}

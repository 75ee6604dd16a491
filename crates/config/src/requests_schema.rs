//! JSON Schema exports for request DTOs.

use crate::requests::{
    AgentIdRequestDto, CreateAgentRequestDto, ListAgentsRequestDto, UpdateAgentRequestDto,
};
use schemars::{Schema, schema_for};

/// JSON Schema for `CreateAgentRequestDto`.
#[must_use]
pub fn create_agent_request_schema() -> Schema {
    schema_for!(CreateAgentRequestDto)
}

/// JSON Schema for `UpdateAgentRequestDto`.
#[must_use]
pub fn update_agent_request_schema() -> Schema {
    schema_for!(UpdateAgentRequestDto)
}

/// JSON Schema for `ListAgentsRequestDto`.
#[must_use]
pub fn list_agents_request_schema() -> Schema {
    schema_for!(ListAgentsRequestDto)
}

/// JSON Schema for `AgentIdRequestDto`.
#[must_use]
pub fn agent_id_request_schema() -> Schema {
    schema_for!(AgentIdRequestDto)
}

/// Every request schema keyed by request kind, in a stable order.
#[must_use]
pub fn request_schemas() -> Vec<(&'static str, Schema)> {
    vec![
        ("createAgent", create_agent_request_schema()),
        ("updateAgent", update_agent_request_schema()),
        ("listAgents", list_agents_request_schema()),
        ("agentId", agent_id_request_schema()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_schema_requires_repository_url() -> Result<(), serde_json::Error> {
        let schema = serde_json::to_value(create_agent_request_schema())?;
        let required = schema["required"].as_array().cloned().unwrap_or_default();
        assert!(required.iter().any(|field| field == "repository_url"));
        assert_eq!(schema["additionalProperties"], false);
        Ok(())
    }
}

//! # code-agent-config
//!
//! Configuration schema, validation, and request DTOs for the agent service.
//! This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Request DTOs and validation.
pub mod requests;
/// JSON Schema exports for request DTOs.
pub mod requests_schema;
/// Configuration schema types and helpers.
pub mod schema;

pub use env::{AgentServiceEnv, EnvParseError, apply_env_overrides};
pub use load::{
    load_agent_service_config_from_path, load_agent_service_config_from_sources,
    load_agent_service_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use requests::{
    AgentIdRequestDto, CreateAgentRequestDto, ListAgentsRequestDto, RequestValidationError,
    UpdateAgentRequestDto, parse_agent_id_request_json, parse_create_agent_request_json,
    parse_list_agents_request_json, parse_update_agent_request_json, validate_agent_id_request,
    validate_create_agent_request, validate_list_agents_request, validate_update_agent_request,
};
pub use requests_schema::{
    agent_id_request_schema, create_agent_request_schema, list_agents_request_schema,
    request_schemas, update_agent_request_schema,
};
pub use schema::{
    AgentServiceConfig, CURRENT_CONFIG_VERSION, ConfigSchemaError, DEFAULT_STORE_TABLE,
    ObservabilityConfig, ProvidersConfig, ProvisioningConfig, StoreBackend, StoreConfig,
    ValidatedAgentServiceConfig, VectorStoreBackend, VectorStoreConfig, is_valid_table_name,
    parse_agent_service_config_json, parse_agent_service_config_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_domain::domain_crate_version;
    use code_agent_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn config_can_use_domain_and_shared() {
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}

//! Config loading helpers for CLI surfaces.

use crate::InfraResult;
use code_agent_config::{
    AgentServiceEnv, ValidatedAgentServiceConfig, load_agent_service_config_from_path,
    to_pretty_json,
};
use code_agent_shared::ErrorEnvelope;
use std::collections::BTreeMap;
use std::path::Path;

/// Load and validate the effective config from an explicit env map.
pub fn load_effective_config(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<ValidatedAgentServiceConfig> {
    let env = AgentServiceEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    load_agent_service_config_from_path(config_path, overrides_json, &env)
}

/// Load and validate the effective config, returning redacted pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    let config = load_effective_config(env, config_path, overrides_json)?;
    to_pretty_json(&config.redacted())
}

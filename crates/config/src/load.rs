//! Config loading helpers (env + file + overrides).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::env::{AgentServiceEnv, apply_env_overrides};
use crate::schema::{
    AgentServiceConfig, StoreBackend, ValidatedAgentServiceConfig, VectorStoreBackend,
};
use code_agent_domain::{
    AiProvider, BedrockProviderConfig, LocalProviderConfig, OpenAiProviderConfig,
};
use code_agent_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the service config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`AgentServiceEnv`)
/// - overrides JSON (partial config)
/// - config JSON (file content)
/// - defaults (`AgentServiceConfig::default()`)
pub fn load_agent_service_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &AgentServiceEnv,
) -> Result<ValidatedAgentServiceConfig, ErrorEnvelope> {
    let config = match config_json {
        None => AgentServiceConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the service config from an optional file path (`.json` or `.toml`).
pub fn load_agent_service_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &AgentServiceEnv,
) -> Result<ValidatedAgentServiceConfig, ErrorEnvelope> {
    let config = match config_path {
        None => AgentServiceConfig::default(),
        Some(path) => {
            let config_text = read_config_file(path)?;
            let format = detect_config_format(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the service config from std env and an optional file path.
pub fn load_agent_service_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedAgentServiceConfig, ErrorEnvelope> {
    let env = AgentServiceEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_agent_service_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &AgentServiceConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &AgentServiceConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn merge_and_validate(
    mut config: AgentServiceConfig,
    overrides_json: Option<&str>,
    env: &AgentServiceEnv,
) -> Result<ValidatedAgentServiceConfig, ErrorEnvelope> {
    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, overrides);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<AgentServiceConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<AgentServiceConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct AgentServiceConfigOverrides {
    version: Option<u32>,
    store: StoreOverrides,
    provisioning: ProvisioningOverrides,
    providers: ProvidersOverrides,
    observability: ObservabilityOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StoreOverrides {
    backend: Option<StoreBackend>,
    path: Option<Box<str>>,
    connection: Option<Box<str>>,
    table: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ProvisioningOverrides {
    workspace_root: Option<Box<str>>,
    object_store_root: Option<Box<str>>,
    default_branch: Option<Box<str>>,
    vector_store: VectorStoreOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct VectorStoreOverrides {
    backend: Option<VectorStoreBackend>,
    path: Option<Box<str>>,
    connection: Option<Box<str>>,
    dimension: Option<u32>,
}

// Profiles replace the whole payload; merging provider fields would let an
// override silently inherit a model from another deployment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ProvidersOverrides {
    default: Option<AiProvider>,
    local: Option<LocalProviderConfig>,
    bedrock: Option<BedrockProviderConfig>,
    openai: Option<OpenAiProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ObservabilityOverrides {
    log_level: Option<Box<str>>,
}

fn apply_overrides(config: &mut AgentServiceConfig, overrides: AgentServiceConfigOverrides) {
    let AgentServiceConfigOverrides {
        version,
        store,
        provisioning,
        providers,
        observability,
    } = overrides;

    set(&mut config.version, version);

    set(&mut config.store.backend, store.backend);
    set_opt(&mut config.store.path, store.path);
    set_opt(&mut config.store.connection, store.connection);
    set(&mut config.store.table, store.table);

    let target = &mut config.provisioning;
    set(&mut target.workspace_root, provisioning.workspace_root);
    set(&mut target.object_store_root, provisioning.object_store_root);
    set(&mut target.default_branch, provisioning.default_branch);
    let vector_store = provisioning.vector_store;
    set(&mut target.vector_store.backend, vector_store.backend);
    set_opt(&mut target.vector_store.path, vector_store.path);
    set_opt(&mut target.vector_store.connection, vector_store.connection);
    set(&mut target.vector_store.dimension, vector_store.dimension);

    set(&mut config.providers.default, providers.default);
    set_opt(&mut config.providers.local, providers.local);
    set_opt(&mut config.providers.bedrock, providers.bedrock);
    set_opt(&mut config.providers.openai, providers.openai);

    set(&mut config.observability.log_level, observability.log_level);
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_opt<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_precedence_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
        let config_json = r#"{
          "version": 1,
          "store": { "table": "from_file" }
        }"#;

        let overrides_json = r#"{
          "store": { "table": "from_overrides" }
        }"#;

        let env = AgentServiceEnv {
            store_table: Some("from_env".into()),
            ..AgentServiceEnv::default()
        };

        let config = load_agent_service_config_from_sources(
            Some(config_json),
            Some(overrides_json),
            &env,
        )?;
        assert_eq!(config.store.table.as_ref(), "from_env");

        let config = load_agent_service_config_from_sources(
            Some(config_json),
            Some(overrides_json),
            &AgentServiceEnv::default(),
        )?;
        assert_eq!(config.store.table.as_ref(), "from_overrides");
        Ok(())
    }

    #[test]
    fn serialization_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
        let env = AgentServiceEnv::default();
        let config = load_agent_service_config_from_sources(None, None, &env)?;
        let first = to_pretty_json(&config)?;
        let second = to_pretty_json(&config)?;
        assert_eq!(first, second);

        let toml = to_pretty_toml(&config)?;
        assert!(toml.contains("[store]"));
        Ok(())
    }

    #[test]
    fn invalid_file_value_overridden_by_valid_env_succeeds()
    -> Result<(), Box<dyn std::error::Error>> {
        let config_json = r#"{ "store": { "table": "bad-name" } }"#;
        let env = AgentServiceEnv {
            store_table: Some("agents_v2".into()),
            ..AgentServiceEnv::default()
        };

        let config = load_agent_service_config_from_sources(Some(config_json), None, &env)?;
        assert_eq!(config.store.table.as_ref(), "agents_v2");
        Ok(())
    }

    #[test]
    fn malformed_overrides_report_their_source() -> Result<(), Box<dyn std::error::Error>> {
        let overrides_json = r#"{ "store": { "table": }"#;
        let error = load_agent_service_config_from_sources(
            None,
            Some(overrides_json),
            &AgentServiceEnv::default(),
        )
        .err()
        .ok_or_else(|| std::io::Error::other("expected overrides error"))?;

        assert_eq!(error.code, ErrorCode::new("config", "invalid_json"));
        assert_eq!(
            error.metadata.get("source").map(String::as_str),
            Some("overrides")
        );
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let config_json = r#"{ "store": { "tabel": "agents" } }"#;
        let error =
            load_agent_service_config_from_sources(Some(config_json), None, &AgentServiceEnv::default())
                .err();
        assert_eq!(
            error.map(|e| e.code),
            Some(ErrorCode::new("config", "invalid_json"))
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let error = load_agent_service_config_from_path(
            Some(Path::new("agents.yaml")),
            None,
            &AgentServiceEnv::default(),
        )
        .err();
        assert!(error.is_some());
    }
}

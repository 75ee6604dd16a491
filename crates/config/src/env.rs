//! Environment variable parsing and env-to-config merging.
//!
//! This module keeps env parsing:
//! - strict (invalid values fail fast)
//! - safe (secret values are redacted in error metadata)

use crate::schema::{
    AgentServiceConfig, DEFAULT_OPENAI_MODEL, StoreBackend, ValidatedAgentServiceConfig,
    VectorStoreBackend, default_local_profile,
};
use code_agent_domain::{AiProvider, OpenAiProviderConfig};
use code_agent_shared::{ErrorCode, ErrorEnvelope, REDACTED_VALUE, SecretString, is_secret_key};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Env var: record store backend.
pub const ENV_STORE_BACKEND: &str = "CODE_AGENT_STORE_BACKEND";
/// Env var: record store file or directory.
pub const ENV_STORE_PATH: &str = "CODE_AGENT_STORE_PATH";
/// Env var: record store connection URL (secret).
pub const ENV_STORE_CONNECTION: &str = "CODE_AGENT_STORE_CONNECTION";
/// Env var: record table name.
pub const ENV_STORE_TABLE: &str = "CODE_AGENT_STORE_TABLE";
/// Env var: checkout directory.
pub const ENV_WORKSPACE_ROOT: &str = "CODE_AGENT_WORKSPACE_ROOT";
/// Env var: snapshot directory.
pub const ENV_OBJECT_STORE_ROOT: &str = "CODE_AGENT_OBJECT_STORE_ROOT";
/// Env var: vector store backend.
pub const ENV_VECTOR_STORE_BACKEND: &str = "CODE_AGENT_VECTOR_STORE_BACKEND";
/// Env var: vector store SQLite path.
pub const ENV_VECTOR_STORE_PATH: &str = "CODE_AGENT_VECTOR_STORE_PATH";
/// Env var: vector store connection URL (secret).
pub const ENV_VECTOR_STORE_CONNECTION: &str = "CODE_AGENT_VECTOR_STORE_CONNECTION";
/// Env var: vector embedding dimension.
pub const ENV_VECTOR_DIMENSION: &str = "CODE_AGENT_VECTOR_DIMENSION";
/// Env var: default branch.
pub const ENV_DEFAULT_BRANCH: &str = "CODE_AGENT_DEFAULT_BRANCH";
/// Env var: default provider.
pub const ENV_DEFAULT_PROVIDER: &str = "CODE_AGENT_DEFAULT_PROVIDER";
/// Env var: local profile model server URL.
pub const ENV_LOCAL_OLLAMA_URL: &str = "CODE_AGENT_LOCAL_OLLAMA_URL";
/// Env var: local profile chat model.
pub const ENV_LOCAL_MODEL: &str = "CODE_AGENT_LOCAL_MODEL";
/// Env var: OpenAI profile chat model.
pub const ENV_OPENAI_MODEL: &str = "CODE_AGENT_OPENAI_MODEL";
/// Env var: OpenAI profile base URL.
pub const ENV_OPENAI_BASE_URL: &str = "CODE_AGENT_OPENAI_BASE_URL";
/// Env var: OpenAI API key (secret, runtime only).
pub const ENV_OPENAI_API_AUTH: &str = "CODE_AGENT_OPENAI_API_KEY";
/// Env var: log level.
pub const ENV_LOG_LEVEL: &str = "CODE_AGENT_LOG_LEVEL";

/// Every variable read by [`AgentServiceEnv::from_std_env`].
pub const ENV_VARS: [&str; 18] = [
    ENV_STORE_BACKEND,
    ENV_STORE_PATH,
    ENV_STORE_CONNECTION,
    ENV_STORE_TABLE,
    ENV_WORKSPACE_ROOT,
    ENV_OBJECT_STORE_ROOT,
    ENV_VECTOR_STORE_BACKEND,
    ENV_VECTOR_STORE_PATH,
    ENV_VECTOR_STORE_CONNECTION,
    ENV_VECTOR_DIMENSION,
    ENV_DEFAULT_BRANCH,
    ENV_DEFAULT_PROVIDER,
    ENV_LOCAL_OLLAMA_URL,
    ENV_LOCAL_MODEL,
    ENV_OPENAI_MODEL,
    ENV_OPENAI_BASE_URL,
    ENV_OPENAI_API_AUTH,
    ENV_LOG_LEVEL,
];

// Connection strings embed credentials without a secret-looking name.
const CONNECTION_VARS: [&str; 2] = [ENV_STORE_CONNECTION, ENV_VECTOR_STORE_CONNECTION];

/// Typed env-derived overrides for `AgentServiceConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentServiceEnv {
    /// Override for `store.backend`.
    pub store_backend: Option<StoreBackend>,
    /// Override for `store.path`.
    pub store_path: Option<Box<str>>,
    /// Override for `store.connection`.
    pub store_connection: Option<SecretString>,
    /// Override for `store.table`.
    pub store_table: Option<Box<str>>,
    /// Override for `provisioning.workspaceRoot`.
    pub workspace_root: Option<Box<str>>,
    /// Override for `provisioning.objectStoreRoot`.
    pub object_store_root: Option<Box<str>>,
    /// Override for `provisioning.vectorStore.backend`.
    pub vector_store_backend: Option<VectorStoreBackend>,
    /// Override for `provisioning.vectorStore.path`.
    pub vector_store_path: Option<Box<str>>,
    /// Override for `provisioning.vectorStore.connection`.
    pub vector_store_connection: Option<SecretString>,
    /// Override for `provisioning.vectorStore.dimension`.
    pub vector_dimension: Option<u32>,
    /// Override for `provisioning.defaultBranch`.
    pub default_branch: Option<Box<str>>,
    /// Override for `providers.default`.
    pub default_provider: Option<AiProvider>,
    /// Override for `providers.local.ollama_url`.
    pub local_ollama_url: Option<Box<str>>,
    /// Override for `providers.local.model`.
    pub local_model: Option<Box<str>>,
    /// Override for `providers.openai.model`.
    pub openai_model: Option<Box<str>>,
    /// Override for `providers.openai.base_url`.
    pub openai_base_url: Option<Box<str>>,
    /// OpenAI API key; never written into the config.
    pub openai_api_key: Option<SecretString>,
    /// Override for `observability.logLevel`.
    pub log_level: Option<Box<str>>,
}

impl AgentServiceEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            store_backend: parse_optional_enum(map, ENV_STORE_BACKEND, StoreBackend::parse)?,
            store_path: parse_optional_trimmed_string(map, ENV_STORE_PATH)?,
            store_connection: parse_optional_secret(map, ENV_STORE_CONNECTION)?,
            store_table: parse_optional_trimmed_string(map, ENV_STORE_TABLE)?,
            workspace_root: parse_optional_trimmed_string(map, ENV_WORKSPACE_ROOT)?,
            object_store_root: parse_optional_trimmed_string(map, ENV_OBJECT_STORE_ROOT)?,
            vector_store_backend: parse_optional_enum(
                map,
                ENV_VECTOR_STORE_BACKEND,
                VectorStoreBackend::parse,
            )?,
            vector_store_path: parse_optional_trimmed_string(map, ENV_VECTOR_STORE_PATH)?,
            vector_store_connection: parse_optional_secret(map, ENV_VECTOR_STORE_CONNECTION)?,
            vector_dimension: parse_optional_u32(map, ENV_VECTOR_DIMENSION)?,
            default_branch: parse_optional_trimmed_string(map, ENV_DEFAULT_BRANCH)?,
            default_provider: parse_optional_enum(map, ENV_DEFAULT_PROVIDER, |raw| {
                AiProvider::parse(raw).ok()
            })?,
            local_ollama_url: parse_optional_url_string(map, ENV_LOCAL_OLLAMA_URL)?,
            local_model: parse_optional_trimmed_string(map, ENV_LOCAL_MODEL)?,
            openai_model: parse_optional_trimmed_string(map, ENV_OPENAI_MODEL)?,
            openai_base_url: parse_optional_url_string(map, ENV_OPENAI_BASE_URL)?,
            openai_api_key: parse_optional_secret(map, ENV_OPENAI_API_AUTH)?,
            log_level: parse_optional_trimmed_string(map, ENV_LOG_LEVEL)?,
        })
    }

    /// Parse env overrides from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ENV_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_string(), value);
            }
        }
        Self::from_map(&map)
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: AgentServiceConfig,
    env: &AgentServiceEnv,
) -> Result<ValidatedAgentServiceConfig, ErrorEnvelope> {
    let mut config = base;
    apply_store_env_overrides(&mut config, env);
    apply_provisioning_env_overrides(&mut config, env);
    apply_provider_env_overrides(&mut config, env);
    EnvConfigMapper::set_clone(&mut config.observability.log_level, env.log_level.as_ref());

    config.validate_and_normalize().map_err(Into::into)
}

fn apply_store_env_overrides(config: &mut AgentServiceConfig, env: &AgentServiceEnv) {
    let store = &mut config.store;
    EnvConfigMapper::set_copy(&mut store.backend, env.store_backend);
    EnvConfigMapper::set_opt_box_str(&mut store.path, env.store_path.as_deref());
    EnvConfigMapper::set_opt_box_str(
        &mut store.connection,
        env.store_connection.as_ref().map(SecretString::expose),
    );
    EnvConfigMapper::set_clone(&mut store.table, env.store_table.as_ref());
}

fn apply_provisioning_env_overrides(config: &mut AgentServiceConfig, env: &AgentServiceEnv) {
    let provisioning = &mut config.provisioning;
    EnvConfigMapper::set_clone(&mut provisioning.workspace_root, env.workspace_root.as_ref());
    EnvConfigMapper::set_clone(
        &mut provisioning.object_store_root,
        env.object_store_root.as_ref(),
    );
    EnvConfigMapper::set_clone(&mut provisioning.default_branch, env.default_branch.as_ref());

    let vector_store = &mut provisioning.vector_store;
    EnvConfigMapper::set_copy(&mut vector_store.backend, env.vector_store_backend);
    EnvConfigMapper::set_opt_box_str(&mut vector_store.path, env.vector_store_path.as_deref());
    EnvConfigMapper::set_opt_box_str(
        &mut vector_store.connection,
        env.vector_store_connection.as_ref().map(SecretString::expose),
    );
    EnvConfigMapper::set_copy(&mut vector_store.dimension, env.vector_dimension);
}

fn apply_provider_env_overrides(config: &mut AgentServiceConfig, env: &AgentServiceEnv) {
    let providers = &mut config.providers;
    EnvConfigMapper::set_copy(&mut providers.default, env.default_provider);

    if env.local_ollama_url.is_some() || env.local_model.is_some() {
        let local = providers.local.get_or_insert_with(default_local_profile);
        EnvConfigMapper::set_string(&mut local.ollama_url, env.local_ollama_url.as_deref());
        EnvConfigMapper::set_string(&mut local.model, env.local_model.as_deref());
    }

    if env.openai_model.is_some() || env.openai_base_url.is_some() {
        let openai = providers.openai.get_or_insert_with(|| OpenAiProviderConfig {
            model: DEFAULT_OPENAI_MODEL.to_owned(),
            embedding_model: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
        });
        EnvConfigMapper::set_string(&mut openai.model, env.openai_model.as_deref());
        if let Some(base_url) = env.openai_base_url.as_deref() {
            openai.base_url = Some(base_url.to_owned());
        }
    }
}

struct EnvConfigMapper;

impl EnvConfigMapper {
    fn set_copy<T: Copy>(field: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *field = value;
        }
    }

    fn set_clone<T: Clone>(field: &mut T, value: Option<&T>) {
        if let Some(value) = value {
            *field = value.clone();
        }
    }

    fn set_opt_box_str(field: &mut Option<Box<str>>, value: Option<&str>) {
        if let Some(value) = value {
            *field = Some(value.to_owned().into_boxed_str());
        }
    }

    fn set_string(field: &mut String, value: Option<&str>) {
        if let Some(value) = value {
            value.clone_into(field);
        }
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// A secret env var was present but empty after trimming.
    EmptySecret {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } | Self::EmptySecret { .. } => {
                ErrorCode::new("config", "empty_env_var")
            },
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_env_url"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } | Self::EmptySecret { var } => {
                write!(formatter, "{var} must be non-empty")
            },
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidUrl { var, .. } => write!(formatter, "{var} must be a valid URL"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } | EnvParseError::EmptySecret { var } => {
                envelope.with_metadata("env_var", var)
            },
            EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidUrl { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", redact_value(var, &value)),
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_secret(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SecretString>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptySecret { var });
    }

    Ok(Some(SecretString::new(trimmed.to_owned())))
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(raw) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.into_string(),
        })
}

fn parse_optional_enum<T>(
    map: &BTreeMap<String, String>,
    var: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, EnvParseError> {
    let Some(raw) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    parse(&raw).map(Some).ok_or_else(|| EnvParseError::InvalidEnum {
        var,
        value: raw.into_string(),
    })
}

fn parse_optional_url_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    let invalid = || EnvParseError::InvalidUrl {
        var,
        value: raw.to_string(),
    };
    let parsed = Url::parse(&raw).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(Some(raw))
}

fn redact_value(var: &str, value: &str) -> String {
    if is_secret_key(var) || CONNECTION_VARS.iter().any(|name| *name == var) {
        REDACTED_VALUE.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn env_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn missing_vars_default_to_none() -> Result<(), Box<dyn Error>> {
        let env = AgentServiceEnv::from_map(&BTreeMap::new())?;
        assert_eq!(env, AgentServiceEnv::default());
        Ok(())
    }

    #[test]
    fn enums_parse_case_insensitively() -> Result<(), Box<dyn Error>> {
        let env = AgentServiceEnv::from_map(&env_map(&[
            (ENV_STORE_BACKEND, " Document "),
            (ENV_VECTOR_STORE_BACKEND, "POSTGRES"),
            (ENV_DEFAULT_PROVIDER, "OpenAI"),
        ]))?;
        assert_eq!(env.store_backend, Some(StoreBackend::Document));
        assert_eq!(env.vector_store_backend, Some(VectorStoreBackend::Postgres));
        assert_eq!(env.default_provider, Some(AiProvider::OpenAi));

        let error = AgentServiceEnv::from_map(&env_map(&[(ENV_STORE_BACKEND, "mongo")])).err();
        assert!(matches!(error, Some(EnvParseError::InvalidEnum { .. })));
        Ok(())
    }

    #[test]
    fn url_validation_accepts_http_and_https() -> Result<(), Box<dyn Error>> {
        let env = AgentServiceEnv::from_map(&env_map(&[(
            ENV_LOCAL_OLLAMA_URL,
            "https://models.internal:11434",
        )]))?;
        assert_eq!(
            env.local_ollama_url.as_deref(),
            Some("https://models.internal:11434")
        );

        let error =
            AgentServiceEnv::from_map(&env_map(&[(ENV_OPENAI_BASE_URL, "ftp://example.com")]))
                .err();
        assert!(matches!(error, Some(EnvParseError::InvalidUrl { .. })));
        Ok(())
    }

    #[test]
    fn secret_values_are_redacted_in_error_metadata() -> Result<(), Box<dyn Error>> {
        let error = AgentServiceEnv::from_map(&env_map(&[(ENV_OPENAI_API_AUTH, "   ")])).err();
        let envelope: ErrorEnvelope = error
            .ok_or_else(|| std::io::Error::other("expected secret error"))?
            .into();

        assert_eq!(envelope.code, ErrorCode::new("config", "empty_env_var"));
        assert_eq!(
            envelope.metadata.get("env_var").map(String::as_str),
            Some(ENV_OPENAI_API_AUTH)
        );
        assert!(!envelope.metadata.contains_key("value"));

        let redacted = redact_value(ENV_STORE_CONNECTION, "postgres://u:p@db/agents");
        assert_eq!(redacted, REDACTED_VALUE);
        Ok(())
    }

    #[test]
    fn provider_overrides_create_missing_profiles() -> Result<(), Box<dyn Error>> {
        let env = AgentServiceEnv::from_map(&env_map(&[(ENV_OPENAI_MODEL, "gpt-4.1")]))?;
        let config = apply_env_overrides(AgentServiceConfig::default(), &env)?;
        let openai = config
            .providers
            .openai
            .as_ref()
            .ok_or_else(|| std::io::Error::other("missing openai profile"))?;
        assert_eq!(openai.model, "gpt-4.1");
        assert!(config.provider_profiles().contains_key(&AiProvider::OpenAi));
        Ok(())
    }

    #[test]
    fn api_key_never_reaches_the_config() -> Result<(), Box<dyn Error>> {
        let env = AgentServiceEnv::from_map(&env_map(&[(ENV_OPENAI_API_AUTH, "sk-live")]))?;
        let config = apply_env_overrides(AgentServiceConfig::default(), &env)?;
        let rendered = serde_json::to_string(config.as_ref())?;
        assert!(!rendered.contains("sk-live"));
        assert_eq!(
            env.openai_api_key.as_ref().map(SecretString::expose),
            Some("sk-live")
        );
        Ok(())
    }
}

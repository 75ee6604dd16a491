//! Service configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization trims strings and folds empty optionals to `None`.

use code_agent_domain::{
    AiProvider, BedrockProviderConfig, BranchName, LocalProviderConfig, OpenAiProviderConfig,
    ProviderConfig,
};
use code_agent_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Default record table name.
pub const DEFAULT_STORE_TABLE: &str = "agents";
/// Default SQLite record database.
pub const DEFAULT_STORE_SQLITE_PATH: &str = ".code-agent/agents.db";
/// Default document store directory.
pub const DEFAULT_STORE_DOCUMENT_PATH: &str = ".code-agent/records";
/// Default checkout directory.
pub const DEFAULT_WORKSPACE_ROOT: &str = ".code-agent/workspace";
/// Default local object store directory.
pub const DEFAULT_OBJECT_STORE_ROOT: &str = ".code-agent/objects";
/// Default SQLite vector database.
pub const DEFAULT_VECTOR_SQLITE_PATH: &str = ".code-agent/vectors.db";
/// Default embedding dimension for pgvector tables.
pub const DEFAULT_VECTOR_DIMENSION: u32 = 1_536;
/// Default model server for the local provider profile.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default chat model for the local provider profile.
pub const DEFAULT_LOCAL_MODEL: &str = "codellama";
/// Default chat model for an OpenAI profile created from env.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

const VECTOR_DIMENSION_MIN: u32 = 1;
const VECTOR_DIMENSION_MAX: u32 = 65_536;
const TABLE_NAME_MAX_LEN: usize = 63;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Strips credentials from a URL before it lands in an error message.
fn sanitize_url_for_error(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() || !parsed.username().is_empty() {
                if parsed.set_username("").is_err() {
                    return "[invalid url: invalid username]".to_string();
                }
                if parsed.set_password(None).is_err() {
                    return "[invalid url: invalid password]".to_string();
                }
            }
            parsed.to_string()
        },
        Err(error) => format!("[invalid url: {error}]"),
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AgentServiceConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Agent record persistence.
    pub store: StoreConfig,
    /// Checkout, snapshot and vector store locations.
    pub provisioning: ProvisioningConfig,
    /// Provider selection and profiles.
    pub providers: ProvidersConfig,
    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl Default for AgentServiceConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            store: StoreConfig::default(),
            provisioning: ProvisioningConfig::default(),
            providers: ProvidersConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AgentServiceConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(
        mut self,
    ) -> Result<ValidatedAgentServiceConfig, ConfigSchemaError> {
        self.validate_version()?;

        self.store.normalize();
        self.store.validate()?;
        self.provisioning.normalize();
        let default_branch = self.provisioning.validate()?;
        let provider_profiles = self.providers.validate()?;
        self.observability.normalize_and_validate()?;

        Ok(ValidatedAgentServiceConfig {
            raw: self,
            default_branch,
            provider_profiles,
        })
    }

    /// Copy with connection string credentials removed, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        redact_connection(&mut copy.store.connection);
        redact_connection(&mut copy.provisioning.vector_store.connection);
        copy
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

fn redact_connection(connection: &mut Option<Box<str>>) {
    if let Some(value) = connection.as_mut() {
        *value = sanitize_url_for_error(value).into_boxed_str();
    }
}

/// Validated config wrapper carrying parsed domain values.
#[derive(Debug, Clone)]
pub struct ValidatedAgentServiceConfig {
    raw: AgentServiceConfig,
    default_branch: BranchName,
    provider_profiles: BTreeMap<AiProvider, ProviderConfig>,
}

impl ValidatedAgentServiceConfig {
    /// Branch used when a request omits one.
    #[must_use]
    pub const fn default_branch(&self) -> &BranchName {
        &self.default_branch
    }

    /// Validated provider profiles, keyed by provider.
    #[must_use]
    pub const fn provider_profiles(&self) -> &BTreeMap<AiProvider, ProviderConfig> {
        &self.provider_profiles
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &AgentServiceConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> AgentServiceConfig {
        self.raw
    }
}

impl AsRef<AgentServiceConfig> for ValidatedAgentServiceConfig {
    fn as_ref(&self) -> &AgentServiceConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedAgentServiceConfig {
    type Target = AgentServiceConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Record store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON document collection on disk.
    Document,
    /// Embedded SQLite database.
    #[default]
    Sqlite,
    /// PostgreSQL (feature `store-postgres`).
    Postgres,
}

impl StoreBackend {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// Parse a backend label (case-insensitive).
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "document" => Some(Self::Document),
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Agent record persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StoreConfig {
    /// Storage backend.
    pub backend: StoreBackend,
    /// File or directory for file-backed stores; backend default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Box<str>>,
    /// Connection URL for server-backed stores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<Box<str>>,
    /// Record table (or collection) name.
    pub table: Box<str>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            connection: None,
            table: DEFAULT_STORE_TABLE.into(),
        }
    }
}

impl StoreConfig {
    /// Path the file-backed backend should use.
    #[must_use]
    pub fn resolved_path(&self) -> &str {
        match (self.path.as_deref(), self.backend) {
            (Some(path), _) => path,
            (None, StoreBackend::Document) => DEFAULT_STORE_DOCUMENT_PATH,
            (None, _) => DEFAULT_STORE_SQLITE_PATH,
        }
    }

    fn normalize(&mut self) {
        normalize_optional_trimmed(&mut self.path);
        normalize_optional_trimmed(&mut self.connection);
        normalize_boxed_str(&mut self.table);
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_table_name(&self.table)?;
        if self.backend == StoreBackend::Postgres {
            validate_connection("store", self.connection.as_deref())?;
        }
        Ok(())
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    /// Embedded SQLite database.
    #[default]
    Sqlite,
    /// PostgreSQL with pgvector (feature `store-postgres`).
    Postgres,
}

impl VectorStoreBackend {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// Parse a backend label (case-insensitive).
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct VectorStoreConfig {
    /// Storage backend.
    pub backend: VectorStoreBackend,
    /// SQLite database file; default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Box<str>>,
    /// PostgreSQL connection URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<Box<str>>,
    /// Embedding dimension of created tables.
    pub dimension: u32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorStoreBackend::default(),
            path: None,
            connection: None,
            dimension: DEFAULT_VECTOR_DIMENSION,
        }
    }
}

impl VectorStoreConfig {
    /// SQLite path the backend should use.
    #[must_use]
    pub fn resolved_path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_VECTOR_SQLITE_PATH)
    }
}

/// Provisioning locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ProvisioningConfig {
    /// Directory receiving repository checkouts.
    pub workspace_root: Box<str>,
    /// Directory receiving repository snapshots.
    pub object_store_root: Box<str>,
    /// Vector store holding knowledge base tables.
    pub vector_store: VectorStoreConfig,
    /// Branch used when a request omits one.
    pub default_branch: Box<str>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            workspace_root: DEFAULT_WORKSPACE_ROOT.into(),
            object_store_root: DEFAULT_OBJECT_STORE_ROOT.into(),
            vector_store: VectorStoreConfig::default(),
            default_branch: code_agent_domain::DEFAULT_BRANCH.into(),
        }
    }
}

impl ProvisioningConfig {
    fn normalize(&mut self) {
        normalize_boxed_str(&mut self.workspace_root);
        normalize_boxed_str(&mut self.object_store_root);
        normalize_boxed_str(&mut self.default_branch);
        normalize_optional_trimmed(&mut self.vector_store.path);
        normalize_optional_trimmed(&mut self.vector_store.connection);
    }

    fn validate(&self) -> Result<BranchName, ConfigSchemaError> {
        require_non_empty("provisioning", "workspaceRoot", &self.workspace_root)?;
        require_non_empty("provisioning", "objectStoreRoot", &self.object_store_root)?;

        let dimension = self.vector_store.dimension;
        if !(VECTOR_DIMENSION_MIN..=VECTOR_DIMENSION_MAX).contains(&dimension) {
            return Err(ConfigSchemaError::LimitOutOfRange {
                section: "provisioning.vectorStore",
                field: "dimension",
                value: u64::from(dimension),
                min: u64::from(VECTOR_DIMENSION_MIN),
                max: u64::from(VECTOR_DIMENSION_MAX),
            });
        }
        if self.vector_store.backend == VectorStoreBackend::Postgres {
            validate_connection(
                "provisioning.vectorStore",
                self.vector_store.connection.as_deref(),
            )?;
        }

        BranchName::parse(&self.default_branch).map_err(|_| ConfigSchemaError::InvalidField {
            section: "provisioning",
            field: "defaultBranch",
            reason: "must be a branch name without whitespace or '..'",
        })
    }
}

/// Provider selection and per-provider profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ProvidersConfig {
    /// Provider used when a request omits one.
    pub default: AiProvider,
    /// Local runtime profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalProviderConfig>,
    /// AWS profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrock: Option<BedrockProviderConfig>,
    /// OpenAI-compatible profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAiProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: AiProvider::Local,
            local: Some(default_local_profile()),
            bedrock: None,
            openai: None,
        }
    }
}

impl ProvidersConfig {
    fn validate(&self) -> Result<BTreeMap<AiProvider, ProviderConfig>, ConfigSchemaError> {
        let profiles = [
            self.local.clone().map(ProviderConfig::Local),
            self.bedrock.clone().map(ProviderConfig::Bedrock),
            self.openai.clone().map(ProviderConfig::OpenAi),
        ];

        let mut validated = BTreeMap::new();
        for profile in profiles.into_iter().flatten() {
            profile
                .validate()
                .map_err(|error| ConfigSchemaError::InvalidProviderProfile {
                    provider: profile.provider(),
                    message: error.to_string(),
                })?;
            validated.insert(profile.provider(), profile);
        }
        Ok(validated)
    }
}

/// Local profile used when the config names none.
#[must_use]
pub fn default_local_profile() -> LocalProviderConfig {
    LocalProviderConfig {
        ollama_url: DEFAULT_OLLAMA_URL.to_owned(),
        model: DEFAULT_LOCAL_MODEL.to_owned(),
        chroma_url: None,
        embedding_model: None,
        temperature: None,
        max_tokens: None,
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ObservabilityConfig {
    /// Minimum level: `trace`, `debug`, `info`, `warn` or `error`.
    pub log_level: Box<str>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl ObservabilityConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        let normalized = self.log_level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&normalized.as_str()) {
            return Err(ConfigSchemaError::InvalidLogLevel { value: normalized });
        }
        self.log_level = normalized.into_boxed_str();
        Ok(())
    }
}

/// Parse and validate a config from JSON.
pub fn parse_agent_service_config_json(
    input: &str,
) -> Result<ValidatedAgentServiceConfig, ErrorEnvelope> {
    let config: AgentServiceConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;
    config.validate_and_normalize().map_err(Into::into)
}

/// Parse and validate a config from TOML.
pub fn parse_agent_service_config_toml(
    input: &str,
) -> Result<ValidatedAgentServiceConfig, ErrorEnvelope> {
    let config: AgentServiceConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;
    config.validate_and_normalize().map_err(Into::into)
}

/// Config validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// Unsupported schema version.
    UnsupportedVersion {
        /// Version found in the input.
        found: u32,
        /// Version this build understands.
        supported: u32,
    },
    /// Required string is empty after trimming.
    EmptyField {
        /// Config section.
        section: &'static str,
        /// Field name.
        field: &'static str,
    },
    /// A backend needs a field that is absent.
    MissingField {
        /// Config section.
        section: &'static str,
        /// Field name.
        field: &'static str,
    },
    /// Field value violates a rule.
    InvalidField {
        /// Config section.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Violated rule.
        reason: &'static str,
    },
    /// Table name is not a safe SQL identifier.
    InvalidTableName {
        /// Offending value.
        value: String,
    },
    /// Connection URL is malformed or uses the wrong scheme.
    InvalidUrl {
        /// Config section.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Credential-free rendering of the value.
        value: String,
    },
    /// Numeric value outside its bounds.
    LimitOutOfRange {
        /// Config section.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u64,
        /// Inclusive minimum.
        min: u64,
        /// Inclusive maximum.
        max: u64,
    },
    /// Provider profile does not validate.
    InvalidProviderProfile {
        /// Profile owner.
        provider: AiProvider,
        /// Validation message.
        message: String,
    },
    /// Unknown log level.
    InvalidLogLevel {
        /// Normalized value.
        value: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::EmptyField { .. } => "empty_field",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
            Self::InvalidTableName { .. } => "invalid_table_name",
            Self::InvalidUrl { .. } => "invalid_url",
            Self::LimitOutOfRange { .. } => "invalid_limit",
            Self::InvalidProviderProfile { .. } => "invalid_provider_profile",
            Self::InvalidLogLevel { .. } => "invalid_log_level",
        };
        ErrorCode::new("config", code)
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                formatter,
                "unsupported config version {found} (supported: {supported})"
            ),
            Self::EmptyField { section, field } => {
                write!(formatter, "{section}.{field} must be non-empty")
            },
            Self::MissingField { section, field } => {
                write!(formatter, "{section}.{field} is required for this backend")
            },
            Self::InvalidField {
                section,
                field,
                reason,
            } => write!(formatter, "{section}.{field} {reason}"),
            Self::InvalidTableName { value } => write!(
                formatter,
                "store.table `{value}` must match ^[A-Za-z_][A-Za-z0-9_]{{0,62}}$"
            ),
            Self::InvalidUrl { section, field, .. } => write!(
                formatter,
                "{section}.{field} must be a postgres:// or postgresql:// URL"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                min,
                max,
                ..
            } => write!(formatter, "{section}.{field} must be between {min} and {max}"),
            Self::InvalidProviderProfile { provider, message } => {
                write!(formatter, "providers.{provider} is invalid: {message}")
            },
            Self::InvalidLogLevel { value } => write!(
                formatter,
                "observability.logLevel `{value}` must be one of {}",
                LOG_LEVELS.join(", ")
            ),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => envelope
                .with_metadata("found", found.to_string())
                .with_metadata("supported", supported.to_string()),
            ConfigSchemaError::EmptyField { section, field }
            | ConfigSchemaError::MissingField { section, field }
            | ConfigSchemaError::InvalidField { section, field, .. } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field),
            ConfigSchemaError::InvalidTableName { value } => envelope
                .with_metadata("section", "store")
                .with_metadata("field", "table")
                .with_metadata("value", value),
            ConfigSchemaError::InvalidUrl {
                section,
                field,
                value,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value", value),
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("min", min.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::InvalidProviderProfile { provider, .. } => envelope
                .with_metadata("section", "providers")
                .with_metadata("field", provider.as_str()),
            ConfigSchemaError::InvalidLogLevel { value } => envelope
                .with_metadata("section", "observability")
                .with_metadata("field", "logLevel")
                .with_metadata("value", value),
        }
    }
}

/// True for `^[A-Za-z_][A-Za-z0-9_]{0,62}$`.
#[must_use]
pub fn is_valid_table_name(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= TABLE_NAME_MAX_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_table_name(value: &str) -> Result<(), ConfigSchemaError> {
    if is_valid_table_name(value) {
        Ok(())
    } else {
        Err(ConfigSchemaError::InvalidTableName {
            value: value.to_owned(),
        })
    }
}

fn validate_connection(
    section: &'static str,
    value: Option<&str>,
) -> Result<(), ConfigSchemaError> {
    let Some(value) = value else {
        return Err(ConfigSchemaError::MissingField {
            section,
            field: "connection",
        });
    };
    let invalid = || ConfigSchemaError::InvalidUrl {
        section,
        field: "connection",
        value: sanitize_url_for_error(value),
    };
    let parsed = Url::parse(value).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        return Err(invalid());
    }
    Ok(())
}

fn require_non_empty(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigSchemaError> {
    if value.is_empty() {
        return Err(ConfigSchemaError::EmptyField { section, field });
    }
    Ok(())
}

fn normalize_optional_trimmed(value: &mut Option<Box<str>>) {
    if let Some(current) = value.as_ref() {
        let trimmed = current.trim();
        if trimmed.is_empty() {
            *value = None;
        } else if trimmed.len() != current.len() {
            *value = Some(trimmed.to_owned().into_boxed_str());
        }
    }
}

fn normalize_boxed_str(value: &mut Box<str>) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_owned().into_boxed_str();
    }
}

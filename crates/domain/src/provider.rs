//! AI provider selection and per-provider configuration payloads.
//!
//! The record persists `ai_config` as an opaque JSON value; this module is the
//! only place that gives it shape. Each provider owns a closed, validated
//! struct, and unknown keys are rejected.

use code_agent_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const MAX_TEMPERATURE: f64 = 2.0;
const MAX_TOKENS_CAP: u32 = 200_000;

/// Backend family that hosts an agent and its knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AiProvider {
    /// Self-hosted model runtime.
    #[serde(rename = "local")]
    Local,
    /// Managed agents and knowledge bases on AWS.
    #[serde(rename = "bedrock")]
    Bedrock,
    /// OpenAI-compatible hosted assistants.
    #[serde(rename = "openai")]
    OpenAi,
}

impl AiProvider {
    /// Every supported provider, in display order.
    pub const ALL: [Self; 3] = [Self::Local, Self::Bedrock, Self::OpenAi];

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Bedrock => "bedrock",
            Self::OpenAi => "openai",
        }
    }

    /// Parse a provider label (case-insensitive).
    pub fn parse(input: &str) -> Result<Self, ProviderConfigError> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or(ProviderConfigError::UnsupportedProvider { input: normalized })
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Local model runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalProviderConfig {
    /// Base URL of the model server.
    pub ollama_url: String,
    /// Chat model name.
    pub model: String,
    /// Vector database endpoint used by the runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroma_url: Option<String>,
    /// Embedding model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Managed-agent settings on AWS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockProviderConfig {
    /// AWS region.
    pub region: String,
    /// Foundation model backing the agent.
    pub foundation_model: String,
    /// Role assumed by the agent.
    pub agent_service_role_arn: String,
    /// Role assumed by the knowledge base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_service_role_arn: Option<String>,
    /// Embedding model for the knowledge base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Bucket receiving repository snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket_name: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// OpenAI-compatible assistant settings. API keys are runtime secrets and
/// never part of this payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiProviderConfig {
    /// Chat model name.
    pub model: String,
    /// Embedding model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Alternative API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Validated provider payload, one variant per [`AiProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    /// Local runtime.
    Local(LocalProviderConfig),
    /// AWS managed agents.
    Bedrock(BedrockProviderConfig),
    /// OpenAI-compatible assistants.
    OpenAi(OpenAiProviderConfig),
}

impl ProviderConfig {
    /// Provider this payload belongs to.
    #[must_use]
    pub const fn provider(&self) -> AiProvider {
        match self {
            Self::Local(_) => AiProvider::Local,
            Self::Bedrock(_) => AiProvider::Bedrock,
            Self::OpenAi(_) => AiProvider::OpenAi,
        }
    }

    /// Decode and validate an opaque payload for `provider`.
    pub fn from_value(provider: AiProvider, value: Value) -> Result<Self, ProviderConfigError> {
        let malformed = |error: serde_json::Error| ProviderConfigError::Malformed {
            provider,
            message: error.to_string(),
        };
        let config = match provider {
            AiProvider::Local => Self::Local(serde_json::from_value(value).map_err(malformed)?),
            AiProvider::Bedrock => {
                Self::Bedrock(serde_json::from_value(value).map_err(malformed)?)
            },
            AiProvider::OpenAi => Self::OpenAi(serde_json::from_value(value).map_err(malformed)?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Encode as the opaque payload stored on the record.
    pub fn to_value(&self) -> Result<Value, ProviderConfigError> {
        let encoded = match self {
            Self::Local(config) => serde_json::to_value(config),
            Self::Bedrock(config) => serde_json::to_value(config),
            Self::OpenAi(config) => serde_json::to_value(config),
        };
        encoded.map_err(|error| ProviderConfigError::Malformed {
            provider: self.provider(),
            message: error.to_string(),
        })
    }

    /// Check required fields, URLs, ARNs and numeric ranges.
    pub fn validate(&self) -> Result<(), ProviderConfigError> {
        let provider = self.provider();
        let check = FieldCheck { provider };
        match self {
            Self::Local(config) => {
                check.http_url("ollama_url", &config.ollama_url)?;
                check.required("model", &config.model)?;
                if let Some(url) = &config.chroma_url {
                    check.http_url("chroma_url", url)?;
                }
                check.sampling(config.temperature, config.max_tokens)
            },
            Self::Bedrock(config) => {
                check.required("region", &config.region)?;
                check.required("foundation_model", &config.foundation_model)?;
                check.arn("agent_service_role_arn", &config.agent_service_role_arn)?;
                if let Some(arn) = &config.knowledge_base_service_role_arn {
                    check.arn("knowledge_base_service_role_arn", arn)?;
                }
                check.sampling(config.temperature, config.max_tokens)
            },
            Self::OpenAi(config) => {
                check.required("model", &config.model)?;
                if let Some(url) = &config.base_url {
                    check.http_url("base_url", url)?;
                }
                check.sampling(config.temperature, config.max_tokens)
            },
        }
    }
}

struct FieldCheck {
    provider: AiProvider,
}

impl FieldCheck {
    fn required(&self, field: &'static str, value: &str) -> Result<(), ProviderConfigError> {
        if value.trim().is_empty() {
            return Err(ProviderConfigError::MissingField {
                provider: self.provider,
                field,
            });
        }
        Ok(())
    }

    fn http_url(&self, field: &'static str, value: &str) -> Result<(), ProviderConfigError> {
        self.required(field, value)?;
        let host = value
            .strip_prefix("http://")
            .or_else(|| value.strip_prefix("https://"))
            .map(|rest| rest.split(['/', '?', '#']).next().unwrap_or_default());
        match host {
            Some(host) if !host.is_empty() => Ok(()),
            _ => Err(ProviderConfigError::InvalidField {
                provider: self.provider,
                field,
                reason: "must be an http(s) URL",
            }),
        }
    }

    fn arn(&self, field: &'static str, value: &str) -> Result<(), ProviderConfigError> {
        self.required(field, value)?;
        if value.starts_with("arn:") {
            Ok(())
        } else {
            Err(ProviderConfigError::InvalidField {
                provider: self.provider,
                field,
                reason: "must be an ARN",
            })
        }
    }

    fn sampling(
        &self,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Result<(), ProviderConfigError> {
        if let Some(value) = temperature
            && !(0.0..=MAX_TEMPERATURE).contains(&value)
        {
            return Err(ProviderConfigError::InvalidField {
                provider: self.provider,
                field: "temperature",
                reason: "must be between 0 and 2",
            });
        }
        if let Some(value) = max_tokens
            && !(1..=MAX_TOKENS_CAP).contains(&value)
        {
            return Err(ProviderConfigError::InvalidField {
                provider: self.provider,
                field: "max_tokens",
                reason: "must be between 1 and 200000",
            });
        }
        Ok(())
    }
}

/// Provider selection or payload validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfigError {
    /// Label is not a supported provider.
    UnsupportedProvider {
        /// Normalized label.
        input: String,
    },
    /// Payload does not decode into the provider's shape.
    Malformed {
        /// Target provider.
        provider: AiProvider,
        /// Decoder message.
        message: String,
    },
    /// Required field is empty.
    MissingField {
        /// Target provider.
        provider: AiProvider,
        /// Field name.
        field: &'static str,
    },
    /// Field value violates a rule.
    InvalidField {
        /// Target provider.
        provider: AiProvider,
        /// Field name.
        field: &'static str,
        /// Violated rule.
        reason: &'static str,
    },
}

impl fmt::Display for ProviderConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedProvider { input } => {
                write!(formatter, "unsupported AI provider `{input}`")
            },
            Self::Malformed { provider, message } => {
                write!(formatter, "invalid {provider} ai_config: {message}")
            },
            Self::MissingField { provider, field } => {
                write!(formatter, "{provider} ai_config requires `{field}`")
            },
            Self::InvalidField {
                provider,
                field,
                reason,
            } => write!(formatter, "{provider} ai_config `{field}` {reason}"),
        }
    }
}

impl std::error::Error for ProviderConfigError {}

impl From<ProviderConfigError> for ErrorEnvelope {
    fn from(error: ProviderConfigError) -> Self {
        let message = error.to_string();
        match error {
            ProviderConfigError::UnsupportedProvider { input } => Self::expected(
                ErrorCode::new("domain", "unsupported_ai_provider"),
                message,
            )
            .with_metadata("provider", input),
            ProviderConfigError::Malformed { provider, .. } => {
                Self::expected(ErrorCode::new("domain", "invalid_ai_config"), message)
                    .with_metadata("provider", provider.as_str())
            },
            ProviderConfigError::MissingField { provider, field }
            | ProviderConfigError::InvalidField {
                provider, field, ..
            } => Self::expected(ErrorCode::new("domain", "invalid_ai_config"), message)
                .with_metadata("provider", provider.as_str())
                .with_metadata("field", field),
        }
    }
}

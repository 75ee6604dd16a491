//! Request DTOs and validation helpers.
//!
//! Requests are boundary inputs (CLI/API) and must be validated before being
//! passed into use-cases. Validation here is limited to:
//! - shape (required fields, trimming, JSON object payloads)
//! - bounds (`max_results`)
//!
//! Domain invariants (id, URL and branch rules) are delegated to domain
//! constructors and not duplicated here.

use code_agent_domain::{
    AgentId, AgentName, AiProvider, BranchName, CreateAgentCommand, ListAgentsCommand,
    MAX_PAGE_SIZE, PageSize, PageToken, RepositoryUrl, UpdateAgentCommand,
};
use code_agent_shared::{ErrorCode, ErrorEnvelope};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Create-agent request payload (boundary DTO).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateAgentRequestDto {
    /// Caller-chosen id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Repository to build the knowledge base from.
    pub repository_url: String,
    /// Branch to clone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// `local`, `bedrock` or `openai`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
    /// Provider payload (JSON object).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_config: Option<Value>,
}

/// Update-agent request payload (boundary DTO).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateAgentRequestDto {
    /// Agent to change.
    pub agent_id: String,
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// New repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// New branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// New provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
    /// New provider payload (JSON object).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_config: Option<Value>,
}

/// List-agents request payload (boundary DTO).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListAgentsRequestDto {
    /// Continuation token from a previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Page size, 1 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

/// Get/delete request payload (boundary DTO).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AgentIdRequestDto {
    /// Agent to address.
    pub agent_id: String,
}

/// Request validation errors mapped to `ErrorEnvelope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    /// A required string field is empty after trimming.
    EmptyField {
        /// Field name that failed validation.
        field: &'static str,
    },
    /// A field contains invalid content.
    InvalidField {
        /// Field name that failed validation.
        field: &'static str,
        /// Short reason describing why validation failed.
        reason: &'static str,
    },
    /// A numeric field is out of bounds.
    OutOfRange {
        /// Field name that failed validation.
        field: &'static str,
        /// Value provided (stringified).
        value: String,
        /// Inclusive minimum bound (stringified).
        min: String,
        /// Inclusive maximum bound (stringified).
        max: String,
    },
}

impl RequestValidationError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyField { .. } => ErrorCode::new("request", "empty_field"),
            Self::InvalidField { .. } => ErrorCode::new("request", "invalid_field"),
            Self::OutOfRange { .. } => ErrorCode::new("request", "out_of_range"),
        }
    }
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyField { field } => write!(formatter, "{field} must be non-empty"),
            Self::InvalidField { field, reason } => {
                write!(formatter, "{field} is invalid: {reason}")
            },
            Self::OutOfRange {
                field, min, max, ..
            } => {
                write!(formatter, "{field} must be between {min} and {max}")
            },
        }
    }
}

impl std::error::Error for RequestValidationError {}

impl From<RequestValidationError> for ErrorEnvelope {
    fn from(error: RequestValidationError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            RequestValidationError::EmptyField { field } => envelope.with_metadata("field", field),
            RequestValidationError::InvalidField { field, reason } => envelope
                .with_metadata("field", field)
                .with_metadata("reason", reason),
            RequestValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("field", field)
                .with_metadata("value", value)
                .with_metadata("min", min)
                .with_metadata("max", max),
        }
    }
}

/// Validate a create request into a use-case command.
pub fn validate_create_agent_request(
    dto: &CreateAgentRequestDto,
) -> Result<CreateAgentCommand, ErrorEnvelope> {
    let repository_url = require_trimmed("repository_url", &dto.repository_url)?;
    Ok(CreateAgentCommand {
        agent_id: optional_trimmed("agent_id", dto.agent_id.as_deref())?
            .map(AgentId::parse)
            .transpose()?,
        repository_url: RepositoryUrl::parse(&repository_url)?,
        branch: optional_trimmed("branch", dto.branch.as_deref())?
            .map(BranchName::parse)
            .transpose()?,
        agent_name: optional_trimmed("agent_name", dto.agent_name.as_deref())?
            .map(AgentName::parse)
            .transpose()?,
        ai_provider: optional_trimmed("ai_provider", dto.ai_provider.as_deref())?
            .map(|raw| AiProvider::parse(&raw))
            .transpose()?,
        ai_config: validate_ai_config(dto.ai_config.as_ref())?,
    })
}

/// Validate an update request into a use-case command.
pub fn validate_update_agent_request(
    dto: &UpdateAgentRequestDto,
) -> Result<UpdateAgentCommand, ErrorEnvelope> {
    let agent_id = require_trimmed("agent_id", &dto.agent_id)?;
    Ok(UpdateAgentCommand {
        agent_id: AgentId::parse(&agent_id)?,
        agent_name: optional_trimmed("agent_name", dto.agent_name.as_deref())?
            .map(AgentName::parse)
            .transpose()?,
        repository_url: optional_trimmed("repository_url", dto.repository_url.as_deref())?
            .map(RepositoryUrl::parse)
            .transpose()?,
        branch: optional_trimmed("branch", dto.branch.as_deref())?
            .map(BranchName::parse)
            .transpose()?,
        ai_provider: optional_trimmed("ai_provider", dto.ai_provider.as_deref())?
            .map(|raw| AiProvider::parse(&raw))
            .transpose()?,
        ai_config: validate_ai_config(dto.ai_config.as_ref())?,
    })
}

/// Validate a list request into a use-case command.
pub fn validate_list_agents_request(
    dto: &ListAgentsRequestDto,
) -> Result<ListAgentsCommand, ErrorEnvelope> {
    let page_size = PageSize::parse(dto.max_results).map_err(|_| {
        RequestValidationError::OutOfRange {
            field: "max_results",
            value: dto.max_results.unwrap_or_default().to_string(),
            min: "1".to_owned(),
            max: MAX_PAGE_SIZE.to_string(),
        }
    })?;
    let page_token = match dto.page_token.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let token = PageToken::parse(raw).map_err(ErrorEnvelope::from)?;
            token.decode().map_err(ErrorEnvelope::from)?;
            Some(token)
        },
    };
    Ok(ListAgentsCommand {
        page_token,
        page_size,
    })
}

/// Validate a get/delete request.
pub fn validate_agent_id_request(dto: &AgentIdRequestDto) -> Result<AgentId, ErrorEnvelope> {
    let agent_id = require_trimmed("agent_id", &dto.agent_id)?;
    Ok(AgentId::parse(&agent_id)?)
}

/// Parse and validate a create request from JSON.
pub fn parse_create_agent_request_json(input: &str) -> Result<CreateAgentCommand, ErrorEnvelope> {
    let dto: CreateAgentRequestDto = parse_request_json("createAgent", input)?;
    validate_create_agent_request(&dto)
}

/// Parse and validate an update request from JSON.
pub fn parse_update_agent_request_json(input: &str) -> Result<UpdateAgentCommand, ErrorEnvelope> {
    let dto: UpdateAgentRequestDto = parse_request_json("updateAgent", input)?;
    validate_update_agent_request(&dto)
}

/// Parse and validate a list request from JSON.
pub fn parse_list_agents_request_json(input: &str) -> Result<ListAgentsCommand, ErrorEnvelope> {
    let dto: ListAgentsRequestDto = parse_request_json("listAgents", input)?;
    validate_list_agents_request(&dto)
}

/// Parse and validate a get/delete request from JSON.
pub fn parse_agent_id_request_json(input: &str) -> Result<AgentId, ErrorEnvelope> {
    let dto: AgentIdRequestDto = parse_request_json("agentId", input)?;
    validate_agent_id_request(&dto)
}

fn parse_request_json<T: DeserializeOwned>(
    kind: &'static str,
    input: &str,
) -> Result<T, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("request", "invalid_json"),
            format!("invalid {kind} request JSON: {error}"),
        )
        .with_metadata("request_kind", kind)
    })
}

fn require_trimmed(field: &'static str, value: &str) -> Result<Box<str>, ErrorEnvelope> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RequestValidationError::EmptyField { field }.into());
    }
    if trimmed.contains('\0') {
        return Err(RequestValidationError::InvalidField {
            field,
            reason: "contains NUL byte",
        }
        .into());
    }
    Ok(trimmed.to_owned().into_boxed_str())
}

/// Absent and blank optionals both mean "not supplied".
fn optional_trimmed(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<Box<str>>, ErrorEnvelope> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => require_trimmed(field, raw).map(Some),
    }
}

fn validate_ai_config(value: Option<&Value>) -> Result<Option<Value>, ErrorEnvelope> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(object @ Value::Object(_)) => Ok(Some(object.clone())),
        Some(_) => Err(RequestValidationError::InvalidField {
            field: "ai_config",
            reason: "must be a JSON object",
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_shared::ErrorCategory;
    use serde_json::json;

    #[test]
    fn create_defaults_are_left_to_the_use_case() -> Result<(), ErrorEnvelope> {
        let command = parse_create_agent_request_json(
            r#"{"repository_url": " https://github.com/x/y ", "branch": "  "}"#,
        )?;
        assert_eq!(command.repository_url.as_str(), "https://github.com/x/y");
        assert!(command.branch.is_none());
        assert!(command.agent_id.is_none());
        assert!(command.ai_provider.is_none());
        Ok(())
    }

    #[test]
    fn create_rejects_unknown_fields_and_bad_payloads() {
        let unknown = parse_create_agent_request_json(
            r#"{"repository_url": "https://github.com/x/y", "repo": "z"}"#,
        );
        assert_eq!(
            unknown.err().map(|e| e.code),
            Some(ErrorCode::new("request", "invalid_json"))
        );

        let dto = CreateAgentRequestDto {
            agent_id: None,
            repository_url: "https://github.com/x/y".to_owned(),
            branch: None,
            agent_name: None,
            ai_provider: Some("mainframe".to_owned()),
            ai_config: None,
        };
        let error = validate_create_agent_request(&dto).err();
        assert_eq!(error.map(|e| e.category()), Some(ErrorCategory::Validation));

        let dto = CreateAgentRequestDto {
            ai_provider: None,
            ai_config: Some(json!(["not", "an", "object"])),
            ..dto
        };
        let error = validate_create_agent_request(&dto).err();
        assert_eq!(
            error.map(|e| e.code),
            Some(ErrorCode::new("request", "invalid_field"))
        );
    }

    #[test]
    fn empty_repository_url_is_rejected() {
        let error = parse_create_agent_request_json(r#"{"repository_url": "   "}"#).err();
        assert_eq!(
            error.map(|e| e.code),
            Some(ErrorCode::new("request", "empty_field"))
        );
    }

    #[test]
    fn update_keeps_absent_fields_absent() -> Result<(), ErrorEnvelope> {
        let command = parse_update_agent_request_json(
            r#"{"agent_id": "agent-1", "agent_name": "reviewer", "ai_provider": "OPENAI"}"#,
        )?;
        assert_eq!(command.agent_id.as_str(), "agent-1");
        assert_eq!(command.agent_name.as_ref().map(AgentName::as_str), Some("reviewer"));
        assert_eq!(command.ai_provider, Some(AiProvider::OpenAi));
        assert!(command.repository_url.is_none());
        assert!(command.ai_config.is_none());
        Ok(())
    }

    #[test]
    fn max_results_bounds() -> Result<(), ErrorEnvelope> {
        let command = validate_list_agents_request(&ListAgentsRequestDto::default())?;
        assert_eq!(command.page_size, PageSize::default());

        for out_of_range in [0, MAX_PAGE_SIZE + 1] {
            let error = validate_list_agents_request(&ListAgentsRequestDto {
                page_token: None,
                max_results: Some(out_of_range),
            })
            .err();
            assert_eq!(
                error.map(|e| e.code),
                Some(ErrorCode::new("request", "out_of_range"))
            );
        }
        Ok(())
    }

    #[test]
    fn malformed_page_token_is_rejected_at_the_boundary() {
        let error = validate_list_agents_request(&ListAgentsRequestDto {
            page_token: Some("%%%".to_owned()),
            max_results: None,
        })
        .err();
        assert_eq!(error.map(|e| e.category()), Some(ErrorCategory::Validation));
    }
}

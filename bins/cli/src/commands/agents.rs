//! `agents` command handlers.
//!
//! Requests come either from flags or from a full JSON payload
//! (`--input-json`, `-` for stdin). Both paths end in the same validators.

use super::{ConfigSource, read_json_argument};
use crate::CliOutput;
use crate::error::CliError;
use crate::format::{OutputMode, format_error_output, ok_output, pretty_json};
use clap::{Args, Subcommand};
use code_agent_config::{
    AgentIdRequestDto, CreateAgentRequestDto, ListAgentsRequestDto, UpdateAgentRequestDto,
    validate_agent_id_request, validate_create_agent_request, validate_list_agents_request,
    validate_update_agent_request,
};
use code_agent_domain::{AgentId, AgentPage, AgentRecord, PageToken};
use code_agent_infra::{
    AgentAction, AgentOutcome, InfraResult, RequestKind, ValidatedRequest,
    run_agent_action_local, validate_request_json,
};
use code_agent_shared::{ErrorCode, ErrorEnvelope};
use serde::Serialize;
use serde_json::Value;

/// Agent lifecycle subcommands.
#[derive(Debug, Subcommand)]
pub enum AgentCommands {
    /// Provision a knowledge base and agent for a repository.
    Create(CreateArgs),
    /// Show one agent.
    Get(AgentIdArgs),
    /// Rename an agent, or rebuild it from a new repository, branch or provider.
    Update(UpdateArgs),
    /// Tear down an agent's resources and remove its record.
    Delete(AgentIdArgs),
    /// List agents, newest first.
    List(ListArgs),
}

/// Flags for `agents create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Full create request as JSON (`-` reads stdin).
    #[arg(long, conflicts_with_all = ["repository_url", "agent_id", "branch", "name", "provider", "ai_config_json"])]
    pub input_json: Option<String>,
    /// Repository to index.
    #[arg(long)]
    pub repository_url: Option<String>,
    /// Caller-chosen agent id.
    #[arg(long)]
    pub agent_id: Option<String>,
    /// Branch to check out.
    #[arg(long)]
    pub branch: Option<String>,
    /// Display name.
    #[arg(long)]
    pub name: Option<String>,
    /// Provider (`local`, `bedrock`, `openai`).
    #[arg(long)]
    pub provider: Option<String>,
    /// Provider settings as a JSON object.
    #[arg(long)]
    pub ai_config_json: Option<String>,
}

/// Flags for `agents update`.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Full update request as JSON (`-` reads stdin).
    #[arg(long, conflicts_with_all = ["agent_id", "repository_url", "branch", "name", "provider", "ai_config_json"])]
    pub input_json: Option<String>,
    /// Agent to update.
    #[arg(long, required_unless_present = "input_json")]
    pub agent_id: Option<String>,
    /// New repository.
    #[arg(long)]
    pub repository_url: Option<String>,
    /// New branch.
    #[arg(long)]
    pub branch: Option<String>,
    /// New display name.
    #[arg(long)]
    pub name: Option<String>,
    /// New provider.
    #[arg(long)]
    pub provider: Option<String>,
    /// New provider settings as a JSON object.
    #[arg(long)]
    pub ai_config_json: Option<String>,
}

/// Flags addressing one agent.
#[derive(Debug, Args)]
pub struct AgentIdArgs {
    /// Agent id.
    #[arg(long)]
    pub agent_id: String,
}

/// Flags for `agents list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Records per page.
    #[arg(long, alias = "max-results")]
    pub page_size: Option<u32>,
    /// Token from a previous page.
    #[arg(long)]
    pub page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentListView<'a> {
    status: &'static str,
    agents: &'a [AgentRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
}

/// Run an `agents` subcommand.
pub fn run_agents(
    mode: OutputMode,
    source: ConfigSource<'_>,
    command: &AgentCommands,
) -> Result<CliOutput, CliError> {
    let action = match agent_action(command)? {
        Ok(action) => action,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    let operation = action.operation();

    match run_agent_action_local(source.env, source.path, source.overrides_json, action) {
        Ok(AgentOutcome::Record(record)) => Ok(ok_output(
            mode,
            format_record(mode, &record)?,
            &format!("{operation} completed"),
        )),
        Ok(AgentOutcome::Page(page)) => Ok(ok_output(
            mode,
            format_page(mode, &page)?,
            &format!("{operation} completed"),
        )),
        Err(error) => Ok(format_error_output(mode, &error)),
    }
}

/// Validated action for `command`; the outer error is a CLI I/O failure.
fn agent_action(command: &AgentCommands) -> Result<InfraResult<AgentAction>, CliError> {
    Ok(match command {
        AgentCommands::Create(args) => match args.input_json.as_deref() {
            Some(raw) => from_json(RequestKind::CreateAgent, &read_json_argument(raw)?),
            None => create_from_flags(args),
        },
        AgentCommands::Update(args) => match args.input_json.as_deref() {
            Some(raw) => from_json(RequestKind::UpdateAgent, &read_json_argument(raw)?),
            None => update_from_flags(args),
        },
        AgentCommands::Get(args) => agent_id_from_flags(args).map(AgentAction::Get),
        AgentCommands::Delete(args) => agent_id_from_flags(args).map(AgentAction::Delete),
        AgentCommands::List(args) => validate_list_agents_request(&ListAgentsRequestDto {
            page_token: args.page_token.clone(),
            max_results: args.page_size,
        })
        .map(AgentAction::List),
    })
}

fn from_json(kind: RequestKind, input: &str) -> InfraResult<AgentAction> {
    match validate_request_json(kind, input)? {
        ValidatedRequest::CreateAgent(command) => Ok(AgentAction::Create(command)),
        ValidatedRequest::UpdateAgent(command) => Ok(AgentAction::Update(command)),
        ValidatedRequest::ListAgents(command) => Ok(AgentAction::List(command)),
        ValidatedRequest::AgentId(agent_id) => Ok(AgentAction::Get(agent_id)),
    }
}

fn create_from_flags(args: &CreateArgs) -> InfraResult<AgentAction> {
    let dto = CreateAgentRequestDto {
        agent_id: args.agent_id.clone(),
        repository_url: args.repository_url.clone().unwrap_or_default(),
        branch: args.branch.clone(),
        agent_name: args.name.clone(),
        ai_provider: args.provider.clone(),
        ai_config: parse_ai_config(args.ai_config_json.as_deref())?,
    };
    validate_create_agent_request(&dto).map(AgentAction::Create)
}

fn update_from_flags(args: &UpdateArgs) -> InfraResult<AgentAction> {
    let dto = UpdateAgentRequestDto {
        agent_id: args.agent_id.clone().unwrap_or_default(),
        agent_name: args.name.clone(),
        repository_url: args.repository_url.clone(),
        branch: args.branch.clone(),
        ai_provider: args.provider.clone(),
        ai_config: parse_ai_config(args.ai_config_json.as_deref())?,
    };
    validate_update_agent_request(&dto).map(AgentAction::Update)
}

fn agent_id_from_flags(args: &AgentIdArgs) -> InfraResult<AgentId> {
    validate_agent_id_request(&AgentIdRequestDto {
        agent_id: args.agent_id.clone(),
    })
}

fn parse_ai_config(raw: Option<&str>) -> InfraResult<Option<Value>> {
    raw.map(|raw| {
        serde_json::from_str(raw).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("request", "invalid_json"),
                format!("ai config is not valid JSON: {error}"),
            )
            .with_metadata("field", "ai_config")
        })
    })
    .transpose()
}

fn format_record(mode: OutputMode, record: &AgentRecord) -> Result<String, CliError> {
    if mode.is_json() {
        return pretty_json(&serde_json::json!({
            "status": "ok",
            "agent": record,
        }));
    }
    let mut out = "status: ok\n".to_owned();
    for (key, value) in record_fields(record) {
        out.push_str(&format!("{key}: {value}\n"));
    }
    Ok(out)
}

fn format_page(mode: OutputMode, page: &AgentPage) -> Result<String, CliError> {
    if mode.is_json() {
        let view = AgentListView {
            status: "ok",
            agents: &page.records,
            next_page_token: page.next_page_token.as_ref().map(PageToken::as_str),
        };
        return pretty_json(&serde_json::to_value(view)?);
    }

    let mut out = format!("status: ok\ncount: {}\n", page.records.len());
    for record in &page.records {
        // The id heads each list item.
        for (index, (key, value)) in record_fields(record).iter().enumerate() {
            let bullet = if index == 0 { "- " } else { "  " };
            out.push_str(&format!("{bullet}{key}: {value}\n"));
        }
    }
    if let Some(token) = page.next_page_token.as_ref() {
        out.push_str(&format!("next_page_token: {token}\n"));
    }
    Ok(out)
}

fn record_fields(record: &AgentRecord) -> [(&'static str, String); 13] {
    [
        ("agent_id", record.agent_id.to_string()),
        ("agent_name", record.agent_name.to_string()),
        ("agent_status", record.status.to_string()),
        ("agent_version", record.agent_version.to_string()),
        ("hosted_agent_id", record.hosted_agent_id.to_string()),
        ("repository_url", record.repository_url.to_string()),
        ("branch", record.branch.to_string()),
        ("ai_provider", record.ai_provider.to_string()),
        ("knowledge_base_id", record.knowledge_base_id.to_string()),
        ("vector_store_id", record.vector_store_id.to_string()),
        ("ai_config", record.ai_config.to_string()),
        ("created_at_ms", record.created_at_ms.to_string()),
        ("updated_at_ms", record.updated_at_ms.to_string()),
    ]
}

//! Validated use-case inputs.
//!
//! Boundary DTOs are parsed into these before reaching the orchestrator, so
//! every field here already satisfies its primitive's rules. Provider payloads
//! stay opaque until the provider is resolved against runtime defaults.

use crate::page::{PageSize, PageToken};
use crate::primitives::{AgentId, AgentName, BranchName, RepositoryUrl};
use crate::provider::AiProvider;
use serde_json::Value;

/// Provision a new agent.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAgentCommand {
    /// Caller-chosen id; minted when absent.
    pub agent_id: Option<AgentId>,
    /// Repository to build the knowledge base from.
    pub repository_url: RepositoryUrl,
    /// Branch; the configured default when absent.
    pub branch: Option<BranchName>,
    /// Display name; `agent-<id8>` when absent.
    pub agent_name: Option<AgentName>,
    /// Provider; the configured default when absent.
    pub ai_provider: Option<AiProvider>,
    /// Provider payload; the provider's configured profile when absent.
    pub ai_config: Option<Value>,
}

impl CreateAgentCommand {
    /// Command with only the repository set.
    #[must_use]
    pub const fn for_repository(repository_url: RepositoryUrl) -> Self {
        Self {
            agent_id: None,
            repository_url,
            branch: None,
            agent_name: None,
            ai_provider: None,
            ai_config: None,
        }
    }
}

/// Change an existing agent; absent fields keep their stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAgentCommand {
    /// Agent to change.
    pub agent_id: AgentId,
    /// New display name.
    pub agent_name: Option<AgentName>,
    /// New repository.
    pub repository_url: Option<RepositoryUrl>,
    /// New branch.
    pub branch: Option<BranchName>,
    /// New provider.
    pub ai_provider: Option<AiProvider>,
    /// New provider payload.
    pub ai_config: Option<Value>,
}

impl UpdateAgentCommand {
    /// Command that changes nothing yet.
    #[must_use]
    pub const fn for_agent(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            agent_name: None,
            repository_url: None,
            branch: None,
            ai_provider: None,
            ai_config: None,
        }
    }
}

/// Page through agent records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListAgentsCommand {
    /// Continuation token from a previous page.
    pub page_token: Option<PageToken>,
    /// Page size.
    pub page_size: PageSize,
}

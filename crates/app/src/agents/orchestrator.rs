//! Facade bundling the agent use cases behind one handle.

use super::create::create_agent;
use super::delete::delete_agent;
use super::deps::AgentDeps;
use super::query::{get_agent, list_agents};
use super::update::update_agent;
use code_agent_domain::{
    AgentId, AgentPage, AgentRecord, CreateAgentCommand, ListAgentsCommand, UpdateAgentCommand,
};
use code_agent_shared::{RequestContext, Result};

/// Entry point for callers that do not want to thread [`AgentDeps`] around.
#[derive(Clone)]
pub struct AgentOrchestrator {
    deps: AgentDeps,
}

impl AgentOrchestrator {
    /// Wrap a dependency set.
    #[must_use]
    pub const fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }

    /// Dependencies in use.
    #[must_use]
    pub const fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    /// See [`create_agent`].
    pub async fn create(
        &self,
        ctx: &RequestContext,
        command: CreateAgentCommand,
    ) -> Result<AgentRecord> {
        create_agent(ctx, &self.deps, command).await
    }

    /// See [`get_agent`].
    pub async fn get(&self, ctx: &RequestContext, agent_id: AgentId) -> Result<AgentRecord> {
        get_agent(ctx, &self.deps, agent_id).await
    }

    /// See [`update_agent`].
    pub async fn update(
        &self,
        ctx: &RequestContext,
        command: UpdateAgentCommand,
    ) -> Result<AgentRecord> {
        update_agent(ctx, &self.deps, command).await
    }

    /// See [`delete_agent`].
    pub async fn delete(&self, ctx: &RequestContext, agent_id: AgentId) -> Result<AgentRecord> {
        delete_agent(ctx, &self.deps, agent_id).await
    }

    /// See [`list_agents`].
    pub async fn list(&self, ctx: &RequestContext, command: ListAgentsCommand) -> Result<AgentPage> {
        list_agents(ctx, &self.deps, command).await
    }
}

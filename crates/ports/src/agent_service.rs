//! Hosted agent boundary contract.

use crate::BoxFuture;
use code_agent_domain::{AgentId, AgentVersion, HostedAgentId, KnowledgeBaseId};
use code_agent_shared::{RequestContext, Result};

/// Identity of an agent as registered with the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedAgent {
    /// Identifier the service assigned to this registration.
    pub hosted_agent_id: HostedAgentId,
    /// Version assigned by the service.
    pub agent_version: AgentVersion,
}

/// Creates, rebinds and deletes hosted conversational agents.
pub trait AgentServicePort: Send + Sync {
    /// Register a new hosted agent for `agent_id`, bound to `knowledge_base_id`.
    ///
    /// Every call creates a distinct registration; existing ones are never
    /// reused or rebound.
    fn create(
        &self,
        ctx: &RequestContext,
        agent_id: AgentId,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<HostedAgent>>;

    /// Rebind a registration to another knowledge base; returns the new version.
    fn update(
        &self,
        ctx: &RequestContext,
        hosted_agent_id: HostedAgentId,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<AgentVersion>>;

    /// Delete a registration. Deleting an unknown id succeeds.
    fn delete(
        &self,
        ctx: &RequestContext,
        hosted_agent_id: HostedAgentId,
    ) -> BoxFuture<'_, Result<()>>;
}

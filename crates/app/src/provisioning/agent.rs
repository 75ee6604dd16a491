//! Hosted agent registration.

use super::knowledge_base::BuiltKnowledgeBase;
use super::steps::{ProvisioningStep, run_step};
use crate::observability::Observer;
use code_agent_domain::{AgentId, AgentVersion, HostedAgentId};
use code_agent_ports::{AgentServicePort, HostedAgent};
use code_agent_shared::{RequestContext, Result};
use std::sync::Arc;

/// Registers, rebinds and removes hosted agents for one provider.
#[derive(Clone)]
pub struct AgentBuilder {
    agents: Arc<dyn AgentServicePort>,
    observer: Observer,
}

impl AgentBuilder {
    /// Wire the builder to the hosting service.
    #[must_use]
    pub fn new(agents: Arc<dyn AgentServicePort>, observer: Observer) -> Self {
        Self { agents, observer }
    }

    /// Register a new hosted agent for `agent_id` against a freshly built
    /// knowledge base.
    pub async fn build(
        &self,
        ctx: &RequestContext,
        agent_id: &AgentId,
        knowledge_base: &BuiltKnowledgeBase,
    ) -> Result<HostedAgent> {
        run_step(ctx, &self.observer, ProvisioningStep::CreateAgent, || {
            self.agents.create(
                ctx,
                agent_id.clone(),
                knowledge_base.knowledge_base_id.clone(),
            )
        })
        .await
    }

    /// Point an existing registration at a new knowledge base.
    pub async fn rebind(
        &self,
        ctx: &RequestContext,
        hosted_agent_id: &HostedAgentId,
        knowledge_base: &BuiltKnowledgeBase,
    ) -> Result<AgentVersion> {
        run_step(ctx, &self.observer, ProvisioningStep::UpdateAgent, || {
            self.agents.update(
                ctx,
                hosted_agent_id.clone(),
                knowledge_base.knowledge_base_id.clone(),
            )
        })
        .await
    }

    /// Remove one hosted registration.
    pub async fn tear_down(
        &self,
        ctx: &RequestContext,
        hosted_agent_id: &HostedAgentId,
    ) -> Result<()> {
        run_step(ctx, &self.observer, ProvisioningStep::DeleteAgent, || {
            self.agents.delete(ctx, hosted_agent_id.clone())
        })
        .await
    }
}

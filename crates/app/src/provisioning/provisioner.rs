//! Per-provider provisioning pipelines.

use super::agent::AgentBuilder;
use super::knowledge_base::{BuiltKnowledgeBase, KnowledgeBaseBuilder};
use super::steps::{ProvisioningStep, run_step};
use crate::observability::Observer;
use code_agent_domain::{
    AgentId, AgentVersion, AiProvider, HostedAgentId, KnowledgeBaseId, VectorTableName,
};
use code_agent_ports::SourceControlClient;
use code_agent_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::path::Path;

/// How the hosted agent is bound once the knowledge base exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentBinding {
    /// Register a new hosted agent.
    Create,
    /// Rebind this existing registration.
    Rebind(HostedAgentId),
}

/// Resources produced by one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Knowledge base and its backing table.
    pub knowledge_base: BuiltKnowledgeBase,
    /// Registration serving the agent.
    pub hosted_agent_id: HostedAgentId,
    /// Version reported by the hosting service.
    pub agent_version: AgentVersion,
}

/// Knowledge base and agent builders for one provider.
#[derive(Clone)]
pub struct Provisioner {
    provider: AiProvider,
    knowledge_base: KnowledgeBaseBuilder,
    agent: AgentBuilder,
    observer: Observer,
}

impl Provisioner {
    /// Pipeline for `provider`.
    #[must_use]
    pub fn new(
        provider: AiProvider,
        knowledge_base: KnowledgeBaseBuilder,
        agent: AgentBuilder,
        observer: Observer,
    ) -> Self {
        Self {
            provider,
            knowledge_base,
            agent,
            observer,
        }
    }

    /// Provider served by this pipeline.
    #[must_use]
    pub const fn provider(&self) -> AiProvider {
        self.provider
    }

    /// Clone, build the knowledge base, then create or rebind the agent.
    ///
    /// The checkout is left in place; the caller owns its cleanup.
    pub async fn provision(
        &self,
        ctx: &RequestContext,
        checkout: &dyn SourceControlClient,
        agent_id: &AgentId,
        table: &VectorTableName,
        binding: &AgentBinding,
    ) -> Result<Provisioned> {
        run_step(ctx, &self.observer, ProvisioningStep::CloneRepository, || {
            checkout.clone_repository(ctx)
        })
        .await?;

        let knowledge_base = self.knowledge_base.build(ctx, table, checkout.path()).await?;

        let (hosted_agent_id, agent_version) = match binding {
            AgentBinding::Create => {
                let hosted = self.agent.build(ctx, agent_id, &knowledge_base).await?;
                (hosted.hosted_agent_id, hosted.agent_version)
            },
            AgentBinding::Rebind(hosted_agent_id) => {
                let version = self
                    .agent
                    .rebind(ctx, hosted_agent_id, &knowledge_base)
                    .await?;
                (hosted_agent_id.clone(), version)
            },
        };

        Ok(Provisioned {
            knowledge_base,
            hosted_agent_id,
            agent_version,
        })
    }

    /// Tear down only the knowledge base side of a generation.
    pub async fn tear_down_knowledge_base(
        &self,
        ctx: &RequestContext,
        table: &VectorTableName,
        knowledge_base_id: &KnowledgeBaseId,
        repo_path: &Path,
    ) -> Result<()> {
        self.knowledge_base
            .tear_down(ctx, table, knowledge_base_id, repo_path)
            .await
    }

    /// Tear down the agent, then its knowledge base.
    ///
    /// Both halves are attempted; the first failure is returned.
    pub async fn tear_down_all(
        &self,
        ctx: &RequestContext,
        hosted_agent_id: &HostedAgentId,
        table: &VectorTableName,
        knowledge_base_id: &KnowledgeBaseId,
        repo_path: &Path,
    ) -> Result<()> {
        let agent = self.agent.tear_down(ctx, hosted_agent_id).await;
        let knowledge_base = self
            .tear_down_knowledge_base(ctx, table, knowledge_base_id, repo_path)
            .await;
        agent.and(knowledge_base)
    }
}

/// Configured pipelines, at most one per provider.
#[derive(Clone, Default)]
pub struct ProvisionerSet {
    local: Option<Provisioner>,
    bedrock: Option<Provisioner>,
    openai: Option<Provisioner>,
}

impl ProvisionerSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provisioner` under its own provider, replacing any previous one.
    #[must_use]
    pub fn with(mut self, provisioner: Provisioner) -> Self {
        let slot = match provisioner.provider() {
            AiProvider::Local => &mut self.local,
            AiProvider::Bedrock => &mut self.bedrock,
            AiProvider::OpenAi => &mut self.openai,
        };
        *slot = Some(provisioner);
        self
    }

    /// Pipeline for `provider`; a validation error when none is configured.
    pub fn for_provider(&self, provider: AiProvider) -> Result<&Provisioner> {
        let slot = match provider {
            AiProvider::Local => self.local.as_ref(),
            AiProvider::Bedrock => self.bedrock.as_ref(),
            AiProvider::OpenAi => self.openai.as_ref(),
        };
        slot.ok_or_else(|| {
            ErrorEnvelope::expected(
                ErrorCode::new("request", "provider_not_configured"),
                format!("provider {provider} is not configured"),
            )
            .with_metadata("provider", provider.as_str())
        })
    }

    /// Providers with a configured pipeline.
    #[must_use]
    pub fn configured(&self) -> Vec<AiProvider> {
        AiProvider::ALL
            .into_iter()
            .filter(|provider| self.for_provider(*provider).is_ok())
            .collect()
    }
}

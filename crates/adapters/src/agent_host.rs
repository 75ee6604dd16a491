//! In-process agent hosting service.
//!
//! Every registration gets its own `hosted-<uuid>` id, remembered together
//! with the agent it serves. Versions are `v1`, `v2`, ... per agent and
//! advance on every registration or rebind, so a rebuild across providers
//! still yields a new version.

use crate::registry::JsonRegistry;
use code_agent_domain::{AgentId, AgentVersion, HostedAgentId, KnowledgeBaseId};
use code_agent_ports::{AgentServicePort, BoxFuture, HostedAgent};
use code_agent_shared::{ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Registration of one hosted agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedAgentEntry {
    /// Agent this registration serves.
    pub agent_id: Box<str>,
    /// Knowledge base the agent answers from.
    pub knowledge_base_id: Box<str>,
    /// Version number at the last registration or rebind.
    pub version: u64,
}

impl HostedAgentEntry {
    fn version_label(&self) -> Result<AgentVersion> {
        Ok(AgentVersion::parse(format!("v{}", self.version))?)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostedAgents {
    registrations: BTreeMap<Box<str>, HostedAgentEntry>,
    /// Last version handed out per agent id.
    versions: BTreeMap<Box<str>, u64>,
}

impl HostedAgents {
    fn next_version(&mut self, agent_id: &str) -> u64 {
        let version = self.versions.entry(agent_id.into()).or_insert(0);
        *version += 1;
        *version
    }
}

/// Hosted agents kept in a local registry.
#[derive(Debug)]
pub struct LocalAgentHost {
    registry: JsonRegistry<HostedAgents>,
}

impl LocalAgentHost {
    /// Host persisting to `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            registry: JsonRegistry::at_path(path),
        }
    }

    /// Host without persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            registry: JsonRegistry::in_memory(),
        }
    }

    /// Registration `hosted_agent_id`, if any.
    pub async fn entry(&self, hosted_agent_id: &HostedAgentId) -> Result<Option<HostedAgentEntry>> {
        self.registry
            .read(|agents| agents.registrations.get(hosted_agent_id.as_str()).cloned())
            .await
    }

    /// Live registrations serving `agent_id`.
    pub async fn registrations_for(&self, agent_id: &AgentId) -> Result<Vec<HostedAgentId>> {
        let ids: Vec<Box<str>> = self
            .registry
            .read(|agents| {
                agents
                    .registrations
                    .iter()
                    .filter(|(_, entry)| &*entry.agent_id == agent_id.as_str())
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .await?;
        ids.iter()
            .map(|id| HostedAgentId::parse(id).map_err(ErrorEnvelope::from))
            .collect()
    }
}

impl AgentServicePort for LocalAgentHost {
    fn create(
        &self,
        ctx: &RequestContext,
        agent_id: AgentId,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<HostedAgent>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_host.create")?;
            let hosted_agent_id = HostedAgentId::parse(format!(
                "hosted-{}",
                uuid::Uuid::new_v4().simple()
            ))?;
            let entry = self
                .registry
                .update(|agents| {
                    let entry = HostedAgentEntry {
                        agent_id: agent_id.as_str().into(),
                        knowledge_base_id: knowledge_base_id.as_str().into(),
                        version: agents.next_version(agent_id.as_str()),
                    };
                    agents
                        .registrations
                        .insert(hosted_agent_id.as_str().into(), entry.clone());
                    Ok(entry)
                })
                .await?;
            Ok(HostedAgent {
                agent_version: entry.version_label()?,
                hosted_agent_id,
            })
        })
    }

    fn update(
        &self,
        ctx: &RequestContext,
        hosted_agent_id: HostedAgentId,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<AgentVersion>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_host.update")?;
            let entry = self
                .registry
                .update(|agents| {
                    let owner = agents
                        .registrations
                        .get(hosted_agent_id.as_str())
                        .map(|entry| entry.agent_id.clone())
                        .ok_or_else(|| {
                            ErrorEnvelope::not_found(format!(
                                "hosted agent {hosted_agent_id} not found"
                            ))
                            .with_metadata("hosted_agent_id", hosted_agent_id.as_str())
                        })?;
                    let version = agents.next_version(&owner);
                    let entry = agents
                        .registrations
                        .get_mut(hosted_agent_id.as_str())
                        .ok_or_else(|| {
                            ErrorEnvelope::not_found(format!(
                                "hosted agent {hosted_agent_id} not found"
                            ))
                        })?;
                    entry.version = version;
                    entry.knowledge_base_id = knowledge_base_id.as_str().into();
                    Ok(entry.clone())
                })
                .await?;
            entry.version_label()
        })
    }

    fn delete(
        &self,
        ctx: &RequestContext,
        hosted_agent_id: HostedAgentId,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_host.delete")?;
            self.registry
                .update(|agents| {
                    agents.registrations.remove(hosted_agent_id.as_str());
                    Ok(())
                })
                .await
        })
    }
}

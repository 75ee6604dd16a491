//! The persisted agent record.

use crate::primitives::{
    AgentId, AgentName, AgentVersion, BranchName, CheckoutKey, HostedAgentId, KnowledgeBaseId,
    PrimitiveError, ProvisioningFingerprint, RepositoryUrl, VectorTableName, derive_checkout_key,
    derive_vector_table_name,
};
use crate::provider::AiProvider;
use crate::status::AgentStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifiers and settings tying one agent to its provisioned resources.
///
/// A record only exists once every provisioning step succeeded, so the
/// knowledge base, vector store and version fields are always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Immutable record key.
    pub agent_id: AgentId,
    /// Version assigned by the hosting service; changes on every rebuild.
    pub agent_version: AgentVersion,
    /// Registration the hosting service created for this agent.
    pub hosted_agent_id: HostedAgentId,
    /// Knowledge base bound to the agent.
    pub knowledge_base_id: KnowledgeBaseId,
    /// Vector table behind the knowledge base.
    pub vector_store_id: VectorTableName,
    /// Repository the knowledge base was built from.
    pub repository_url: RepositoryUrl,
    /// Branch the knowledge base was built from.
    pub branch: BranchName,
    /// Display name.
    pub agent_name: AgentName,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Provider hosting the agent.
    pub ai_provider: AiProvider,
    /// Provider settings, opaque at this layer.
    #[serde(default)]
    pub ai_config: Value,
    /// Creation time, epoch milliseconds.
    pub created_at_ms: u64,
    /// Last write time, epoch milliseconds.
    pub updated_at_ms: u64,
}

impl AgentRecord {
    /// Checkout key for this record's repository snapshot.
    pub fn checkout_key(&self) -> Result<CheckoutKey, PrimitiveError> {
        derive_checkout_key(&self.agent_id, &self.vector_store_id)
    }

    /// True when `other` would need fresh resources to serve this record.
    #[must_use]
    pub fn requires_reprovisioning(
        &self,
        repository_url: &RepositoryUrl,
        branch: &BranchName,
        provider: AiProvider,
    ) -> bool {
        &self.repository_url != repository_url
            || &self.branch != branch
            || self.ai_provider != provider
    }
}

/// Everything needed to derive the names of one provisioning attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningTarget {
    /// Agent being provisioned.
    pub agent_id: AgentId,
    /// Repository to clone.
    pub repository_url: RepositoryUrl,
    /// Branch to clone.
    pub branch: BranchName,
    /// Provider hosting the resources.
    pub provider: AiProvider,
    /// Per-attempt nonce mixed into every derived name.
    pub generation: Box<str>,
}

impl ProvisioningTarget {
    /// Target for a new attempt with a fresh generation nonce.
    #[must_use]
    pub fn new(
        agent_id: AgentId,
        repository_url: RepositoryUrl,
        branch: BranchName,
        provider: AiProvider,
    ) -> Self {
        Self {
            agent_id,
            repository_url,
            branch,
            provider,
            generation: uuid::Uuid::new_v4().simple().to_string().into_boxed_str(),
        }
    }

    /// Fingerprint of this attempt.
    #[must_use]
    pub fn fingerprint(&self) -> ProvisioningFingerprint {
        ProvisioningFingerprint::compute(
            &self.agent_id,
            &self.repository_url,
            &self.branch,
            self.provider,
            &self.generation,
        )
    }

    /// Vector table this target provisions into.
    pub fn vector_table(&self) -> Result<VectorTableName, PrimitiveError> {
        derive_vector_table_name(&self.fingerprint())
    }

    /// Checkout key for this target's clone.
    pub fn checkout_key(&self) -> Result<CheckoutKey, PrimitiveError> {
        derive_checkout_key(&self.agent_id, &self.vector_table()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Result<AgentRecord, PrimitiveError> {
        Ok(AgentRecord {
            agent_id: AgentId::parse("agent-1")?,
            agent_version: AgentVersion::parse("v1")?,
            hosted_agent_id: HostedAgentId::parse("hosted-1")?,
            knowledge_base_id: KnowledgeBaseId::parse("kb-1")?,
            vector_store_id: VectorTableName::parse("agent_kb_0011223344556677")?,
            repository_url: RepositoryUrl::parse("https://github.com/x/y")?,
            branch: BranchName::default(),
            agent_name: AgentName::parse("reviewer")?,
            status: AgentStatus::Ready,
            ai_provider: AiProvider::Local,
            ai_config: json!({"model": "m"}),
            created_at_ms: 10,
            updated_at_ms: 10,
        })
    }

    #[test]
    fn record_serializes_with_snake_case_fields() -> Result<(), PrimitiveError> {
        let value = serde_json::to_value(record()?).map_err(|_| PrimitiveError::InvalidAgentName {
            input_length: 0,
        })?;
        assert_eq!(value["agent_id"], "agent-1");
        assert_eq!(value["knowledge_base_id"], "kb-1");
        assert_eq!(value["hosted_agent_id"], "hosted-1");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["ai_provider"], "local");
        assert_eq!(value["created_at_ms"], 10);
        Ok(())
    }

    #[test]
    fn reprovisioning_is_driven_by_url_branch_and_provider() -> Result<(), PrimitiveError> {
        let record = record()?;
        let url = record.repository_url.clone();
        let branch = record.branch.clone();

        assert!(!record.requires_reprovisioning(&url, &branch, AiProvider::Local));
        assert!(record.requires_reprovisioning(
            &RepositoryUrl::parse("https://github.com/x/z")?,
            &branch,
            AiProvider::Local
        ));
        assert!(record.requires_reprovisioning(&url, &BranchName::parse("dev")?, AiProvider::Local));
        assert!(record.requires_reprovisioning(&url, &branch, AiProvider::Bedrock));
        Ok(())
    }

    #[test]
    fn record_finds_the_checkout_of_the_attempt_that_built_it() -> Result<(), PrimitiveError> {
        let mut record = record()?;
        let target = ProvisioningTarget::new(
            record.agent_id.clone(),
            record.repository_url.clone(),
            record.branch.clone(),
            record.ai_provider,
        );
        record.vector_store_id = target.vector_table()?;
        assert_eq!(target.checkout_key()?, record.checkout_key()?);
        Ok(())
    }

    #[test]
    fn attempts_for_the_same_source_get_distinct_names() -> Result<(), PrimitiveError> {
        let record = record()?;
        let attempt = || {
            ProvisioningTarget::new(
                record.agent_id.clone(),
                record.repository_url.clone(),
                record.branch.clone(),
                record.ai_provider,
            )
        };
        let (first, second) = (attempt(), attempt());
        assert_ne!(first.vector_table()?, second.vector_table()?);
        assert_ne!(first.checkout_key()?, second.checkout_key()?);
        Ok(())
    }
}

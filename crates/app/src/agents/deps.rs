//! Collaborators and runtime defaults shared by the agent use cases.

use crate::observability::Observer;
use crate::provisioning::ProvisionerSet;
use code_agent_domain::{AiProvider, BranchName, ProviderConfig};
use code_agent_ports::{AgentRecordStorePort, ClockPort, SourceControlPort};
use code_agent_shared::{ErrorCode, ErrorEnvelope, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Values applied when a request leaves a field out.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefaults {
    /// Provider for requests that name none.
    pub provider: AiProvider,
    /// Branch for requests that name none.
    pub branch: BranchName,
    /// Provider profiles used when a request carries no `ai_config`.
    pub provider_configs: BTreeMap<AiProvider, ProviderConfig>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            provider: AiProvider::Local,
            branch: BranchName::default(),
            provider_configs: BTreeMap::new(),
        }
    }
}

impl AgentDefaults {
    /// Register the profile for `config`'s provider.
    #[must_use]
    pub fn with_provider_config(mut self, config: ProviderConfig) -> Self {
        self.provider_configs.insert(config.provider(), config);
        self
    }

    /// Resolve the payload to persist for `provider`.
    ///
    /// An explicit payload is validated against the provider's schema; without
    /// one, the configured profile is used.
    pub fn resolve_ai_config(&self, provider: AiProvider, explicit: Option<Value>) -> Result<Value> {
        let config = match explicit {
            Some(value) => ProviderConfig::from_value(provider, value)?,
            None => self
                .provider_configs
                .get(&provider)
                .cloned()
                .ok_or_else(|| missing_profile(provider))?,
        };
        Ok(config.to_value()?)
    }
}

fn missing_profile(provider: AiProvider) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("request", "missing_ai_config"),
        format!("ai_config is required: no {provider} profile is configured"),
    )
    .with_metadata("provider", provider.as_str())
}

/// Everything the agent use cases need.
#[derive(Clone)]
pub struct AgentDeps {
    /// Record persistence.
    pub store: Arc<dyn AgentRecordStorePort>,
    /// Repository checkouts.
    pub source_control: Arc<dyn SourceControlPort>,
    /// Per-provider pipelines.
    pub provisioners: ProvisionerSet,
    /// Record timestamps.
    pub clock: Arc<dyn ClockPort>,
    /// Request defaults.
    pub defaults: AgentDefaults,
    /// Logs and metrics.
    pub observer: Observer,
}

//! Composition root: adapters and use cases wired from validated config.
//!
//! Only the `local` provider ships hosting adapters: its knowledge base
//! service and agent host keep their registries under
//! `<objectStoreRoot>/.hosting/`. Other providers are wired by embedding
//! applications through [`ProvisionerSet::with`]; requesting one here is a
//! validation error.

use crate::InfraResult;
use crate::observability::Observability;
use crate::store_factory::{build_record_store, build_vector_schema};
use code_agent_adapters::{
    GitSourceControl, LocalAgentHost, LocalKnowledgeBaseService, LocalObjectStore, SystemClock,
};
use code_agent_app::{
    AgentBuilder, AgentDefaults, AgentDeps, AgentOrchestrator, KnowledgeBaseBuilder, Observer,
    Provisioner, ProvisionerSet,
};
use code_agent_config::ValidatedAgentServiceConfig;
use code_agent_domain::AiProvider;
use code_agent_ports::{AgentServicePort, KnowledgeBaseServicePort, ObjectStorePort};
use std::path::Path;
use std::sync::Arc;

const HOSTING_DIR: &str = ".hosting";

/// Build the agent orchestrator described by `config`.
pub fn build_agent_orchestrator(
    config: &ValidatedAgentServiceConfig,
    observability: &Observability,
) -> InfraResult<AgentOrchestrator> {
    let observer = Observer::new(
        Arc::clone(&observability.logger),
        Arc::clone(&observability.telemetry),
    );
    let provisioning = &config.provisioning;
    let hosting = Path::new(provisioning.object_store_root.as_ref()).join(HOSTING_DIR);

    let schema = build_vector_schema(config)?;
    let object_store: Arc<dyn ObjectStorePort> =
        Arc::new(LocalObjectStore::new(provisioning.object_store_root.as_ref()));
    let knowledge_bases: Arc<dyn KnowledgeBaseServicePort> = Arc::new(
        LocalKnowledgeBaseService::at_path(hosting.join("knowledge_bases.json")),
    );
    let agents: Arc<dyn AgentServicePort> =
        Arc::new(LocalAgentHost::at_path(hosting.join("agents.json")));

    let provisioners = ProvisionerSet::new().with(Provisioner::new(
        AiProvider::Local,
        KnowledgeBaseBuilder::new(schema, object_store, knowledge_bases, observer.clone()),
        AgentBuilder::new(agents, observer.clone()),
        observer.clone(),
    ));

    let defaults = AgentDefaults {
        provider: config.providers.default,
        branch: config.default_branch().clone(),
        provider_configs: config.provider_profiles().clone(),
    };
    tracing::debug!(
        store = config.store.backend.as_str(),
        vector_store = provisioning.vector_store.backend.as_str(),
        providers = ?provisioners.configured(),
        "agent orchestrator wired"
    );

    Ok(AgentOrchestrator::new(AgentDeps {
        store: build_record_store(config)?,
        source_control: Arc::new(GitSourceControl::new(provisioning.workspace_root.as_ref())),
        provisioners,
        clock: Arc::new(SystemClock),
        defaults,
        observer,
    }))
}

//! Shared wiring for the agent use-case tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use code_agent_app::{
    AgentBuilder, AgentDefaults, AgentDeps, AgentOrchestrator, KnowledgeBaseBuilder, Observer,
    Provisioner, ProvisionerSet,
};
use code_agent_domain::{
    AiProvider, CreateAgentCommand, LocalProviderConfig, OpenAiProviderConfig, ProviderConfig,
    RepositoryUrl,
};
use code_agent_ports::AgentRecordStorePort;
use code_agent_shared::Result;
use code_agent_testkit::{
    FakeCollaborators, FixedClock, InMemoryAgentStore, NoopTelemetry, RecordingLogger,
};
use std::sync::Arc;

pub const REPO: &str = "https://github.com/x/y";

pub struct Harness {
    pub fakes: FakeCollaborators,
    pub logger: RecordingLogger,
    pub clock: Arc<FixedClock>,
    pub orchestrator: AgentOrchestrator,
}

impl Harness {
    /// Local provider only.
    pub fn local() -> Self {
        Self::with_providers(&[AiProvider::Local])
    }

    /// Pipelines for `providers`, all backed by the same fakes.
    pub fn with_providers(providers: &[AiProvider]) -> Self {
        let fakes = FakeCollaborators::new();
        let store = Arc::new(fakes.store.clone());
        Self::assemble(fakes, providers, store)
    }

    /// Local provider with records kept in `wrap(fakes.store)`.
    pub fn with_store(
        wrap: impl FnOnce(InMemoryAgentStore) -> Arc<dyn AgentRecordStorePort>,
    ) -> Self {
        let fakes = FakeCollaborators::new();
        let store = wrap(fakes.store.clone());
        Self::assemble(fakes, &[AiProvider::Local], store)
    }

    fn assemble(
        fakes: FakeCollaborators,
        providers: &[AiProvider],
        store: Arc<dyn AgentRecordStorePort>,
    ) -> Self {
        let logger = RecordingLogger::new();
        let clock = Arc::new(FixedClock::default());
        let observer = Observer::new(Arc::new(logger.clone()), Arc::new(NoopTelemetry));

        let mut provisioners = ProvisionerSet::new();
        for provider in providers {
            provisioners = provisioners.with(Provisioner::new(
                *provider,
                KnowledgeBaseBuilder::new(
                    Arc::new(fakes.schema.clone()),
                    Arc::new(fakes.object_store.clone()),
                    Arc::new(fakes.knowledge_bases.clone()),
                    observer.clone(),
                ),
                AgentBuilder::new(Arc::new(fakes.agents.clone()), observer.clone()),
                observer.clone(),
            ));
        }

        let defaults = AgentDefaults::default()
            .with_provider_config(ProviderConfig::Local(LocalProviderConfig {
                ollama_url: "http://localhost:11434".into(),
                model: "codellama".into(),
                chroma_url: None,
                embedding_model: None,
                temperature: None,
                max_tokens: None,
            }))
            .with_provider_config(ProviderConfig::OpenAi(OpenAiProviderConfig {
                model: "gpt-4o".into(),
                embedding_model: None,
                base_url: None,
                temperature: Some(0.2),
                max_tokens: None,
            }));

        let deps = AgentDeps {
            store,
            source_control: Arc::new(fakes.source_control.clone()),
            provisioners,
            clock: clock.clone(),
            defaults,
            observer,
        };

        Self {
            fakes,
            logger,
            clock,
            orchestrator: AgentOrchestrator::new(deps),
        }
    }
}

pub fn create_command() -> Result<CreateAgentCommand> {
    Ok(CreateAgentCommand::for_repository(RepositoryUrl::parse(REPO)?))
}

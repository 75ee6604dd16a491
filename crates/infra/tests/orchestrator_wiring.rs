//! The composition root wired against real local adapters.

use code_agent_adapters::MemoryLogSink;
use code_agent_domain::{
    AgentId, AgentName, AgentRecord, AgentStatus, AgentVersion, AiProvider, BranchName,
    HostedAgentId, KnowledgeBaseId, ListAgentsCommand, RepositoryUrl, VectorTableName,
};
use code_agent_infra::{
    build_agent_orchestrator, build_observability_with_sink, build_record_store,
    load_effective_config,
};
use code_agent_shared::{ErrorCategory, RequestContext, Result};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

fn overrides(root: &Path) -> String {
    let path = |name: &str| root.join(name).to_string_lossy().into_owned();
    json!({
        "store": { "backend": "document", "path": path("records"), "table": "agents" },
        "provisioning": {
            "workspaceRoot": path("workspace"),
            "objectStoreRoot": path("objects"),
            "vectorStore": { "backend": "sqlite", "path": path("vectors.db") }
        },
        "observability": { "logLevel": "debug" }
    })
    .to_string()
}

fn seeded_record() -> Result<AgentRecord> {
    Ok(AgentRecord {
        agent_id: AgentId::parse("reviewer-01")?,
        agent_version: AgentVersion::parse("v1")?,
        hosted_agent_id: HostedAgentId::parse("hosted-seeded")?,
        knowledge_base_id: KnowledgeBaseId::parse("kb-seeded")?,
        vector_store_id: VectorTableName::parse("agent_kb_5eed")?,
        repository_url: RepositoryUrl::parse("https://github.com/acme/widgets")?,
        branch: BranchName::default(),
        agent_name: AgentName::parse("Widget reviewer")?,
        status: AgentStatus::Ready,
        ai_provider: AiProvider::Local,
        ai_config: Value::Null,
        created_at_ms: 1_700_000_000_000,
        updated_at_ms: 1_700_000_000_000,
    })
}

#[tokio::test]
async fn wired_orchestrator_reads_and_deletes_through_local_adapters() -> Result<()> {
    let root = std::env::temp_dir().join(format!("code-agent-infra-{}", uuid::Uuid::new_v4()));
    let config = load_effective_config(&BTreeMap::new(), None, Some(&overrides(&root)))?;
    let sink = Arc::new(MemoryLogSink::new());
    let observability = build_observability_with_sink(&config, sink.clone());
    let orchestrator = build_agent_orchestrator(&config, &observability)?;
    let ctx = RequestContext::new_request();

    let empty = orchestrator.list(&ctx, ListAgentsCommand::default()).await?;
    assert!(empty.records.is_empty());

    let record = seeded_record()?;
    build_record_store(&config)?
        .create(&ctx, record.clone())
        .await?;

    let fetched = orchestrator.get(&ctx, record.agent_id.clone()).await?;
    assert_eq!(fetched, record);

    let deleted = orchestrator.delete(&ctx, record.agent_id.clone()).await?;
    assert_eq!(deleted.status, AgentStatus::Deleted);

    let missing = orchestrator.get(&ctx, record.agent_id.clone()).await.err();
    assert_eq!(missing.map(|e| e.category()), Some(ErrorCategory::NotFound));

    let events: Vec<String> = sink
        .take_json()
        .iter()
        .filter_map(|line| line["event"].as_str().map(str::to_owned))
        .collect();
    assert!(events.iter().any(|event| event == "agents.deleteAgent.completed"));
    assert!(events.iter().any(|event| event == "agents.getAgent.failed"));
    assert!(!events.iter().any(|event| event == "agents.deleteAgent.teardownFailed"));
    assert!(root.join("records/agents.json").is_file());
    Ok(())
}

#[tokio::test]
async fn unknown_agents_are_not_found_without_side_effects() -> Result<()> {
    let root = std::env::temp_dir().join(format!("code-agent-infra-{}", uuid::Uuid::new_v4()));
    let config = load_effective_config(&BTreeMap::new(), None, Some(&overrides(&root)))?;
    let observability = build_observability_with_sink(&config, Arc::new(MemoryLogSink::new()));
    let orchestrator = build_agent_orchestrator(&config, &observability)?;

    let error = orchestrator
        .delete(&RequestContext::new_request(), AgentId::parse("ghost")?)
        .await
        .err();
    assert_eq!(error.map(|e| e.category()), Some(ErrorCategory::NotFound));
    assert!(!root.join("objects/.hosting").exists());
    Ok(())
}

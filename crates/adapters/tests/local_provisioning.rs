//! The local hosting adapters driven through their ports, the way a
//! provisioner uses them.

use code_agent_adapters::{
    LocalAgentHost, LocalKnowledgeBaseService, LocalObjectStore, SqliteVectorSchema,
};
use code_agent_domain::{AgentId, VectorTableName};
use code_agent_ports::{
    AgentServicePort, KnowledgeBaseServicePort, ObjectStorePort, VectorStoreSchemaPort,
};
use code_agent_shared::{RequestContext, Result};
use std::path::PathBuf;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("code-agent-local-{name}-{}", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn build_teardown_and_rebuild_leave_no_residue() -> Result<()> {
    let state = scratch("state");
    let checkout = scratch("checkout");
    tokio::fs::create_dir_all(checkout.join("src")).await?;
    tokio::fs::write(checkout.join("src/lib.rs"), "pub fn answer() -> u8 { 42 }").await?;

    let schema = SqliteVectorSchema::new(state.join("vectors.db"));
    let objects = LocalObjectStore::new(state.join("objects"));
    let knowledge_bases = LocalKnowledgeBaseService::at_path(state.join("knowledge_bases.json"));
    let host = LocalAgentHost::at_path(state.join("agents.json"));

    let ctx = RequestContext::new_request();
    let table = VectorTableName::parse("agent_kb_feedc0de")?;
    let agent = AgentId::parse("reviewer-01")?;
    let prefix: Box<str> = checkout.to_string_lossy().into();

    schema.ensure_schema(&ctx, table.clone()).await?;
    objects
        .upload_directory(&ctx, checkout.clone(), prefix.clone())
        .await?;
    let kb = knowledge_bases.create(&ctx, table.clone()).await?;
    let ds = knowledge_bases.create_data_source(&ctx, kb.clone()).await?;
    let hosted = host.create(&ctx, agent.clone(), kb.clone()).await?;
    assert_eq!(hosted.agent_version.as_str(), "v1");
    assert!(schema.table_exists(&table).await?);
    assert!(objects.prefix_path(&prefix)?.join("src/lib.rs").is_file());

    // Teardown in reverse order.
    host.delete(&ctx, hosted.hosted_agent_id.clone()).await?;
    knowledge_bases
        .delete_data_source(&ctx, kb.clone(), ds)
        .await?;
    knowledge_bases.delete(&ctx, kb.clone()).await?;
    objects.delete_directory(&ctx, prefix.clone()).await?;
    schema.drop_schema(&ctx, table.clone()).await?;

    assert!(!schema.table_exists(&table).await?);
    assert!(!objects.prefix_path(&prefix)?.exists());
    assert!(knowledge_bases.is_empty().await?);
    assert_eq!(host.entry(&hosted.hosted_agent_id).await?, None);

    // A second generation reuses the same names without conflict.
    schema.ensure_schema(&ctx, table.clone()).await?;
    let rebuilt = knowledge_bases.create(&ctx, table.clone()).await?;
    assert_ne!(rebuilt, kb);
    let rehosted = host.create(&ctx, agent.clone(), rebuilt).await?;
    assert_ne!(rehosted.hosted_agent_id, hosted.hosted_agent_id);
    assert_eq!(rehosted.agent_version.as_str(), "v2");
    assert_eq!(host.registrations_for(&agent).await?, vec![rehosted.hosted_agent_id]);
    Ok(())
}

#[tokio::test]
async fn registries_survive_a_restart() -> Result<()> {
    let state = scratch("state");
    let ctx = RequestContext::new_request();
    let table = VectorTableName::parse("agent_kb_feedc0de")?;

    let kb = LocalKnowledgeBaseService::at_path(state.join("knowledge_bases.json"))
        .create(&ctx, table.clone())
        .await?;

    let reopened = LocalKnowledgeBaseService::at_path(state.join("knowledge_bases.json"));
    let entry = reopened.entry(&kb).await?;
    assert_eq!(
        entry.map(|entry| entry.source_table),
        Some(table.as_str().into())
    );
    Ok(())
}

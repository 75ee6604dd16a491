//! One behavioural suite, run against every local record store backend.

use code_agent_adapters::{DocumentAgentStore, SqliteAgentStore};
use code_agent_domain::{
    AgentId, AgentName, AgentRecord, AgentStatus, AgentVersion, AiProvider, BranchName,
    HostedAgentId, KnowledgeBaseId, ListAgentsQuery, PageSize, RepositoryUrl, VectorTableName,
};
use code_agent_ports::AgentRecordStorePort;
use code_agent_shared::{ErrorCategory, ErrorEnvelope, RequestContext, Result};
use serde_json::json;
use std::path::PathBuf;

fn scratch() -> PathBuf {
    std::env::temp_dir().join(format!("code-agent-contract-{}", uuid::Uuid::new_v4()))
}

fn record(id: &str, created_at_ms: u64) -> Result<AgentRecord> {
    Ok(AgentRecord {
        agent_id: AgentId::parse(id)?,
        agent_version: AgentVersion::parse("v1")?,
        hosted_agent_id: HostedAgentId::parse("hosted-1")?,
        knowledge_base_id: KnowledgeBaseId::parse("kb-1")?,
        vector_store_id: VectorTableName::parse("agent_kb_0123456789abcdef")?,
        repository_url: RepositoryUrl::parse("https://github.com/acme/widgets")?,
        branch: BranchName::default(),
        agent_name: AgentName::parse("Widget reviewer")?,
        status: AgentStatus::Ready,
        ai_provider: AiProvider::Local,
        ai_config: json!({ "modelId": "local-small", "temperature": 0.2 }),
        created_at_ms,
        updated_at_ms: created_at_ms,
    })
}

fn page_of(size: u32) -> Result<ListAgentsQuery> {
    Ok(ListAgentsQuery {
        cursor: None,
        limit: PageSize::parse(Some(size)).map_err(ErrorEnvelope::from)?,
    })
}

fn category<T>(outcome: Result<T>) -> Option<ErrorCategory> {
    outcome.err().map(|error| error.category())
}

async fn conditions_hold(store: &dyn AgentRecordStorePort) -> Result<()> {
    let ctx = RequestContext::new_request();
    let original = record("reviewer-01", 100)?;

    store.create(&ctx, original.clone()).await?;
    assert_eq!(store.get(&ctx, original.agent_id.clone()).await?, original);
    assert_eq!(
        category(store.create(&ctx, original.clone()).await),
        Some(ErrorCategory::AlreadyExists)
    );

    let mut changed = original.clone();
    changed.agent_version = AgentVersion::parse("v2")?;
    changed.branch = BranchName::parse("release/2.4")?;
    changed.updated_at_ms = 250;
    store.update(&ctx, changed.clone()).await?;
    assert_eq!(store.get(&ctx, original.agent_id.clone()).await?, changed);

    let ghost = record("ghost", 1)?;
    assert_eq!(
        category(store.update(&ctx, ghost.clone()).await),
        Some(ErrorCategory::NotFound)
    );
    assert_eq!(
        category(store.get(&ctx, ghost.agent_id.clone()).await),
        Some(ErrorCategory::NotFound)
    );

    store.delete(&ctx, original.agent_id.clone()).await?;
    assert_eq!(
        category(store.delete(&ctx, original.agent_id.clone()).await),
        Some(ErrorCategory::NotFound)
    );
    assert_eq!(
        category(store.get(&ctx, original.agent_id).await),
        Some(ErrorCategory::NotFound)
    );
    Ok(())
}

async fn pages_follow_listing_order(store: &dyn AgentRecordStorePort) -> Result<()> {
    let ctx = RequestContext::new_request();
    for (id, at) in [("a", 10), ("B", 30), ("c", 20), ("b", 30), ("d", 5)] {
        store.create(&ctx, record(id, at)?).await?;
    }

    let mut seen = Vec::new();
    let mut query = page_of(2)?;
    let mut pages = 0;
    loop {
        let page = store.list(&ctx, query.clone()).await?;
        pages += 1;
        assert!(page.records.len() <= 2);
        seen.extend(page.records.iter().map(|r| r.agent_id.to_string()));
        let Some(token) = page.next_page_token else {
            break;
        };
        query.cursor = Some(token.decode().map_err(ErrorEnvelope::from)?);
    }

    // Same timestamp: ids descend bytewise, so lowercase sorts before uppercase.
    assert_eq!(seen, ["b", "B", "c", "a", "d"]);
    assert_eq!(pages, 3);

    let everything = store.list(&ctx, page_of(100)?).await?;
    assert_eq!(everything.records.len(), 5);
    assert_eq!(everything.next_page_token, None);
    Ok(())
}

async fn exact_page_has_no_token(store: &dyn AgentRecordStorePort) -> Result<()> {
    let ctx = RequestContext::new_request();
    for (id, at) in [("a", 1), ("b", 2)] {
        store.create(&ctx, record(id, at)?).await?;
    }
    let page = store.list(&ctx, page_of(2)?).await?;
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.next_page_token, None);
    Ok(())
}

#[tokio::test]
async fn in_memory_document_store_honours_the_contract() -> Result<()> {
    conditions_hold(&DocumentAgentStore::in_memory("agents")?).await?;
    pages_follow_listing_order(&DocumentAgentStore::in_memory("agents")?).await?;
    exact_page_has_no_token(&DocumentAgentStore::in_memory("agents")?).await
}

#[tokio::test]
async fn file_document_store_honours_the_contract() -> Result<()> {
    conditions_hold(&DocumentAgentStore::at_directory(scratch(), "agents")?).await?;
    pages_follow_listing_order(&DocumentAgentStore::at_directory(scratch(), "agents")?).await?;
    exact_page_has_no_token(&DocumentAgentStore::at_directory(scratch(), "agents")?).await
}

#[tokio::test]
async fn sqlite_store_honours_the_contract() -> Result<()> {
    conditions_hold(&SqliteAgentStore::in_memory("agents")?).await?;
    pages_follow_listing_order(&SqliteAgentStore::open(scratch().join("a.db"), "agents")?).await?;
    exact_page_has_no_token(&SqliteAgentStore::in_memory("agent_records")?).await
}

#[tokio::test]
async fn file_document_store_is_shared_between_instances() -> Result<()> {
    let dir = scratch();
    let ctx = RequestContext::new_request();
    let writer = DocumentAgentStore::at_directory(&dir, "agents")?;
    writer.create(&ctx, record("reviewer-01", 7)?).await?;

    let reader = DocumentAgentStore::at_directory(&dir, "agents")?;
    let stored = reader.get(&ctx, AgentId::parse("reviewer-01")?).await?;
    assert_eq!(stored.ai_config["modelId"], "local-small");
    assert_eq!(reader.document_path(), Some(dir.join("agents.json").as_path()));
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_of_one_id_admit_exactly_one() -> Result<()> {
    let dir = scratch();
    let first = DocumentAgentStore::at_directory(&dir, "agents")?;
    let second = DocumentAgentStore::at_directory(&dir, "agents")?;
    let ctx = RequestContext::new_request();

    let (left, right) = tokio::join!(
        first.create(&ctx, record("race", 1)?),
        second.create(&ctx, record("race", 2)?)
    );
    let outcomes = [category(left), category(right)];
    assert!(outcomes.contains(&None));
    assert!(outcomes.contains(&Some(ErrorCategory::AlreadyExists)));
    Ok(())
}

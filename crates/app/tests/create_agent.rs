//! Create-agent orchestration scenarios.

mod common;

use code_agent_domain::{
    AgentId, AgentPage, AgentRecord, AgentStatus, AiProvider, ListAgentsQuery,
};
use code_agent_ports::{AgentRecordStorePort, BoxFuture};
use code_agent_shared::{ErrorCategory, RequestContext, Result};
use code_agent_testkit::errors::{persistence_failure, unavailable};
use code_agent_testkit::{InMemoryAgentStore, ops};
use common::{Harness, create_command};
use std::sync::Arc;

/// Record store that yields after every lookup, so two creates racing for
/// one id both see it free before either persists.
struct YieldingStore(InMemoryAgentStore);

impl AgentRecordStorePort for YieldingStore {
    fn create(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        self.0.create(ctx, record)
    }

    fn get(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<AgentRecord>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let found = self.0.get(&ctx, agent_id).await;
            tokio::task::yield_now().await;
            found
        })
    }

    fn update(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        self.0.update(ctx, record)
    }

    fn delete(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<()>> {
        self.0.delete(ctx, agent_id)
    }

    fn list(
        &self,
        ctx: &RequestContext,
        query: ListAgentsQuery,
    ) -> BoxFuture<'_, Result<AgentPage>> {
        self.0.list(ctx, query)
    }
}

#[tokio::test]
async fn create_with_healthy_collaborators_returns_a_ready_record() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();

    let record = harness.orchestrator.create(&ctx, create_command()?).await?;

    assert_eq!(record.status, AgentStatus::Ready);
    assert_eq!(record.ai_provider, AiProvider::Local);
    assert!(!record.agent_id.as_str().is_empty());
    assert!(!record.knowledge_base_id.as_str().is_empty());
    assert!(record.vector_store_id.as_str().starts_with("agent_kb_"));
    assert_eq!(record.agent_version.as_str(), "v1");
    assert_eq!(record.branch.as_str(), "main");
    assert_eq!(record.created_at_ms, 1_700_000_000_000);
    assert_eq!(record.updated_at_ms, record.created_at_ms);
    assert_eq!(record.ai_config["model"], "codellama");

    let stored = harness.fakes.store.peek(&record.agent_id).await;
    assert_eq!(stored.as_ref(), Some(&record));
    assert_eq!(
        harness.fakes.journal.ops(),
        [
            ops::CLONE,
            ops::ENSURE_SCHEMA,
            ops::KB_CREATE,
            ops::UPLOAD,
            ops::DS_CREATE,
            ops::AGENT_CREATE,
            ops::CLEANUP,
            ops::STORE_CREATE,
        ]
    );
    assert!(harness.logger.contains("agents.createAgent.completed"));
    Ok(())
}

#[tokio::test]
async fn schema_failure_stops_before_the_knowledge_base_is_created() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::ENSURE_SCHEMA, unavailable("store unavailable"));

    let error = harness
        .orchestrator
        .create(&ctx, create_command()?)
        .await
        .err()
        .ok_or_else(|| unavailable("create unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::Provisioning);
    assert!(error.message.contains("store unavailable"));
    assert_eq!(
        error.metadata.get("step").map(String::as_str),
        Some("ensure_schema")
    );
    assert_eq!(harness.fakes.journal.count(ops::KB_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::STORE_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::CLEANUP), 1);
    assert!(harness.fakes.store.snapshot().await.is_empty());
    assert!(harness.logger.contains("agents.createAgent.provisioningFailed"));
    Ok(())
}

#[tokio::test]
async fn failed_persist_tears_down_once_and_returns_the_original_error() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::STORE_CREATE, persistence_failure("write quota exceeded"));

    let error = harness
        .orchestrator
        .create(&ctx, create_command()?)
        .await
        .err()
        .ok_or_else(|| unavailable("create unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::Persistence);
    assert!(error.message.contains("write quota exceeded"));
    assert_eq!(harness.fakes.journal.count(ops::AGENT_DELETE), 1);
    assert_eq!(harness.fakes.journal.count(ops::KB_DELETE), 1);
    assert_eq!(harness.fakes.journal.count(ops::DROP_SCHEMA), 1);
    assert_eq!(harness.fakes.journal.count(ops::DELETE_SNAPSHOT), 1);
    assert!(harness.fakes.schema.tables().is_empty());
    assert!(harness.fakes.agents.agents().is_empty());
    assert!(harness.fakes.object_store.prefixes().is_empty());
    assert!(harness.logger.contains("agents.createAgent.compensated"));
    Ok(())
}

#[tokio::test]
async fn failed_compensation_is_logged_and_the_persist_error_wins() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::STORE_CREATE, persistence_failure("write quota exceeded"));
    harness
        .fakes
        .journal
        .fail(ops::AGENT_DELETE, unavailable("agent host unavailable"));

    let error = harness
        .orchestrator
        .create(&ctx, create_command()?)
        .await
        .err()
        .ok_or_else(|| unavailable("create unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::Persistence);
    // The knowledge base half still runs after the agent half failed.
    assert_eq!(harness.fakes.journal.count(ops::DROP_SCHEMA), 1);

    let event = harness
        .logger
        .find("agents.createAgent.compensationFailed")
        .ok_or_else(|| unavailable("missing compensation event"))?;
    let code = event
        .error
        .as_ref()
        .and_then(|error| error.get("code"))
        .and_then(|code| code.get("namespace"))
        .and_then(serde_json::Value::as_str);
    assert_eq!(code, Some("provisioning"));
    Ok(())
}

#[tokio::test]
async fn cancellation_during_persist_still_compensates() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::STORE_CREATE, code_agent_testkit::errors::cancelled_error());

    let error = harness
        .orchestrator
        .create(&ctx, create_command()?)
        .await
        .err()
        .ok_or_else(|| unavailable("create unexpectedly succeeded"))?;

    assert!(error.is_cancelled());
    assert_eq!(harness.fakes.journal.count(ops::AGENT_DELETE), 1);
    assert_eq!(harness.fakes.journal.count(ops::DROP_SCHEMA), 1);
    assert!(harness.logger.contains("agents.createAgent.aborted"));
    Ok(())
}

#[tokio::test]
async fn duplicate_id_is_rejected_before_any_provisioning() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    let mut command = create_command()?;
    command.agent_id = Some(AgentId::parse("reviewer-1")?);

    harness.orchestrator.create(&ctx, command.clone()).await?;
    let builder_calls = harness.fakes.journal.builder_calls();

    let error = harness
        .orchestrator
        .create(&ctx, command)
        .await
        .err()
        .ok_or_else(|| unavailable("duplicate create unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::AlreadyExists);
    assert_eq!(harness.fakes.journal.builder_calls(), builder_calls);
    assert_eq!(harness.fakes.journal.count(ops::STORE_CREATE), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_request_touches_no_collaborator() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    ctx.cancel();

    let error = harness
        .orchestrator
        .create(&ctx, create_command()?)
        .await
        .err()
        .ok_or_else(|| unavailable("cancelled create unexpectedly succeeded"))?;

    assert!(error.is_cancelled());
    assert!(harness.fakes.journal.is_empty());
    Ok(())
}

#[tokio::test]
async fn unconfigured_provider_is_a_validation_error() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    let mut command = create_command()?;
    command.ai_provider = Some(AiProvider::Bedrock);

    let error = harness
        .orchestrator
        .create(&ctx, command)
        .await
        .err()
        .ok_or_else(|| unavailable("create unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::Validation);
    assert!(harness.fakes.journal.is_empty());
    Ok(())
}

#[tokio::test]
async fn default_name_uses_the_id_prefix() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    let mut command = create_command()?;
    command.agent_id = Some(AgentId::parse("abcdef123456")?);

    let record = harness.orchestrator.create(&ctx, command).await?;

    assert_eq!(record.agent_name.as_str(), "agent-abcdef12");
    Ok(())
}

#[tokio::test]
async fn racing_creates_for_one_id_leave_the_winner_intact() -> Result<()> {
    let harness = Harness::with_store(|store| Arc::new(YieldingStore(store)));
    let ctx = RequestContext::new_request();
    let mut command = create_command()?;
    command.agent_id = Some(AgentId::parse("dup-1")?);

    let (first, second) = tokio::join!(
        harness.orchestrator.create(&ctx, command.clone()),
        harness.orchestrator.create(&ctx, command),
    );
    let (winner, loser) = match (first, second) {
        (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
        _ => return Err(unavailable("expected exactly one create to win")),
    };

    assert_eq!(loser.category(), ErrorCategory::AlreadyExists);
    // Both attempts provisioned; only the loser's resources were removed.
    assert_eq!(harness.fakes.journal.count(ops::AGENT_CREATE), 2);
    assert_eq!(harness.fakes.journal.count(ops::AGENT_DELETE), 1);
    assert_eq!(
        harness.fakes.store.peek(&winner.agent_id).await.as_ref(),
        Some(&winner)
    );
    assert_eq!(
        harness.fakes.agents.registrations(),
        vec![winner.hosted_agent_id.clone()]
    );
    assert_eq!(
        harness.fakes.agents.knowledge_base_of(&winner.hosted_agent_id),
        Some(winner.knowledge_base_id.clone())
    );
    assert_eq!(
        harness.fakes.schema.tables(),
        vec![winner.vector_store_id.clone()]
    );
    assert_eq!(
        harness.fakes.knowledge_bases.knowledge_bases(),
        vec![winner.knowledge_base_id.as_str().to_owned()]
    );
    let checkout = winner.checkout_key()?;
    let prefixes = harness.fakes.object_store.prefixes();
    assert_eq!(prefixes.len(), 1);
    assert!(prefixes[0].ends_with(checkout.as_str()));
    Ok(())
}

#[tokio::test]
async fn knowledge_base_failure_stops_before_ingestion_and_hosting() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::KB_CREATE, unavailable("knowledge base service unavailable"));

    let error = harness
        .orchestrator
        .create(&ctx, create_command()?)
        .await
        .err()
        .ok_or_else(|| unavailable("create unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::Provisioning);
    assert_eq!(harness.fakes.journal.count(ops::DS_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::AGENT_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::STORE_CREATE), 0);
    assert!(harness.fakes.store.snapshot().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn upload_failure_stops_before_ingestion_and_hosting() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::UPLOAD, unavailable("bucket unavailable"));

    let error = harness
        .orchestrator
        .create(&ctx, create_command()?)
        .await
        .err()
        .ok_or_else(|| unavailable("create unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::Provisioning);
    assert_eq!(
        error.metadata.get("step").map(String::as_str),
        Some("upload_snapshot")
    );
    assert_eq!(harness.fakes.journal.count(ops::DS_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::AGENT_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::STORE_CREATE), 0);
    assert!(harness.fakes.store.snapshot().await.is_empty());
    Ok(())
}

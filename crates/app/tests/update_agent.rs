//! Update-agent orchestration scenarios.

mod common;

use code_agent_domain::{
    AgentName, AgentRecord, AgentStatus, AiProvider, BranchName, RepositoryUrl,
    UpdateAgentCommand,
};
use code_agent_shared::{ErrorCategory, RequestContext, Result};
use code_agent_testkit::errors::unavailable;
use code_agent_testkit::ops;
use common::{Harness, create_command};
use serde_json::json;

async fn seeded(harness: &Harness) -> Result<AgentRecord> {
    let ctx = RequestContext::new_request();
    let record = harness.orchestrator.create(&ctx, create_command()?).await?;
    harness.fakes.journal.reset_calls();
    harness.clock.advance(5_000);
    Ok(record)
}

#[tokio::test]
async fn name_only_update_makes_no_builder_calls() -> Result<()> {
    let harness = Harness::local();
    let original = seeded(&harness).await?;
    let ctx = RequestContext::new_request();

    let mut command = UpdateAgentCommand::for_agent(original.agent_id.clone());
    command.agent_name = Some(AgentName::parse("renamed")?);
    let updated = harness.orchestrator.update(&ctx, command).await?;

    assert_eq!(harness.fakes.journal.builder_calls(), 0);
    assert_eq!(updated.agent_name.as_str(), "renamed");
    assert_eq!(updated.knowledge_base_id, original.knowledge_base_id);
    assert_eq!(updated.agent_version, original.agent_version);
    assert_eq!(updated.updated_at_ms, original.created_at_ms + 5_000);
    assert_eq!(
        harness.fakes.store.peek(&original.agent_id).await.as_ref(),
        Some(&updated)
    );
    Ok(())
}

#[tokio::test]
async fn config_only_update_is_validated_without_rebuilding() -> Result<()> {
    let harness = Harness::local();
    let original = seeded(&harness).await?;
    let ctx = RequestContext::new_request();

    let mut command = UpdateAgentCommand::for_agent(original.agent_id.clone());
    command.ai_config = Some(json!({"ollama_url": "http://gpu:11434", "model": "qwen"}));
    let updated = harness.orchestrator.update(&ctx, command).await?;
    assert_eq!(updated.ai_config["model"], "qwen");

    let mut invalid = UpdateAgentCommand::for_agent(original.agent_id);
    invalid.ai_config = Some(json!({"model": "qwen", "api_key": "nope"}));
    let error = harness.orchestrator.update(&ctx, invalid).await.err();

    assert_eq!(error.map(|e| e.category()), Some(ErrorCategory::Validation));
    assert_eq!(harness.fakes.journal.builder_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn repository_change_rebuilds_before_persisting() -> Result<()> {
    let harness = Harness::local();
    let original = seeded(&harness).await?;
    let ctx = RequestContext::new_request();

    let mut command = UpdateAgentCommand::for_agent(original.agent_id.clone());
    command.repository_url = Some(RepositoryUrl::parse("https://github.com/x/z")?);
    let updated = harness.orchestrator.update(&ctx, command).await?;

    let ops_seen = harness.fakes.journal.ops();
    let position = |op: &str| ops_seen.iter().position(|seen| *seen == op);
    assert!(position(ops::AGENT_UPDATE) < position(ops::STORE_UPDATE));
    assert!(position(ops::KB_CREATE) < position(ops::STORE_UPDATE));
    // Old generation is retired only after the new record is stored.
    assert!(position(ops::STORE_UPDATE) < position(ops::KB_DELETE));
    assert_eq!(harness.fakes.journal.count(ops::AGENT_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::AGENT_DELETE), 0);

    assert_eq!(updated.status, AgentStatus::Ready);
    assert_eq!(updated.agent_version.as_str(), "v2");
    assert_ne!(updated.knowledge_base_id, original.knowledge_base_id);
    assert_ne!(updated.vector_store_id, original.vector_store_id);
    assert_eq!(updated.created_at_ms, original.created_at_ms);
    assert_eq!(
        harness.fakes.schema.tables(),
        vec![updated.vector_store_id.clone()]
    );
    assert_eq!(
        harness.fakes.knowledge_bases.knowledge_bases(),
        vec![updated.knowledge_base_id.as_str().to_owned()]
    );
    Ok(())
}

#[tokio::test]
async fn failed_rebuild_leaves_the_record_untouched() -> Result<()> {
    let harness = Harness::local();
    let original = seeded(&harness).await?;
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::UPLOAD, unavailable("bucket unavailable"));

    let mut command = UpdateAgentCommand::for_agent(original.agent_id.clone());
    command.branch = Some(BranchName::parse("develop")?);
    let error = harness
        .orchestrator
        .update(&ctx, command)
        .await
        .err()
        .ok_or_else(|| unavailable("update unexpectedly succeeded"))?;

    assert_eq!(error.category(), ErrorCategory::Provisioning);
    assert_eq!(
        error.metadata.get("step").map(String::as_str),
        Some("upload_snapshot")
    );
    assert_eq!(harness.fakes.journal.count(ops::DS_CREATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::STORE_UPDATE), 0);
    assert_eq!(
        harness.fakes.store.peek(&original.agent_id).await.as_ref(),
        Some(&original)
    );
    assert!(harness.logger.contains("agents.updateAgent.rebuildFailed"));
    Ok(())
}

#[tokio::test]
async fn provider_change_recreates_the_agent_and_retires_the_old_one() -> Result<()> {
    let harness = Harness::with_providers(&[AiProvider::Local, AiProvider::OpenAi]);
    let original = seeded(&harness).await?;
    let ctx = RequestContext::new_request();

    let mut command = UpdateAgentCommand::for_agent(original.agent_id.clone());
    command.ai_provider = Some(AiProvider::OpenAi);
    let updated = harness.orchestrator.update(&ctx, command).await?;

    assert_eq!(updated.ai_provider, AiProvider::OpenAi);
    assert_eq!(updated.ai_config["model"], "gpt-4o");
    assert_eq!(harness.fakes.journal.count(ops::AGENT_CREATE), 1);
    assert_eq!(harness.fakes.journal.count(ops::AGENT_UPDATE), 0);
    assert_eq!(harness.fakes.journal.count(ops::AGENT_DELETE), 1);
    assert_eq!(
        harness.fakes.journal.targets(ops::DROP_SCHEMA),
        vec![original.vector_store_id.as_str().to_owned()]
    );
    assert_ne!(updated.hosted_agent_id, original.hosted_agent_id);
    assert_eq!(
        harness.fakes.journal.targets(ops::AGENT_DELETE),
        vec![original.hosted_agent_id.to_string()]
    );
    // The replacement is still registered after the old one is retired.
    assert_eq!(
        harness.fakes.agents.registrations(),
        vec![updated.hosted_agent_id.clone()]
    );
    assert_eq!(
        harness.fakes.agents.knowledge_base_of(&updated.hosted_agent_id),
        Some(updated.knowledge_base_id.clone())
    );
    assert_eq!(
        harness.fakes.store.peek(&original.agent_id).await.as_ref(),
        Some(&updated)
    );
    Ok(())
}

#[tokio::test]
async fn teardown_failure_after_rebuild_is_not_fatal() -> Result<()> {
    let harness = Harness::local();
    let original = seeded(&harness).await?;
    let ctx = RequestContext::new_request();
    harness
        .fakes
        .journal
        .fail(ops::DROP_SCHEMA, unavailable("store unavailable"));

    let mut command = UpdateAgentCommand::for_agent(original.agent_id.clone());
    command.branch = Some(BranchName::parse("develop")?);
    let updated = harness.orchestrator.update(&ctx, command).await?;

    assert_eq!(updated.branch.as_str(), "develop");
    assert!(harness.logger.contains("agents.updateAgent.teardownFailed"));
    Ok(())
}

#[tokio::test]
async fn unknown_agent_is_not_found() -> Result<()> {
    let harness = Harness::local();
    let ctx = RequestContext::new_request();
    let command =
        UpdateAgentCommand::for_agent(code_agent_domain::AgentId::parse("missing")?);

    let error = harness.orchestrator.update(&ctx, command).await.err();

    assert_eq!(error.map(|e| e.category()), Some(ErrorCategory::NotFound));
    assert_eq!(harness.fakes.journal.builder_calls(), 0);
    Ok(())
}

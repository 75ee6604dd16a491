//! Update an agent, rebuilding its resources when the source changes.

use super::deps::AgentDeps;
use super::resources::{
    provision_target, record_fields, tear_down_record, tear_down_record_knowledge_base,
};
use crate::observability::fields;
use crate::provisioning::AgentBinding;
use code_agent_domain::{AgentRecord, AgentStatus, ProvisioningTarget, UpdateAgentCommand};
use code_agent_ports::LogLevel;
use code_agent_shared::{ErrorEnvelope, RequestContext, Result};
use serde_json::Value;

/// Apply `command` to a stored agent.
///
/// Changing the repository, branch or provider rebuilds the knowledge base
/// and rebinds (or, across providers, recreates) the hosted agent before the
/// record is written. A failed rebuild leaves the stored record untouched.
/// Any other change is a plain record update.
#[tracing::instrument(name = "agents.update", skip_all, fields(correlation_id = %ctx.correlation_id()))]
pub async fn update_agent(
    ctx: &RequestContext,
    deps: &AgentDeps,
    command: UpdateAgentCommand,
) -> Result<AgentRecord> {
    let log_fields = fields([("agentId", Value::from(command.agent_id.as_str()))]);
    deps.observer
        .run(ctx, "updateAgent", log_fields, update(ctx, deps, command))
        .await
}

async fn update(
    ctx: &RequestContext,
    deps: &AgentDeps,
    command: UpdateAgentCommand,
) -> Result<AgentRecord> {
    ctx.ensure_not_cancelled("update_agent.start")?;
    let current = deps.store.get(ctx, command.agent_id.clone()).await?;

    let provider = command.ai_provider.unwrap_or(current.ai_provider);
    let ai_config = match (command.ai_config, provider == current.ai_provider) {
        (None, true) => current.ai_config.clone(),
        (explicit, _) => deps.defaults.resolve_ai_config(provider, explicit)?,
    };
    let repository_url = command
        .repository_url
        .unwrap_or_else(|| current.repository_url.clone());
    let branch = command.branch.unwrap_or_else(|| current.branch.clone());
    let agent_name = command
        .agent_name
        .unwrap_or_else(|| current.agent_name.clone());
    let updated_at_ms = deps.clock.now_ms().max(current.created_at_ms);

    if !current.requires_reprovisioning(&repository_url, &branch, provider) {
        let record = AgentRecord {
            agent_name,
            ai_config,
            updated_at_ms,
            ..current
        };
        ctx.ensure_not_cancelled("update_agent.persist")?;
        deps.store.update(ctx, record.clone()).await?;
        return Ok(record);
    }

    let provisioner = deps.provisioners.for_provider(provider)?;
    let status = current.status.transition(AgentStatus::Initializing)?;
    let target =
        ProvisioningTarget::new(current.agent_id.clone(), repository_url, branch, provider);
    let binding = if provider == current.ai_provider {
        AgentBinding::Rebind(current.hosted_agent_id.clone())
    } else {
        AgentBinding::Create
    };

    let provisioned = match provision_target(ctx, deps, provisioner, &target, &binding).await {
        Ok(provisioned) => provisioned,
        Err(error) => {
            let failed = status.transition(AgentStatus::Failed).unwrap_or(status);
            let mut log_fields = record_fields(&current);
            log_fields.insert("status".into(), Value::from(failed.as_str()));
            deps.observer.log_failure(
                LogLevel::Warn,
                "agents.updateAgent.rebuildFailed",
                "agent rebuild failed; stored record left unchanged",
                log_fields,
                &error,
            );
            return Err(error);
        },
    };

    let record = AgentRecord {
        agent_id: target.agent_id,
        agent_version: provisioned.agent_version,
        hosted_agent_id: provisioned.hosted_agent_id,
        knowledge_base_id: provisioned.knowledge_base.knowledge_base_id,
        vector_store_id: provisioned.knowledge_base.vector_store_id,
        repository_url: target.repository_url,
        branch: target.branch,
        agent_name,
        status: status.transition(AgentStatus::Ready)?,
        ai_provider: provider,
        ai_config,
        created_at_ms: current.created_at_ms,
        updated_at_ms,
    };
    ctx.ensure_not_cancelled("update_agent.persist")?;
    deps.store.update(ctx, record.clone()).await?;

    retire_previous(ctx, deps, &current, &binding).await;
    Ok(record)
}

/// Best-effort removal of the generation `previous` pointed at.
async fn retire_previous(
    ctx: &RequestContext,
    deps: &AgentDeps,
    previous: &AgentRecord,
    binding: &AgentBinding,
) {
    let outcome = match deps.provisioners.for_provider(previous.ai_provider) {
        Ok(provisioner) => match binding {
            AgentBinding::Rebind(_) => {
                tear_down_record_knowledge_base(ctx, deps, provisioner, previous).await
            },
            AgentBinding::Create => tear_down_record(ctx, deps, provisioner, previous).await,
        },
        Err(error) => Err(error),
    };
    if let Err(error) = outcome {
        log_teardown_failed(deps, previous, &error);
    }
}

fn log_teardown_failed(deps: &AgentDeps, previous: &AgentRecord, error: &ErrorEnvelope) {
    deps.observer.count("agents.updateAgent.teardownFailed", None);
    deps.observer.log_failure(
        LogLevel::Warn,
        "agents.updateAgent.teardownFailed",
        "previous agent resources could not be removed",
        record_fields(previous),
        error,
    );
}

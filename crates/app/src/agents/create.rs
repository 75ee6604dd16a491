//! Create an agent: provision, then persist, compensating on a failed persist.

use super::deps::AgentDeps;
use super::resources::{provision_target, record_fields, tear_down_record};
use crate::observability::fields;
use crate::provisioning::{AgentBinding, Provisioner};
use code_agent_domain::{
    AgentId, AgentName, AgentRecord, AgentStatus, CreateAgentCommand, ProvisioningTarget,
};
use code_agent_ports::{LogLevel, record_already_exists};
use code_agent_shared::{ErrorCategory, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;

/// Provision every resource for a new agent and persist its record.
///
/// No record is written unless every provisioning step succeeded. When the
/// write itself fails, one teardown runs on a detached context and the
/// original error is returned.
#[tracing::instrument(name = "agents.create", skip_all, fields(correlation_id = %ctx.correlation_id()))]
pub async fn create_agent(
    ctx: &RequestContext,
    deps: &AgentDeps,
    command: CreateAgentCommand,
) -> Result<AgentRecord> {
    let log_fields = fields([
        ("repositoryUrl", Value::from(command.repository_url.as_str())),
        (
            "provider",
            Value::from(command.ai_provider.unwrap_or(deps.defaults.provider).as_str()),
        ),
    ]);
    deps.observer
        .run(ctx, "createAgent", log_fields, create(ctx, deps, command))
        .await
}

async fn create(
    ctx: &RequestContext,
    deps: &AgentDeps,
    command: CreateAgentCommand,
) -> Result<AgentRecord> {
    ctx.ensure_not_cancelled("create_agent.start")?;

    let provider = command.ai_provider.unwrap_or(deps.defaults.provider);
    let provisioner = deps.provisioners.for_provider(provider)?;
    let ai_config = deps.defaults.resolve_ai_config(provider, command.ai_config)?;

    let agent_id = match command.agent_id {
        Some(agent_id) => {
            ensure_unused(ctx, deps, &agent_id).await?;
            agent_id
        },
        None => AgentId::generate(),
    };
    let target = ProvisioningTarget::new(
        agent_id,
        command.repository_url,
        command
            .branch
            .unwrap_or_else(|| deps.defaults.branch.clone()),
        provider,
    );
    let agent_name = command
        .agent_name
        .unwrap_or_else(|| AgentName::default_for(&target.agent_id));

    let status = AgentStatus::Pending.transition(AgentStatus::Initializing)?;
    let provisioned =
        match provision_target(ctx, deps, provisioner, &target, &AgentBinding::Create).await {
            Ok(provisioned) => provisioned,
            Err(error) => {
                log_provisioning_failed(deps, &target, status, &error);
                return Err(error);
            },
        };
    let status = status.transition(AgentStatus::Ready)?;

    let now = deps.clock.now_ms();
    let record = AgentRecord {
        agent_id: target.agent_id,
        agent_version: provisioned.agent_version,
        hosted_agent_id: provisioned.hosted_agent_id,
        knowledge_base_id: provisioned.knowledge_base.knowledge_base_id,
        vector_store_id: provisioned.knowledge_base.vector_store_id,
        repository_url: target.repository_url,
        branch: target.branch,
        agent_name,
        status,
        ai_provider: provider,
        ai_config,
        created_at_ms: now,
        updated_at_ms: now,
    };

    if let Err(error) = persist(ctx, deps, &record).await {
        compensate(ctx, deps, provisioner, &record, &error).await;
        return Err(error);
    }
    Ok(record)
}

async fn ensure_unused(ctx: &RequestContext, deps: &AgentDeps, agent_id: &AgentId) -> Result<()> {
    match deps.store.get(ctx, agent_id.clone()).await {
        Ok(_) => Err(record_already_exists(agent_id)),
        Err(error) if error.category() == ErrorCategory::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}

async fn persist(ctx: &RequestContext, deps: &AgentDeps, record: &AgentRecord) -> Result<()> {
    ctx.ensure_not_cancelled("create_agent.persist")?;
    deps.store.create(ctx, record.clone()).await
}

fn log_provisioning_failed(
    deps: &AgentDeps,
    target: &ProvisioningTarget,
    status: AgentStatus,
    error: &ErrorEnvelope,
) {
    let failed = status.transition(AgentStatus::Failed).unwrap_or(status);
    deps.observer.log_failure(
        LogLevel::Warn,
        "agents.createAgent.provisioningFailed",
        "agent provisioning failed; no record written",
        fields([
            ("agentId", Value::from(target.agent_id.as_str())),
            ("provider", Value::from(target.provider.as_str())),
            ("status", Value::from(failed.as_str())),
        ]),
        error,
    );
}

async fn compensate(
    ctx: &RequestContext,
    deps: &AgentDeps,
    provisioner: &Provisioner,
    record: &AgentRecord,
    persist_error: &ErrorEnvelope,
) {
    let detached = ctx.detached();
    let mut log_fields = record_fields(record);
    log_fields.insert("persistErrorCode".into(), Value::from(persist_error.code.to_string()));

    match tear_down_record(&detached, deps, provisioner, record).await {
        Ok(()) => {
            deps.observer.count("agents.createAgent.compensated", None);
            deps.observer.log(
                LogLevel::Info,
                "agents.createAgent.compensated",
                "provisioned resources removed after failed persist",
                log_fields,
            );
        },
        Err(cause) => {
            deps.observer.count("agents.createAgent.compensationFailed", None);
            deps.observer.log_failure(
                LogLevel::Error,
                "agents.createAgent.compensationFailed",
                "provisioned resources could not be removed after failed persist",
                log_fields,
                &compensation_error(record, &cause),
            );
        },
    }
}

fn compensation_error(record: &AgentRecord, cause: &ErrorEnvelope) -> ErrorEnvelope {
    let mut error = ErrorEnvelope::unexpected(
        ErrorCode::compensation(),
        format!("compensation failed: {}", cause.message),
        cause.class,
    )
    .with_metadata("agent_id", record.agent_id.as_str())
    .with_metadata("cause_code", cause.code.to_string());
    if let Some(step) = cause.metadata.get("step") {
        error = error.with_metadata("step", step.clone());
    }
    error
}

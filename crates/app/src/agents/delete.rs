//! Delete an agent and, best effort, everything it was built from.

use super::deps::AgentDeps;
use super::resources::{record_fields, tear_down_record};
use crate::observability::fields;
use code_agent_domain::{AgentId, AgentRecord, AgentStatus};
use code_agent_ports::LogLevel;
use code_agent_shared::{RequestContext, Result};
use serde_json::Value;

/// Tear down an agent's resources and remove its record.
///
/// Teardown failures are logged and do not stop the record removal; the
/// returned record carries the terminal `deleted` status.
#[tracing::instrument(name = "agents.delete", skip_all, fields(correlation_id = %ctx.correlation_id()))]
pub async fn delete_agent(
    ctx: &RequestContext,
    deps: &AgentDeps,
    agent_id: AgentId,
) -> Result<AgentRecord> {
    let log_fields = fields([("agentId", Value::from(agent_id.as_str()))]);
    deps.observer
        .run(ctx, "deleteAgent", log_fields, delete(ctx, deps, agent_id))
        .await
}

async fn delete(ctx: &RequestContext, deps: &AgentDeps, agent_id: AgentId) -> Result<AgentRecord> {
    ctx.ensure_not_cancelled("delete_agent.start")?;
    let record = deps.store.get(ctx, agent_id.clone()).await?;

    let teardown = match deps.provisioners.for_provider(record.ai_provider) {
        Ok(provisioner) => tear_down_record(ctx, deps, provisioner, &record).await,
        Err(error) => Err(error),
    };
    if let Err(error) = teardown {
        deps.observer.count("agents.deleteAgent.teardownFailed", None);
        deps.observer.log_failure(
            LogLevel::Warn,
            "agents.deleteAgent.teardownFailed",
            "agent resources could not be removed; deleting record anyway",
            record_fields(&record),
            &error,
        );
    }

    ctx.ensure_not_cancelled("delete_agent.remove_record")?;
    deps.store.delete(ctx, agent_id).await?;

    let status = record.status.transition(AgentStatus::Deleted)?;
    Ok(AgentRecord { status, ..record })
}

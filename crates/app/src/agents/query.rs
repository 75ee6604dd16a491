//! Read-only agent lookups.

use super::deps::AgentDeps;
use crate::observability::fields;
use code_agent_domain::{
    AgentId, AgentPage, AgentRecord, ListAgentsCommand, ListAgentsQuery, PageToken,
};
use code_agent_shared::{RequestContext, Result};
use serde_json::Value;

/// Fetch one record.
#[tracing::instrument(name = "agents.get", skip_all, fields(correlation_id = %ctx.correlation_id()))]
pub async fn get_agent(
    ctx: &RequestContext,
    deps: &AgentDeps,
    agent_id: AgentId,
) -> Result<AgentRecord> {
    let log_fields = fields([("agentId", Value::from(agent_id.as_str()))]);
    deps.observer
        .run(ctx, "getAgent", log_fields, async {
            ctx.ensure_not_cancelled("get_agent")?;
            deps.store.get(ctx, agent_id).await
        })
        .await
}

/// Page through records, newest first.
#[tracing::instrument(name = "agents.list", skip_all, fields(correlation_id = %ctx.correlation_id()))]
pub async fn list_agents(
    ctx: &RequestContext,
    deps: &AgentDeps,
    command: ListAgentsCommand,
) -> Result<AgentPage> {
    let log_fields = fields([
        ("pageSize", Value::from(command.page_size.get())),
        ("continued", Value::from(command.page_token.is_some())),
    ]);
    deps.observer
        .run(ctx, "listAgents", log_fields, async {
            ctx.ensure_not_cancelled("list_agents")?;
            let cursor = command
                .page_token
                .as_ref()
                .map(PageToken::decode)
                .transpose()?;
            deps.store
                .list(
                    ctx,
                    ListAgentsQuery {
                        cursor,
                        limit: command.page_size,
                    },
                )
                .await
        })
        .await
}

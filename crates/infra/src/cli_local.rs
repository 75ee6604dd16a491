//! Local CLI orchestration helpers.
//!
//! Each call loads the effective config, wires a fresh orchestrator and runs
//! one use case on a current-thread runtime. Ctrl-C cancels the request.

use crate::composition::build_agent_orchestrator;
use crate::config_check::load_effective_config;
use crate::observability::build_observability;
use crate::{InfraError, InfraResult};
use code_agent_domain::{
    AgentId, AgentPage, AgentRecord, CreateAgentCommand, ListAgentsCommand, UpdateAgentCommand,
};
use code_agent_shared::{ErrorEnvelope, RequestContext};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

/// One agent use case requested from the command line.
#[derive(Debug, Clone)]
pub enum AgentAction {
    /// Provision and persist a new agent.
    Create(CreateAgentCommand),
    /// Read one record.
    Get(AgentId),
    /// Patch, and rebuild when the source changed.
    Update(UpdateAgentCommand),
    /// Tear down and remove.
    Delete(AgentId),
    /// Read one page of records.
    List(ListAgentsCommand),
}

impl AgentAction {
    /// Use-case name as it appears in log events.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Create(_) => "createAgent",
            Self::Get(_) => "getAgent",
            Self::Update(_) => "updateAgent",
            Self::Delete(_) => "deleteAgent",
            Self::List(_) => "listAgents",
        }
    }
}

/// Result of an [`AgentAction`].
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    /// Single record (create, get, update, delete).
    Record(Box<AgentRecord>),
    /// Listing page.
    Page(AgentPage),
}

/// Run `action` against the stores and services described by the effective config.
pub fn run_agent_action_local(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    action: AgentAction,
) -> InfraResult<AgentOutcome> {
    let config = load_effective_config(env, config_path, overrides_json)?;
    let observability = build_observability(&config);
    let orchestrator = build_agent_orchestrator(&config, &observability)?;
    tracing::debug!(operation = action.operation(), "running agent action");

    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        match action {
            AgentAction::Create(command) => orchestrator
                .create(&ctx, command)
                .await
                .map(|record| AgentOutcome::Record(Box::new(record))),
            AgentAction::Get(agent_id) => orchestrator
                .get(&ctx, agent_id)
                .await
                .map(|record| AgentOutcome::Record(Box::new(record))),
            AgentAction::Update(command) => orchestrator
                .update(&ctx, command)
                .await
                .map(|record| AgentOutcome::Record(Box::new(record))),
            AgentAction::Delete(agent_id) => orchestrator
                .delete(&ctx, agent_id)
                .await
                .map(|record| AgentOutcome::Record(Box::new(record))),
            AgentAction::List(command) => {
                orchestrator.list(&ctx, command).await.map(AgentOutcome::Page)
            },
        }
    })
}

fn run_async_with_ctx<F, T>(
    ctx: RequestContext,
    op: impl FnOnce(RequestContext) -> F,
) -> InfraResult<T>
where
    F: Future<Output = Result<T, ErrorEnvelope>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(InfraError::from)?;
    runtime.block_on(async {
        let watcher = spawn_interrupt_watcher(&ctx);
        let outcome = op(ctx).await;
        watcher.abort();
        outcome
    })
}

fn spawn_interrupt_watcher(ctx: &RequestContext) -> tokio::task::JoinHandle<()> {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(
                correlation_id = ctx.correlation_id().as_str(),
                "interrupt received, cancelling request"
            );
            ctx.cancel();
        }
    })
}

//! Checkout handling and teardown of a record's resources.

use super::deps::AgentDeps;
use crate::observability::fields;
use crate::provisioning::{AgentBinding, Provisioned, Provisioner};
use code_agent_domain::{AgentRecord, ProvisioningTarget};
use code_agent_ports::{CheckoutRequest, LogLevel, SourceControlClient};
use code_agent_shared::{RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;

fn checkout_for(
    deps: &AgentDeps,
    target: &ProvisioningTarget,
) -> Result<Arc<dyn SourceControlClient>> {
    Ok(deps.source_control.client(CheckoutRequest {
        repository_url: target.repository_url.clone(),
        branch: target.branch.clone(),
        checkout_key: target.checkout_key()?,
    }))
}

/// Checkout location of the attempt that built `record`; its path keys the snapshot.
fn recorded_checkout(
    deps: &AgentDeps,
    record: &AgentRecord,
) -> Result<Arc<dyn SourceControlClient>> {
    Ok(deps.source_control.client(CheckoutRequest {
        repository_url: record.repository_url.clone(),
        branch: record.branch.clone(),
        checkout_key: record.checkout_key()?,
    }))
}

/// Provision `target` on a fresh checkout, removing the checkout afterwards.
///
/// A cleanup failure is logged and never replaces the provisioning outcome.
pub(crate) async fn provision_target(
    ctx: &RequestContext,
    deps: &AgentDeps,
    provisioner: &Provisioner,
    target: &ProvisioningTarget,
    binding: &AgentBinding,
) -> Result<Provisioned> {
    let table = target.vector_table()?;
    let checkout = checkout_for(deps, target)?;

    let result = provisioner
        .provision(ctx, checkout.as_ref(), &target.agent_id, &table, binding)
        .await;

    if let Err(error) = checkout.cleanup().await {
        deps.observer.log_failure(
            LogLevel::Warn,
            "agents.checkout.cleanupFailed",
            "checkout cleanup failed",
            fields([
                ("agentId", Value::from(target.agent_id.as_str())),
                ("path", Value::from(checkout.path().to_string_lossy().as_ref())),
            ]),
            &error,
        );
    }
    result
}

/// Tear down the agent and knowledge base `record` points at.
pub(crate) async fn tear_down_record(
    ctx: &RequestContext,
    deps: &AgentDeps,
    provisioner: &Provisioner,
    record: &AgentRecord,
) -> Result<()> {
    let checkout = recorded_checkout(deps, record)?;
    provisioner
        .tear_down_all(
            ctx,
            &record.hosted_agent_id,
            &record.vector_store_id,
            &record.knowledge_base_id,
            checkout.path(),
        )
        .await
}

/// Tear down only the knowledge base `record` points at.
pub(crate) async fn tear_down_record_knowledge_base(
    ctx: &RequestContext,
    deps: &AgentDeps,
    provisioner: &Provisioner,
    record: &AgentRecord,
) -> Result<()> {
    let checkout = recorded_checkout(deps, record)?;
    provisioner
        .tear_down_knowledge_base(
            ctx,
            &record.vector_store_id,
            &record.knowledge_base_id,
            checkout.path(),
        )
        .await
}

/// Log fields identifying a record.
pub(crate) fn record_fields(record: &AgentRecord) -> code_agent_ports::LogFields {
    fields([
        ("agentId", Value::from(record.agent_id.as_str())),
        ("hostedAgentId", Value::from(record.hosted_agent_id.as_str())),
        ("provider", Value::from(record.ai_provider.as_str())),
        ("knowledgeBaseId", Value::from(record.knowledge_base_id.as_str())),
        ("vectorStoreId", Value::from(record.vector_store_id.as_str())),
    ])
}

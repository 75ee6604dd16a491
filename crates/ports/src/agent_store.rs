//! Agent record persistence boundary contract.
//!
//! Every backend honours the same conditions: `create` never overwrites,
//! `update`/`delete` never insert, and `list` pages in
//! `listing_order`.

use crate::BoxFuture;
use code_agent_domain::{AgentId, AgentPage, AgentRecord, ListAgentsQuery};
use code_agent_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::fmt::Display;

/// Conditioned persistence of agent records.
pub trait AgentRecordStorePort: Send + Sync {
    /// Insert `record`; `core:already_exists` if the id is taken.
    fn create(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>>;

    /// Fetch a record; `core:not_found` if absent.
    fn get(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<AgentRecord>>;

    /// Replace a record; `core:not_found` if absent.
    fn update(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>>;

    /// Remove a record; `core:not_found` if absent.
    fn delete(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<()>>;

    /// Page through records.
    fn list(&self, ctx: &RequestContext, query: ListAgentsQuery)
    -> BoxFuture<'_, Result<AgentPage>>;
}

/// Uniform `core:not_found` for a missing record.
pub fn record_not_found(agent_id: &AgentId) -> ErrorEnvelope {
    ErrorEnvelope::not_found(format!("agent {agent_id} not found"))
        .with_metadata("agent_id", agent_id.as_str())
}

/// Uniform `core:already_exists` for a duplicate create.
pub fn record_already_exists(agent_id: &AgentId) -> ErrorEnvelope {
    ErrorEnvelope::already_exists(format!("agent {agent_id} already exists"))
        .with_metadata("agent_id", agent_id.as_str())
}

/// Uniform `store:persistence_failed` for backend failures.
pub fn persistence_error(operation: &'static str, table: &str, cause: impl Display) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::persistence(),
        format!("agent store {operation} failed: {cause}"),
        ErrorClass::Retriable,
    )
    .with_metadata("operation", operation)
    .with_metadata("table", table)
}

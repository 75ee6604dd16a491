//! Agent record store backends.
//!
//! All backends keep the same observable behaviour: conditioned writes,
//! `core:not_found` / `core:already_exists` from the port helpers, and
//! pages in `created_at_ms DESC, agent_id DESC` order.

mod document;
#[cfg(feature = "store-postgres")]
mod postgres;
mod sqlite;

pub use document::DocumentAgentStore;
#[cfg(feature = "store-postgres")]
pub use postgres::PostgresAgentStore;
pub use sqlite::SqliteAgentStore;

use code_agent_domain::{
    AgentId, AgentName, AgentRecord, AgentStatus, AgentVersion, AiProvider, BranchName,
    HostedAgentId, KnowledgeBaseId, RepositoryUrl, VectorTableName,
};
use code_agent_ports::persistence_error;
use code_agent_shared::{ErrorCode, ErrorEnvelope, Result};
use std::fmt::Display;

/// Column list shared by the relational backends, in bind order.
pub(crate) const COLUMNS: &str = "agent_id, agent_version, knowledge_base_id, vector_store_id, \
     repository_url, branch, agent_name, status, ai_provider, ai_config, created_at_ms, \
     updated_at_ms, hosted_agent_id";

/// Reject table names that are unsafe to interpolate into SQL.
pub(crate) fn checked_table(table: &str) -> Result<Box<str>> {
    let mut chars = table.chars();
    let valid = table.len() <= 63
        && chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(table.into())
    } else {
        Err(ErrorEnvelope::expected(
            ErrorCode::new("store", "invalid_table_name"),
            "table name must match ^[A-Za-z_][A-Za-z0-9_]{0,62}$",
        )
        .with_metadata("table", table))
    }
}

/// A record flattened into column values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordRow {
    pub agent_id: String,
    pub agent_version: String,
    pub knowledge_base_id: String,
    pub vector_store_id: String,
    pub repository_url: String,
    pub branch: String,
    pub agent_name: String,
    pub status: String,
    pub ai_provider: String,
    pub ai_config: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub hosted_agent_id: String,
}

impl RecordRow {
    pub(crate) fn from_record(record: &AgentRecord, table: &str) -> Result<Self> {
        let ai_config = serde_json::to_string(&record.ai_config)
            .map_err(|error| persistence_error("encode", table, error))?;
        Ok(Self {
            agent_id: record.agent_id.to_string(),
            agent_version: record.agent_version.to_string(),
            knowledge_base_id: record.knowledge_base_id.to_string(),
            vector_store_id: record.vector_store_id.to_string(),
            repository_url: record.repository_url.to_string(),
            branch: record.branch.to_string(),
            agent_name: record.agent_name.to_string(),
            status: record.status.as_str().to_owned(),
            ai_provider: record.ai_provider.as_str().to_owned(),
            ai_config,
            created_at_ms: record.created_at_ms,
            updated_at_ms: record.updated_at_ms,
            hosted_agent_id: record.hosted_agent_id.to_string(),
        })
    }

    /// Revalidate stored values; a row that no longer parses is a store failure.
    pub(crate) fn into_record(self, table: &str) -> Result<AgentRecord> {
        Ok(AgentRecord {
            agent_id: column(table, "agent_id", AgentId::parse(&self.agent_id))?,
            agent_version: column(table, "agent_version", AgentVersion::parse(&self.agent_version))?,
            hosted_agent_id: column(
                table,
                "hosted_agent_id",
                HostedAgentId::parse(&self.hosted_agent_id),
            )?,
            knowledge_base_id: column(
                table,
                "knowledge_base_id",
                KnowledgeBaseId::parse(&self.knowledge_base_id),
            )?,
            vector_store_id: column(
                table,
                "vector_store_id",
                VectorTableName::parse(&self.vector_store_id),
            )?,
            repository_url: column(
                table,
                "repository_url",
                RepositoryUrl::parse(&self.repository_url),
            )?,
            branch: column(table, "branch", BranchName::parse(&self.branch))?,
            agent_name: column(table, "agent_name", AgentName::parse(&self.agent_name))?,
            status: column(table, "status", AgentStatus::parse(&self.status))?,
            ai_provider: column(table, "ai_provider", AiProvider::parse(&self.ai_provider))?,
            ai_config: column(table, "ai_config", serde_json::from_str(&self.ai_config))?,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
        })
    }
}

fn column<T, E: Display>(table: &str, name: &str, parsed: std::result::Result<T, E>) -> Result<T> {
    parsed.map_err(|error| persistence_error("decode", table, format!("column {name}: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_shared::ErrorCategory;

    #[test]
    fn table_names_are_checked() {
        assert!(checked_table("agents").is_ok());
        assert!(checked_table("_Agents_v2").is_ok());
        let too_long = "a".repeat(64);
        for bad in ["", "1agents", "agents;drop", "agent-records", too_long.as_str()] {
            let error = checked_table(bad).err();
            assert_eq!(
                error.map(|e| e.code),
                Some(ErrorCode::new("store", "invalid_table_name")),
                "{bad}"
            );
        }
    }

    #[test]
    fn corrupt_rows_are_persistence_errors() {
        let row = RecordRow {
            agent_id: "a1".into(),
            agent_version: "v1".into(),
            knowledge_base_id: "kb".into(),
            vector_store_id: "agent_kb_00".into(),
            repository_url: "https://github.com/x/y".into(),
            branch: "main".into(),
            agent_name: "n".into(),
            status: "exploded".into(),
            ai_provider: "local".into(),
            ai_config: "{}".into(),
            created_at_ms: 1,
            updated_at_ms: 1,
            hosted_agent_id: "hosted-1".into(),
        };
        let error = row.into_record("agents").err();
        assert_eq!(error.as_ref().map(ErrorEnvelope::category), Some(ErrorCategory::Persistence));
        assert!(error.is_some_and(|e| e.message.contains("status")));
    }
}

//! Record store and vector schema selection.

use crate::InfraResult;
use code_agent_adapters::{DocumentAgentStore, SqliteAgentStore, SqliteVectorSchema};
use code_agent_config::{StoreBackend, ValidatedAgentServiceConfig, VectorStoreBackend};
use code_agent_ports::{AgentRecordStorePort, VectorStoreSchemaPort};
use code_agent_shared::{ErrorCode, ErrorEnvelope};
use std::sync::Arc;

#[cfg(feature = "store-postgres")]
use code_agent_adapters::{PostgresAgentStore, PostgresVectorSchema};

/// Build the configured agent record store.
pub fn build_record_store(
    config: &ValidatedAgentServiceConfig,
) -> InfraResult<Arc<dyn AgentRecordStorePort>> {
    let store = &config.store;
    tracing::debug!(backend = store.backend.as_str(), table = %store.table, "building record store");
    match store.backend {
        StoreBackend::Document => Ok(Arc::new(DocumentAgentStore::at_directory(
            store.resolved_path(),
            &store.table,
        )?)),
        StoreBackend::Sqlite => Ok(Arc::new(SqliteAgentStore::open(
            store.resolved_path(),
            &store.table,
        )?)),
        StoreBackend::Postgres => build_postgres_store(store.connection.as_deref(), &store.table),
    }
}

/// Build the configured vector table manager.
pub fn build_vector_schema(
    config: &ValidatedAgentServiceConfig,
) -> InfraResult<Arc<dyn VectorStoreSchemaPort>> {
    let vector_store = &config.provisioning.vector_store;
    match vector_store.backend {
        VectorStoreBackend::Sqlite => Ok(Arc::new(SqliteVectorSchema::new(
            vector_store.resolved_path(),
        ))),
        VectorStoreBackend::Postgres => {
            build_postgres_schema(vector_store.connection.as_deref(), vector_store.dimension)
        },
    }
}

#[cfg(feature = "store-postgres")]
fn build_postgres_store(
    connection: Option<&str>,
    table: &str,
) -> InfraResult<Arc<dyn AgentRecordStorePort>> {
    let connection = require_connection("store", connection)?;
    Ok(Arc::new(PostgresAgentStore::connect_lazy(connection, table)?))
}

#[cfg(not(feature = "store-postgres"))]
fn build_postgres_store(
    _connection: Option<&str>,
    _table: &str,
) -> InfraResult<Arc<dyn AgentRecordStorePort>> {
    Err(postgres_unavailable("store"))
}

#[cfg(feature = "store-postgres")]
fn build_postgres_schema(
    connection: Option<&str>,
    dimension: u32,
) -> InfraResult<Arc<dyn VectorStoreSchemaPort>> {
    let connection = require_connection("provisioning.vectorStore", connection)?;
    Ok(Arc::new(PostgresVectorSchema::connect_lazy(connection, dimension)?))
}

#[cfg(not(feature = "store-postgres"))]
fn build_postgres_schema(
    _connection: Option<&str>,
    _dimension: u32,
) -> InfraResult<Arc<dyn VectorStoreSchemaPort>> {
    Err(postgres_unavailable("provisioning.vectorStore"))
}

#[cfg(feature = "store-postgres")]
fn require_connection<'a>(section: &'static str, connection: Option<&'a str>) -> InfraResult<&'a str> {
    connection.ok_or_else(|| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "missing_connection"),
            format!("{section}.connection is required for the postgres backend"),
        )
        .with_metadata("section", section)
    })
}

#[cfg(not(feature = "store-postgres"))]
fn postgres_unavailable(section: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("config", "backend_unavailable"),
        "postgres backend requires the `store-postgres` feature",
    )
    .with_metadata("section", section)
}

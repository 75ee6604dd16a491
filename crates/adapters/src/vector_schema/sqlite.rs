//! SQLite-backed vector tables.
//!
//! Embeddings are stored as little-endian `f32` blobs; the table only has to
//! exist for the knowledge base to bind to it.

use code_agent_domain::VectorTableName;
use code_agent_ports::{BoxFuture, SchemaError, SchemaOperation, VectorStoreSchemaPort};
use code_agent_shared::{ErrorEnvelope, RequestContext, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;

/// Creates and drops vector tables in one SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteVectorSchema {
    path: PathBuf,
}

impl SqliteVectorSchema {
    /// Schema manager for the database at `path` (created on first use).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Database file in use.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `table_name` currently exists.
    pub async fn table_exists(&self, table_name: &VectorTableName) -> Result<bool> {
        let path = self.path.clone();
        let table = table_name.clone();
        spawn_blocking(move || {
            let conn = open(&path).map_err(|cause| SchemaError::new(SchemaOperation::Ensure, &table, cause))?;
            let found: Option<String> = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|cause| SchemaError::new(SchemaOperation::Ensure, &table, cause))?;
            Ok::<bool, ErrorEnvelope>(found.is_some())
        })
        .await
        .map_err(|error| {
            ErrorEnvelope::from(SchemaError::new(SchemaOperation::Ensure, table_name, error))
        })?
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        op: SchemaOperation,
        table_name: VectorTableName,
    ) -> Result<()> {
        ctx.ensure_not_cancelled(op.as_str())?;
        let path = self.path.clone();
        let table = table_name.clone();
        spawn_blocking(move || {
            let conn = open(&path).map_err(|cause| SchemaError::new(op, &table, cause))?;
            conn.execute_batch(&statement(op, &table))
                .map_err(|cause| SchemaError::new(op, &table, cause))?;
            Ok::<(), SchemaError>(())
        })
        .await
        .map_err(|error| SchemaError::new(op, &table_name, error).retriable())??;
        tracing::debug!(op = op.as_str(), table = %table_name, "sqlite vector schema updated");
        Ok(())
    }
}

impl VectorStoreSchemaPort for SqliteVectorSchema {
    fn ensure_schema(
        &self,
        ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.run(&ctx, SchemaOperation::Ensure, table_name).await })
    }

    fn drop_schema(
        &self,
        ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.run(&ctx, SchemaOperation::Drop, table_name).await })
    }
}

fn statement(op: SchemaOperation, table: &VectorTableName) -> String {
    // VectorTableName only admits `[a-z][a-z0-9_]*`, so quoting is enough.
    match op {
        SchemaOperation::Ensure => format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                embedding BLOB,
                metadata TEXT NOT NULL DEFAULT '{{}}'
             );"
        ),
        SchemaOperation::Drop => format!("DROP TABLE IF EXISTS \"{table}\";"),
    }
}

fn open(path: &Path) -> std::result::Result<Connection, String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|error| error.to_string())?;
    }
    let conn = Connection::open(path).map_err(|error| error.to_string())?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
        .map_err(|error| error.to_string())?;
    Ok(conn)
}

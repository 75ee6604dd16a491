//! SQLite record store.

use super::{COLUMNS, RecordRow, checked_table};
use code_agent_domain::{AgentId, AgentPage, AgentRecord, ListAgentsQuery};
use code_agent_ports::{
    AgentRecordStorePort, BoxFuture, persistence_error, record_already_exists, record_not_found,
};
use code_agent_shared::{RequestContext, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Agent records in one SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteAgentStore {
    table: Box<str>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAgentStore {
    /// Open (or create) the database at `path` and make sure the table exists.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let table = checked_table(table)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|error| persistence_error("open", &table, error))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|error| persistence_error("open", &table, error))?;
        Self::with_connection(conn, table)
    }

    /// Private in-memory database.
    pub fn in_memory(table: &str) -> Result<Self> {
        let table = checked_table(table)?;
        let conn =
            Connection::open_in_memory().map_err(|error| persistence_error("open", &table, error))?;
        Self::with_connection(conn, table)
    }

    fn with_connection(conn: Connection, table: Box<str>) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|error| persistence_error("open", &table, error))?;
        conn.execute_batch(&schema_ddl(&table))
            .map_err(|error| persistence_error("ensure_table", &table, error))?;
        Ok(Self {
            table,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Table holding the records.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn with_conn<R>(
        &self,
        operation: &'static str,
        work: impl FnOnce(&Connection, &str) -> Result<R> + Send + 'static,
    ) -> Result<R>
    where
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| persistence_error(operation, &table, "connection lock poisoned"))?;
            work(&guard, &table)
        })
        .await
        .map_err(|error| persistence_error(operation, &self.table, error))?
    }
}

fn schema_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            agent_id TEXT PRIMARY KEY NOT NULL,
            agent_version TEXT NOT NULL,
            knowledge_base_id TEXT NOT NULL,
            vector_store_id TEXT NOT NULL,
            repository_url TEXT NOT NULL,
            branch TEXT NOT NULL,
            agent_name TEXT NOT NULL,
            status TEXT NOT NULL,
            ai_provider TEXT NOT NULL,
            ai_config TEXT NOT NULL DEFAULT '{{}}',
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL,
            hosted_agent_id TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS \"idx_{table}_status\" ON \"{table}\" (status);
        CREATE INDEX IF NOT EXISTS \"idx_{table}_created_at\"
            ON \"{table}\" (created_at_ms DESC, agent_id DESC);"
    )
}

fn to_i64(operation: &'static str, table: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|error| persistence_error(operation, table, error))
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<(RecordRow, i64, i64)> {
    Ok((
        RecordRow {
            agent_id: row.get(0)?,
            agent_version: row.get(1)?,
            knowledge_base_id: row.get(2)?,
            vector_store_id: row.get(3)?,
            repository_url: row.get(4)?,
            branch: row.get(5)?,
            agent_name: row.get(6)?,
            status: row.get(7)?,
            ai_provider: row.get(8)?,
            ai_config: row.get(9)?,
            created_at_ms: 0,
            updated_at_ms: 0,
            hosted_agent_id: row.get(12)?,
        },
        row.get(10)?,
        row.get(11)?,
    ))
}

fn into_record(table: &str, (mut row, created, updated): (RecordRow, i64, i64)) -> Result<AgentRecord> {
    row.created_at_ms =
        u64::try_from(created).map_err(|error| persistence_error("decode", table, error))?;
    row.updated_at_ms =
        u64::try_from(updated).map_err(|error| persistence_error("decode", table, error))?;
    row.into_record(table)
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl AgentRecordStorePort for SqliteAgentStore {
    fn create(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.create")?;
            self.with_conn("create", move |conn, table| {
                let row = RecordRow::from_record(&record, table)?;
                let created = to_i64("create", table, row.created_at_ms)?;
                let updated = to_i64("create", table, row.updated_at_ms)?;
                let sql = format!(
                    "INSERT INTO \"{table}\" ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                );
                conn.execute(
                    &sql,
                    params![
                        row.agent_id,
                        row.agent_version,
                        row.knowledge_base_id,
                        row.vector_store_id,
                        row.repository_url,
                        row.branch,
                        row.agent_name,
                        row.status,
                        row.ai_provider,
                        row.ai_config,
                        created,
                        updated,
                        row.hosted_agent_id,
                    ],
                )
                .map_err(|error| {
                    if is_constraint_violation(&error) {
                        record_already_exists(&record.agent_id)
                    } else {
                        persistence_error("create", table, error)
                    }
                })?;
                Ok(())
            })
            .await
        })
    }

    fn get(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<AgentRecord>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.get")?;
            self.with_conn("get", move |conn, table| {
                let sql = format!("SELECT {COLUMNS} FROM \"{table}\" WHERE agent_id = ?1");
                let row = conn
                    .query_row(&sql, [agent_id.as_str()], read_row)
                    .optional()
                    .map_err(|error| persistence_error("get", table, error))?
                    .ok_or_else(|| record_not_found(&agent_id))?;
                into_record(table, row)
            })
            .await
        })
    }

    fn update(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.update")?;
            self.with_conn("update", move |conn, table| {
                let row = RecordRow::from_record(&record, table)?;
                let created = to_i64("update", table, row.created_at_ms)?;
                let updated = to_i64("update", table, row.updated_at_ms)?;
                let sql = format!(
                    "UPDATE \"{table}\" SET agent_version = ?2, knowledge_base_id = ?3,
                        vector_store_id = ?4, repository_url = ?5, branch = ?6, agent_name = ?7,
                        status = ?8, ai_provider = ?9, ai_config = ?10, created_at_ms = ?11,
                        updated_at_ms = ?12, hosted_agent_id = ?13
                     WHERE agent_id = ?1"
                );
                let changed = conn
                    .execute(
                        &sql,
                        params![
                            row.agent_id,
                            row.agent_version,
                            row.knowledge_base_id,
                            row.vector_store_id,
                            row.repository_url,
                            row.branch,
                            row.agent_name,
                            row.status,
                            row.ai_provider,
                            row.ai_config,
                            created,
                            updated,
                            row.hosted_agent_id,
                        ],
                    )
                    .map_err(|error| persistence_error("update", table, error))?;
                if changed == 0 {
                    return Err(record_not_found(&record.agent_id));
                }
                Ok(())
            })
            .await
        })
    }

    fn delete(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.delete")?;
            self.with_conn("delete", move |conn, table| {
                let changed = conn
                    .execute(
                        &format!("DELETE FROM \"{table}\" WHERE agent_id = ?1"),
                        [agent_id.as_str()],
                    )
                    .map_err(|error| persistence_error("delete", table, error))?;
                if changed == 0 {
                    return Err(record_not_found(&agent_id));
                }
                Ok(())
            })
            .await
        })
    }

    fn list(
        &self,
        ctx: &RequestContext,
        query: ListAgentsQuery,
    ) -> BoxFuture<'_, Result<AgentPage>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.list")?;
            self.with_conn("list", move |conn, table| {
                let fetch = to_i64("list", table, u64::from(query.limit.get()))? + 1;
                let order = "ORDER BY created_at_ms DESC, agent_id DESC LIMIT";
                let raw = match &query.cursor {
                    Some(cursor) => {
                        let sql = format!(
                            "SELECT {COLUMNS} FROM \"{table}\"
                             WHERE created_at_ms < ?1 OR (created_at_ms = ?1 AND agent_id < ?2)
                             {order} ?3"
                        );
                        let mut statement = conn
                            .prepare(&sql)
                            .map_err(|error| persistence_error("list", table, error))?;
                        let created = to_i64("list", table, cursor.created_at_ms)?;
                        statement
                            .query_map(params![created, cursor.agent_id.as_str(), fetch], read_row)
                            .and_then(Iterator::collect::<rusqlite::Result<Vec<_>>>)
                            .map_err(|error| persistence_error("list", table, error))?
                    },
                    None => {
                        let sql = format!("SELECT {COLUMNS} FROM \"{table}\" {order} ?1");
                        let mut statement = conn
                            .prepare(&sql)
                            .map_err(|error| persistence_error("list", table, error))?;
                        statement
                            .query_map([fetch], read_row)
                            .and_then(Iterator::collect::<rusqlite::Result<Vec<_>>>)
                            .map_err(|error| persistence_error("list", table, error))?
                    },
                };
                let rows = raw
                    .into_iter()
                    .map(|row| into_record(table, row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(AgentPage::from_overfetched(rows, query.limit)?)
            })
            .await
        })
    }
}

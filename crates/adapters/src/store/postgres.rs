//! PostgreSQL record store.

use super::{COLUMNS, RecordRow, checked_table};
use code_agent_domain::{AgentId, AgentPage, AgentRecord, ListAgentsQuery};
use code_agent_ports::{
    AgentRecordStorePort, BoxFuture, persistence_error, record_already_exists, record_not_found,
};
use code_agent_shared::{ErrorEnvelope, RequestContext, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tokio::sync::OnceCell;

/// Agent records in one PostgreSQL table.
#[derive(Debug)]
pub struct PostgresAgentStore {
    table: Box<str>,
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PostgresAgentStore {
    /// Lazy pool over `connection`; the table is created on first use.
    pub fn connect_lazy(connection: &str, table: &str) -> Result<Self> {
        let table = checked_table(table)?;
        let pool = sqlx::Pool::<Postgres>::connect_lazy(connection)
            .map_err(|error| persistence_error("connect", &table, error))?;
        Ok(Self {
            table,
            pool,
            schema: OnceCell::new(),
        })
    }

    async fn ready(&self, operation: &'static str) -> Result<&PgPool> {
        self.schema
            .get_or_try_init(|| async {
                let table = &self.table;
                let ddl = [
                    format!(
                        "CREATE TABLE IF NOT EXISTS \"{table}\" (
                            agent_id TEXT PRIMARY KEY,
                            agent_version TEXT NOT NULL,
                            knowledge_base_id TEXT NOT NULL,
                            vector_store_id TEXT NOT NULL,
                            repository_url TEXT NOT NULL,
                            branch TEXT NOT NULL,
                            agent_name TEXT NOT NULL,
                            status TEXT NOT NULL,
                            ai_provider TEXT NOT NULL,
                            ai_config JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                            created_at_ms BIGINT NOT NULL,
                            updated_at_ms BIGINT NOT NULL,
                            hosted_agent_id TEXT NOT NULL
                        )"
                    ),
                    format!(
                        "CREATE INDEX IF NOT EXISTS \"idx_{table}_status\" ON \"{table}\" (status)"
                    ),
                    format!(
                        "CREATE INDEX IF NOT EXISTS \"idx_{table}_created_at\"
                         ON \"{table}\" (created_at_ms DESC, agent_id DESC)"
                    ),
                ];
                for statement in &ddl {
                    sqlx::query(statement)
                        .execute(&self.pool)
                        .await
                        .map_err(|error| persistence_error(operation, table, error))?;
                }
                Ok::<(), ErrorEnvelope>(())
            })
            .await?;
        Ok(&self.pool)
    }

    fn select_sql(&self, tail: &str) -> String {
        let columns = COLUMNS.replace("ai_config", "ai_config::text AS ai_config");
        format!("SELECT {columns} FROM \"{}\" {tail}", self.table)
    }

    fn decode(&self, row: &PgRow) -> Result<AgentRecord> {
        let text = |name: &str| -> Result<String> {
            row.try_get(name)
                .map_err(|error| persistence_error("decode", &self.table, error))
        };
        let millis = |name: &str| -> Result<u64> {
            let value: i64 = row
                .try_get(name)
                .map_err(|error| persistence_error("decode", &self.table, error))?;
            u64::try_from(value).map_err(|error| persistence_error("decode", &self.table, error))
        };
        RecordRow {
            agent_id: text("agent_id")?,
            agent_version: text("agent_version")?,
            knowledge_base_id: text("knowledge_base_id")?,
            vector_store_id: text("vector_store_id")?,
            repository_url: text("repository_url")?,
            branch: text("branch")?,
            agent_name: text("agent_name")?,
            status: text("status")?,
            ai_provider: text("ai_provider")?,
            ai_config: text("ai_config")?,
            created_at_ms: millis("created_at_ms")?,
            updated_at_ms: millis("updated_at_ms")?,
            hosted_agent_id: text("hosted_agent_id")?,
        }
        .into_record(&self.table)
    }
}

fn to_i64(operation: &'static str, table: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|error| persistence_error(operation, table, error))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl AgentRecordStorePort for PostgresAgentStore {
    fn create(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.create")?;
            let pool = self.ready("create").await?;
            let table = &self.table;
            let row = RecordRow::from_record(&record, table)?;
            let sql = format!(
                "INSERT INTO \"{table}\" ({COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::jsonb, $11, $12, $13)"
            );
            sqlx::query(&sql)
                .bind(row.agent_id)
                .bind(row.agent_version)
                .bind(row.knowledge_base_id)
                .bind(row.vector_store_id)
                .bind(row.repository_url)
                .bind(row.branch)
                .bind(row.agent_name)
                .bind(row.status)
                .bind(row.ai_provider)
                .bind(row.ai_config)
                .bind(to_i64("create", table, row.created_at_ms)?)
                .bind(to_i64("create", table, row.updated_at_ms)?)
                .bind(row.hosted_agent_id)
                .execute(pool)
                .await
                .map_err(|error| {
                    if is_unique_violation(&error) {
                        record_already_exists(&record.agent_id)
                    } else {
                        persistence_error("create", table, error)
                    }
                })?;
            Ok(())
        })
    }

    fn get(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<AgentRecord>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.get")?;
            let pool = self.ready("get").await?;
            let row = sqlx::query(&self.select_sql("WHERE agent_id = $1"))
                .bind(agent_id.as_str())
                .fetch_optional(pool)
                .await
                .map_err(|error| persistence_error("get", &self.table, error))?
                .ok_or_else(|| record_not_found(&agent_id))?;
            self.decode(&row)
        })
    }

    fn update(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.update")?;
            let pool = self.ready("update").await?;
            let table = &self.table;
            let row = RecordRow::from_record(&record, table)?;
            let sql = format!(
                "UPDATE \"{table}\" SET agent_version = $2, knowledge_base_id = $3,
                    vector_store_id = $4, repository_url = $5, branch = $6, agent_name = $7,
                    status = $8, ai_provider = $9, ai_config = $10::jsonb, created_at_ms = $11,
                    updated_at_ms = $12, hosted_agent_id = $13
                 WHERE agent_id = $1"
            );
            let outcome = sqlx::query(&sql)
                .bind(row.agent_id)
                .bind(row.agent_version)
                .bind(row.knowledge_base_id)
                .bind(row.vector_store_id)
                .bind(row.repository_url)
                .bind(row.branch)
                .bind(row.agent_name)
                .bind(row.status)
                .bind(row.ai_provider)
                .bind(row.ai_config)
                .bind(to_i64("update", table, row.created_at_ms)?)
                .bind(to_i64("update", table, row.updated_at_ms)?)
                .bind(row.hosted_agent_id)
                .execute(pool)
                .await
                .map_err(|error| persistence_error("update", table, error))?;
            if outcome.rows_affected() == 0 {
                return Err(record_not_found(&record.agent_id));
            }
            Ok(())
        })
    }

    fn delete(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.delete")?;
            let pool = self.ready("delete").await?;
            let outcome = sqlx::query(&format!(
                "DELETE FROM \"{}\" WHERE agent_id = $1",
                self.table
            ))
            .bind(agent_id.as_str())
            .execute(pool)
            .await
            .map_err(|error| persistence_error("delete", &self.table, error))?;
            if outcome.rows_affected() == 0 {
                return Err(record_not_found(&agent_id));
            }
            Ok(())
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
            let pool = self.ready("list").await?;
            let table = &self.table;
            let fetch = to_i64("list", table, u64::from(query.limit.get()))? + 1;
            // COLLATE "C" keeps id ordering bytewise regardless of the database locale.
            let order = "ORDER BY created_at_ms DESC, agent_id COLLATE \"C\" DESC";
            let rows = match &query.cursor {
                Some(cursor) => {
                    let sql = self.select_sql(&format!(
                        "WHERE created_at_ms < $1
                            OR (created_at_ms = $1 AND agent_id COLLATE \"C\" < $2)
                         {order} LIMIT $3"
                    ));
                    sqlx::query(&sql)
                        .bind(to_i64("list", table, cursor.created_at_ms)?)
                        .bind(cursor.agent_id.as_str())
                        .bind(fetch)
                        .fetch_all(pool)
                        .await
                },
                None => {
                    sqlx::query(&self.select_sql(&format!("{order} LIMIT $1")))
                        .bind(fetch)
                        .fetch_all(pool)
                        .await
                },
            }
            .map_err(|error| persistence_error("list", table, error))?;
            let records = rows
                .iter()
                .map(|row| self.decode(row))
                .collect::<Result<Vec<_>>>()?;
            Ok(AgentPage::from_overfetched(records, query.limit)?)
        })
    }
}

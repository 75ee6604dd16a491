//! PostgreSQL + pgvector vector tables.

use code_agent_domain::VectorTableName;
use code_agent_ports::{BoxFuture, SchemaError, SchemaOperation, VectorStoreSchemaPort};
use code_agent_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use sqlx::{PgPool, Postgres};
use tokio::sync::OnceCell;

/// Creates and drops `vector(<dimension>)` tables.
#[derive(Debug)]
pub struct PostgresVectorSchema {
    pool: PgPool,
    dimension: u32,
    extension: OnceCell<()>,
}

impl PostgresVectorSchema {
    /// Lazy pool over `connection`; nothing connects until the first call.
    pub fn connect_lazy(connection: &str, dimension: u32) -> Result<Self> {
        let pool = sqlx::Pool::<Postgres>::connect_lazy(connection).map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::schema(),
                format!("invalid vector store connection: {error}"),
                ErrorClass::NonRetriable,
            )
        })?;
        Ok(Self {
            pool,
            dimension,
            extension: OnceCell::new(),
        })
    }

    async fn ensure_extension(&self, table: &VectorTableName) -> Result<()> {
        self.extension
            .get_or_try_init(|| async {
                sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
                    .execute(&self.pool)
                    .await
                    .map(|_| ())
                    .map_err(|error| schema_error(SchemaOperation::Ensure, table, &error))
            })
            .await?;
        Ok(())
    }
}

impl VectorStoreSchemaPort for PostgresVectorSchema {
    fn ensure_schema(
        &self,
        ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled(SchemaOperation::Ensure.as_str())?;
            self.ensure_extension(&table_name).await?;
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS \"{table_name}\" (
                    id UUID PRIMARY KEY,
                    content TEXT,
                    embedding vector({dimension}),
                    metadata JSONB
                )",
                dimension = self.dimension
            );
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(|error| schema_error(SchemaOperation::Ensure, &table_name, &error))?;
            Ok(())
        })
    }

    fn drop_schema(
        &self,
        ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled(SchemaOperation::Drop.as_str())?;
            sqlx::query(&format!("DROP TABLE IF EXISTS \"{table_name}\""))
                .execute(&self.pool)
                .await
                .map_err(|error| schema_error(SchemaOperation::Drop, &table_name, &error))?;
            Ok(())
        })
    }
}

fn schema_error(
    op: SchemaOperation,
    table: &VectorTableName,
    error: &sqlx::Error,
) -> ErrorEnvelope {
    let failure = SchemaError::new(op, table, error);
    let failure = match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            failure.retriable()
        },
        _ => failure,
    };
    failure.into()
}

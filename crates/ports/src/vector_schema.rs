//! Vector-store schema management boundary contract.

use crate::BoxFuture;
use code_agent_domain::VectorTableName;
use code_agent_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::fmt;

/// Creates and removes the physical table holding a knowledge base's embeddings.
///
/// Both operations are idempotent and never retry internally.
pub trait VectorStoreSchemaPort: Send + Sync {
    /// Create the table if it is absent.
    fn ensure_schema(
        &self,
        ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>>;

    /// Drop the table if it is present.
    fn drop_schema(
        &self,
        ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>>;
}

/// Schema operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOperation {
    /// Create-if-absent.
    Ensure,
    /// Drop-if-present.
    Drop,
}

impl SchemaOperation {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ensure => "ensure_schema",
            Self::Drop => "drop_schema",
        }
    }
}

/// Failure of a schema operation against a named table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Operation that failed.
    pub op: SchemaOperation,
    /// Table the operation targeted.
    pub table_name: VectorTableName,
    /// Backend message.
    pub cause: String,
    /// Whether retrying might succeed.
    pub class: ErrorClass,
}

impl SchemaError {
    /// Non-retriable schema failure.
    pub fn new(op: SchemaOperation, table_name: &VectorTableName, cause: impl fmt::Display) -> Self {
        Self {
            op,
            table_name: table_name.clone(),
            cause: cause.to_string(),
            class: ErrorClass::NonRetriable,
        }
    }

    /// Mark the failure as retriable (e.g. connection loss).
    #[must_use]
    pub const fn retriable(mut self) -> Self {
        self.class = ErrorClass::Retriable;
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} failed for table {}: {}",
            self.op.as_str(),
            self.table_name,
            self.cause
        )
    }
}

impl std::error::Error for SchemaError {}

impl From<SchemaError> for ErrorEnvelope {
    fn from(error: SchemaError) -> Self {
        Self::unexpected(ErrorCode::schema(), error.to_string(), error.class)
            .with_metadata("op", error.op.as_str())
            .with_metadata("table_name", error.table_name.as_str())
            .with_metadata("cause", error.cause)
    }
}

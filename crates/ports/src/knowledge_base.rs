//! Retrieval knowledge base boundary contract.

use crate::BoxFuture;
use code_agent_domain::{DataSourceId, KnowledgeBaseId, VectorTableName};
use code_agent_shared::{RequestContext, Result};

/// Creates retrieval indexes over a vector table and binds snapshots to them.
pub trait KnowledgeBaseServicePort: Send + Sync {
    /// Create a knowledge base over `source_table`.
    fn create(
        &self,
        ctx: &RequestContext,
        source_table: VectorTableName,
    ) -> BoxFuture<'_, Result<KnowledgeBaseId>>;

    /// Delete a knowledge base. Deleting an unknown id succeeds.
    fn delete(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<()>>;

    /// Bind the uploaded snapshot to `knowledge_base_id`.
    fn create_data_source(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<DataSourceId>>;

    /// Data sources bound to `knowledge_base_id`; empty for an unknown id.
    fn list_data_sources(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<Vec<DataSourceId>>>;

    /// Unbind one data source. Deleting an unknown binding succeeds.
    fn delete_data_source(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
        data_source_id: DataSourceId,
    ) -> BoxFuture<'_, Result<()>>;
}

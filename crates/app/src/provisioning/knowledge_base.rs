//! Knowledge base provisioning: schema, index, snapshot, binding.

use super::steps::{ProvisioningStep, run_step};
use crate::observability::Observer;
use code_agent_domain::{DataSourceId, KnowledgeBaseId, VectorTableName};
use code_agent_ports::{KnowledgeBaseServicePort, ObjectStorePort, VectorStoreSchemaPort};
use code_agent_shared::{RequestContext, Result};
use std::path::Path;
use std::sync::Arc;

/// Identifiers produced by a successful knowledge base build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltKnowledgeBase {
    /// Knowledge base id.
    pub knowledge_base_id: KnowledgeBaseId,
    /// Vector table behind it.
    pub vector_store_id: VectorTableName,
    /// Binding of the uploaded snapshot.
    pub data_source_id: DataSourceId,
}

/// Builds and tears down knowledge bases for one provider.
#[derive(Clone)]
pub struct KnowledgeBaseBuilder {
    schema: Arc<dyn VectorStoreSchemaPort>,
    object_store: Arc<dyn ObjectStorePort>,
    knowledge_bases: Arc<dyn KnowledgeBaseServicePort>,
    observer: Observer,
}

impl KnowledgeBaseBuilder {
    /// Wire the builder to its collaborators.
    #[must_use]
    pub fn new(
        schema: Arc<dyn VectorStoreSchemaPort>,
        object_store: Arc<dyn ObjectStorePort>,
        knowledge_bases: Arc<dyn KnowledgeBaseServicePort>,
        observer: Observer,
    ) -> Self {
        Self {
            schema,
            object_store,
            knowledge_bases,
            observer,
        }
    }

    /// Provision a knowledge base over `table` from the checkout at `repo_path`.
    ///
    /// Steps run strictly in order and stop at the first failure; nothing
    /// created before the failure is rolled back here.
    pub async fn build(
        &self,
        ctx: &RequestContext,
        table: &VectorTableName,
        repo_path: &Path,
    ) -> Result<BuiltKnowledgeBase> {
        run_step(ctx, &self.observer, ProvisioningStep::EnsureSchema, || {
            self.schema.ensure_schema(ctx, table.clone())
        })
        .await?;

        let knowledge_base_id =
            run_step(ctx, &self.observer, ProvisioningStep::CreateKnowledgeBase, || {
                self.knowledge_bases.create(ctx, table.clone())
            })
            .await?;

        run_step(ctx, &self.observer, ProvisioningStep::UploadSnapshot, || {
            self.object_store.upload_directory(
                ctx,
                repo_path.to_path_buf(),
                snapshot_prefix(repo_path),
            )
        })
        .await?;

        let data_source_id =
            run_step(ctx, &self.observer, ProvisioningStep::CreateDataSource, || {
                self.knowledge_bases
                    .create_data_source(ctx, knowledge_base_id.clone())
            })
            .await?;

        Ok(BuiltKnowledgeBase {
            knowledge_base_id,
            vector_store_id: table.clone(),
            data_source_id,
        })
    }

    /// Remove a knowledge base and everything it was built from.
    ///
    /// Order: data sources, snapshot, knowledge base, vector table. Stops at
    /// the first failure.
    pub async fn tear_down(
        &self,
        ctx: &RequestContext,
        table: &VectorTableName,
        knowledge_base_id: &KnowledgeBaseId,
        repo_path: &Path,
    ) -> Result<()> {
        let data_sources =
            run_step(ctx, &self.observer, ProvisioningStep::DeleteDataSource, || {
                self.knowledge_bases
                    .list_data_sources(ctx, knowledge_base_id.clone())
            })
            .await?;
        for data_source_id in data_sources {
            run_step(ctx, &self.observer, ProvisioningStep::DeleteDataSource, || {
                self.knowledge_bases.delete_data_source(
                    ctx,
                    knowledge_base_id.clone(),
                    data_source_id,
                )
            })
            .await?;
        }

        run_step(ctx, &self.observer, ProvisioningStep::DeleteSnapshot, || {
            self.object_store
                .delete_directory(ctx, snapshot_prefix(repo_path))
        })
        .await?;

        run_step(ctx, &self.observer, ProvisioningStep::DeleteKnowledgeBase, || {
            self.knowledge_bases.delete(ctx, knowledge_base_id.clone())
        })
        .await?;

        run_step(ctx, &self.observer, ProvisioningStep::DropSchema, || {
            self.schema.drop_schema(ctx, table.clone())
        })
        .await
    }
}

/// Snapshot key prefix: the checkout path itself, so a rebuild of a
/// different generation never shares a prefix with the one it replaces.
pub fn snapshot_prefix(repo_path: &Path) -> Box<str> {
    repo_path.to_string_lossy().into()
}

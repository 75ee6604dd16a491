//! In-process knowledge base service.
//!
//! Tracks knowledge bases and their data-source bindings in a
//! [`JsonRegistry`]. Ids are `kb-<uuid>` and `ds-<uuid>`.

use crate::registry::JsonRegistry;
use code_agent_domain::{DataSourceId, KnowledgeBaseId, VectorTableName};
use code_agent_ports::{BoxFuture, KnowledgeBaseServicePort};
use code_agent_shared::{ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// One knowledge base and the data sources bound to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseEntry {
    /// Vector table the index reads from.
    pub source_table: Box<str>,
    /// Bound data sources.
    pub data_sources: BTreeSet<Box<str>>,
}

type KnowledgeBases = BTreeMap<Box<str>, KnowledgeBaseEntry>;

/// Knowledge bases kept in a local registry.
#[derive(Debug)]
pub struct LocalKnowledgeBaseService {
    registry: JsonRegistry<KnowledgeBases>,
}

impl LocalKnowledgeBaseService {
    /// Service persisting to `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            registry: JsonRegistry::at_path(path),
        }
    }

    /// Service without persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            registry: JsonRegistry::in_memory(),
        }
    }

    /// Snapshot of a knowledge base, if it exists.
    pub async fn entry(&self, knowledge_base_id: &KnowledgeBaseId) -> Result<Option<KnowledgeBaseEntry>> {
        self.registry
            .read(|bases| bases.get(knowledge_base_id.as_str()).cloned())
            .await
    }

    /// Number of knowledge bases currently registered.
    pub async fn len(&self) -> Result<usize> {
        self.registry.read(BTreeMap::len).await
    }

    /// Whether no knowledge base is registered.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

impl KnowledgeBaseServicePort for LocalKnowledgeBaseService {
    fn create(
        &self,
        ctx: &RequestContext,
        source_table: VectorTableName,
    ) -> BoxFuture<'_, Result<KnowledgeBaseId>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("knowledge_base.create")?;
            let id = KnowledgeBaseId::parse(format!("kb-{}", uuid::Uuid::new_v4()))?;
            self.registry
                .update(|bases| {
                    bases.insert(
                        id.as_str().into(),
                        KnowledgeBaseEntry {
                            source_table: source_table.as_str().into(),
                            data_sources: BTreeSet::new(),
                        },
                    );
                    Ok(())
                })
                .await?;
            tracing::debug!(knowledge_base_id = %id, table = %source_table, "knowledge base created");
            Ok(id)
        })
    }

    fn delete(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("knowledge_base.delete")?;
            self.registry
                .update(|bases| {
                    bases.remove(knowledge_base_id.as_str());
                    Ok(())
                })
                .await
        })
    }

    fn create_data_source(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<DataSourceId>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("knowledge_base.create_data_source")?;
            let id = DataSourceId::parse(format!("ds-{}", uuid::Uuid::new_v4()))?;
            self.registry
                .update(|bases| {
                    let entry = bases.get_mut(knowledge_base_id.as_str()).ok_or_else(|| {
                        ErrorEnvelope::not_found(format!(
                            "knowledge base {knowledge_base_id} not found"
                        ))
                        .with_metadata("knowledge_base_id", knowledge_base_id.as_str())
                    })?;
                    entry.data_sources.insert(id.as_str().into());
                    Ok(())
                })
                .await?;
            Ok(id)
        })
    }

    fn list_data_sources(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<Vec<DataSourceId>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("knowledge_base.list_data_sources")?;
            let raw: Vec<Box<str>> = self
                .registry
                .read(|bases| {
                    bases
                        .get(knowledge_base_id.as_str())
                        .map(|entry| entry.data_sources.iter().cloned().collect())
                        .unwrap_or_default()
                })
                .await?;
            raw.iter()
                .map(|id| DataSourceId::parse(id).map_err(ErrorEnvelope::from))
                .collect()
        })
    }

    fn delete_data_source(
        &self,
        ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
        data_source_id: DataSourceId,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("knowledge_base.delete_data_source")?;
            self.registry
                .update(|bases| {
                    if let Some(entry) = bases.get_mut(knowledge_base_id.as_str()) {
                        entry.data_sources.remove(data_source_id.as_str());
                    }
                    Ok(())
                })
                .await
        })
    }
}

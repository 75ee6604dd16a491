//! Document-style record store.
//!
//! Records live either in process memory or in a single `<table>.json`
//! document. File access is serialized across processes with an advisory
//! lock on `<table>.json.lock`; writes go to a temp file and are renamed
//! into place.

use super::checked_table;
use code_agent_domain::{AgentId, AgentPage, AgentRecord, ListAgentsQuery, paginate};
use code_agent_ports::{
    AgentRecordStorePort, BoxFuture, persistence_error, record_already_exists, record_not_found,
};
use code_agent_shared::{RequestContext, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordDocument {
    #[serde(default)]
    records: Vec<AgentRecord>,
}

#[derive(Debug, Clone)]
struct DocumentPaths {
    table: Box<str>,
    document: PathBuf,
    lock: PathBuf,
}

#[derive(Debug)]
enum Backing {
    Memory(RwLock<BTreeMap<AgentId, AgentRecord>>),
    File(DocumentPaths),
}

/// Agent records kept as one JSON document per table.
#[derive(Debug)]
pub struct DocumentAgentStore {
    table: Box<str>,
    backing: Backing,
}

impl DocumentAgentStore {
    /// Store that lives and dies with the process.
    pub fn in_memory(table: &str) -> Result<Self> {
        Ok(Self {
            table: checked_table(table)?,
            backing: Backing::Memory(RwLock::new(BTreeMap::new())),
        })
    }

    /// Store persisted at `<directory>/<table>.json`.
    pub fn at_directory(directory: impl AsRef<Path>, table: &str) -> Result<Self> {
        let table = checked_table(table)?;
        let document = directory.as_ref().join(format!("{table}.json"));
        let lock = directory.as_ref().join(format!("{table}.json.lock"));
        Ok(Self {
            backing: Backing::File(DocumentPaths {
                table: table.clone(),
                document,
                lock,
            }),
            table,
        })
    }

    /// Backing document, when persistent.
    #[must_use]
    pub fn document_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory(_) => None,
            Backing::File(paths) => Some(&paths.document),
        }
    }

    async fn read<R>(
        &self,
        operation: &'static str,
        reader: impl FnOnce(&[AgentRecord]) -> Result<R> + Send + 'static,
    ) -> Result<R>
    where
        R: Send + 'static,
    {
        match &self.backing {
            Backing::Memory(records) => {
                let guard = records.read().await;
                let rows: Vec<AgentRecord> = guard.values().cloned().collect();
                reader(&rows)
            },
            Backing::File(paths) => {
                let paths = paths.clone();
                blocking(operation, &self.table, move || {
                    let _lock = acquire(&paths, operation, false)?;
                    let document = load(&paths, operation)?;
                    reader(&document.records)
                })
                .await
            },
        }
    }

    async fn modify<R>(
        &self,
        operation: &'static str,
        mutate: impl FnOnce(&mut BTreeMap<AgentId, AgentRecord>) -> Result<R> + Send + 'static,
    ) -> Result<R>
    where
        R: Send + 'static,
    {
        match &self.backing {
            Backing::Memory(records) => {
                let mut guard = records.write().await;
                let mut next = guard.clone();
                let outcome = mutate(&mut next)?;
                *guard = next;
                Ok(outcome)
            },
            Backing::File(paths) => {
                let paths = paths.clone();
                blocking(operation, &self.table, move || {
                    let _lock = acquire(&paths, operation, true)?;
                    let document = load(&paths, operation)?;
                    let mut records: BTreeMap<AgentId, AgentRecord> = document
                        .records
                        .into_iter()
                        .map(|record| (record.agent_id.clone(), record))
                        .collect();
                    let outcome = mutate(&mut records)?;
                    store(&paths, operation, RecordDocument {
                        records: records.into_values().collect(),
                    })?;
                    Ok(outcome)
                })
                .await
            },
        }
    }
}

impl AgentRecordStorePort for DocumentAgentStore {
    fn create(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.create")?;
            self.modify("create", move |records| {
                if records.contains_key(&record.agent_id) {
                    return Err(record_already_exists(&record.agent_id));
                }
                records.insert(record.agent_id.clone(), record);
                Ok(())
            })
            .await
        })
    }

    fn get(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<AgentRecord>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.get")?;
            self.read("get", move |records| {
                records
                    .iter()
                    .find(|record| record.agent_id == agent_id)
                    .cloned()
                    .ok_or_else(|| record_not_found(&agent_id))
            })
            .await
        })
    }

    fn update(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.update")?;
            self.modify("update", move |records| {
                let slot = records
                    .get_mut(&record.agent_id)
                    .ok_or_else(|| record_not_found(&record.agent_id))?;
                *slot = record;
                Ok(())
            })
            .await
        })
    }

    fn delete(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("agent_store.delete")?;
            self.modify("delete", move |records| {
                records
                    .remove(&agent_id)
                    .map(|_| ())
                    .ok_or_else(|| record_not_found(&agent_id))
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
            self.read("list", move |records| Ok(paginate(records, &query)?))
                .await
        })
    }
}

async fn blocking<R>(
    operation: &'static str,
    table: &str,
    work: impl FnOnce() -> Result<R> + Send + 'static,
) -> Result<R>
where
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|error| persistence_error(operation, table, error))?
}

/// Hold the advisory lock for the lifetime of the returned handle.
fn acquire(paths: &DocumentPaths, operation: &'static str, exclusive: bool) -> Result<File> {
    if let Some(parent) = paths.lock.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| persistence_error(operation, &paths.table, error))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&paths.lock)
        .map_err(|error| persistence_error(operation, &paths.table, error))?;
    let locked = if exclusive {
        file.lock_exclusive()
    } else {
        file.lock_shared()
    };
    locked.map_err(|error| persistence_error(operation, &paths.table, error))?;
    Ok(file)
}

fn load(paths: &DocumentPaths, operation: &'static str) -> Result<RecordDocument> {
    match std::fs::read(&paths.document) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|error| {
            persistence_error(operation, &paths.table, format!("document is corrupt: {error}"))
                .with_metadata("path", paths.document.to_string_lossy().into_owned())
        }),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(RecordDocument::default()),
        Err(error) => Err(persistence_error(operation, &paths.table, error)),
    }
}

fn store(paths: &DocumentPaths, operation: &'static str, document: RecordDocument) -> Result<()> {
    let payload = serde_json::to_vec_pretty(&document)
        .map_err(|error| persistence_error(operation, &paths.table, error))?;
    let staging = paths.document.with_extension("json.tmp");
    std::fs::write(&staging, payload)
        .and_then(|()| std::fs::rename(&staging, &paths.document))
        .map_err(|error| persistence_error(operation, &paths.table, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_shared::ErrorCode;

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("code-agent-docstore-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn unsafe_table_names_are_rejected() {
        let error = DocumentAgentStore::in_memory("../agents").err();
        assert_eq!(error.map(|e| e.code), Some(ErrorCode::new("store", "invalid_table_name")));
    }

    #[tokio::test]
    async fn corrupt_document_is_a_persistence_error() -> Result<()> {
        let dir = scratch();
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join("agents.json"), "{\"records\": [").await?;

        let store = DocumentAgentStore::at_directory(&dir, "agents")?;
        let error = store
            .get(&RequestContext::new_request(), AgentId::parse("a1")?)
            .await
            .err();
        assert_eq!(error.map(|e| e.code), Some(ErrorCode::persistence()));
        Ok(())
    }

    #[tokio::test]
    async fn missing_document_reads_as_empty() -> Result<()> {
        let store = DocumentAgentStore::at_directory(scratch(), "agents")?;
        let page = store
            .list(&RequestContext::new_request(), ListAgentsQuery::default())
            .await?;
        assert!(page.records.is_empty());
        assert_eq!(page.next_page_token, None);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_requests_do_not_touch_the_store() -> Result<()> {
        let store = DocumentAgentStore::in_memory("agents")?;
        let ctx = RequestContext::new_request();
        ctx.cancel();
        let error = store.get(&ctx, AgentId::parse("a1")?).await.err();
        assert!(error.is_some_and(|e| e.is_cancelled()));
        Ok(())
    }
}

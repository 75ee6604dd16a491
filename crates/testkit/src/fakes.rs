//! Recording fakes for the provisioning ports.
//!
//! The fakes keep just enough state to behave like the real services
//! (tables exist after `ensure_schema`, data sources belong to a knowledge
//! base, agent versions bump on update) and journal every call.

use crate::journal::{CallJournal, ops};
use code_agent_domain::{
    AgentId, AgentVersion, DataSourceId, HostedAgentId, KnowledgeBaseId, VectorTableName,
};
use code_agent_ports::{
    AgentServicePort, BoxFuture, CheckoutRequest, HostedAgent, KnowledgeBaseServicePort,
    ObjectStorePort, SourceControlClient, SourceControlPort, VectorStoreSchemaPort,
};
use code_agent_shared::{ErrorEnvelope, RequestContext, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Source control fake: checkouts live under a virtual root, nothing touches disk.
#[derive(Debug, Clone)]
pub struct FakeSourceControl {
    journal: CallJournal,
    root: PathBuf,
}

impl FakeSourceControl {
    /// Fake rooted at `/fake/workspace`.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            root: PathBuf::from("/fake/workspace"),
        }
    }
}

impl SourceControlPort for FakeSourceControl {
    fn client(&self, request: CheckoutRequest) -> Arc<dyn SourceControlClient> {
        Arc::new(FakeCheckout {
            journal: self.journal.clone(),
            path: self.root.join(request.checkout_key.as_str()),
            request,
        })
    }
}

/// One fake checkout.
#[derive(Debug)]
pub struct FakeCheckout {
    journal: CallJournal,
    path: PathBuf,
    request: CheckoutRequest,
}

impl SourceControlClient for FakeCheckout {
    fn clone_repository(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<()>> {
        let target = format!("{}#{}", self.request.repository_url, self.request.branch);
        Box::pin(async move { self.journal.record(ops::CLONE, target) })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn cleanup(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal
                .record(ops::CLEANUP, self.path.to_string_lossy())
        })
    }
}

/// Object store fake tracking uploaded prefixes.
#[derive(Debug, Clone)]
pub struct FakeObjectStore {
    journal: CallJournal,
    prefixes: Arc<Mutex<BTreeSet<String>>>,
}

impl FakeObjectStore {
    /// Empty store.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            prefixes: Arc::default(),
        }
    }

    /// Prefixes currently holding a snapshot.
    pub fn prefixes(&self) -> Vec<String> {
        lock(&self.prefixes).iter().cloned().collect()
    }
}

impl ObjectStorePort for FakeObjectStore {
    fn upload_directory(
        &self,
        _ctx: &RequestContext,
        _local_path: PathBuf,
        key_prefix: Box<str>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal.record(ops::UPLOAD, key_prefix.as_ref())?;
            lock(&self.prefixes).insert(key_prefix.into());
            Ok(())
        })
    }

    fn delete_directory(
        &self,
        _ctx: &RequestContext,
        key_prefix: Box<str>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal
                .record(ops::DELETE_SNAPSHOT, key_prefix.as_ref())?;
            lock(&self.prefixes).remove(key_prefix.as_ref());
            Ok(())
        })
    }
}

/// Vector schema fake tracking live tables.
#[derive(Debug, Clone)]
pub struct FakeVectorSchema {
    journal: CallJournal,
    tables: Arc<Mutex<BTreeSet<VectorTableName>>>,
}

impl FakeVectorSchema {
    /// No tables.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            tables: Arc::default(),
        }
    }

    /// Tables currently present.
    pub fn tables(&self) -> Vec<VectorTableName> {
        lock(&self.tables).iter().cloned().collect()
    }
}

impl VectorStoreSchemaPort for FakeVectorSchema {
    fn ensure_schema(
        &self,
        _ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal
                .record(ops::ENSURE_SCHEMA, table_name.as_str())?;
            lock(&self.tables).insert(table_name);
            Ok(())
        })
    }

    fn drop_schema(
        &self,
        _ctx: &RequestContext,
        table_name: VectorTableName,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal.record(ops::DROP_SCHEMA, table_name.as_str())?;
            lock(&self.tables).remove(&table_name);
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct KnowledgeBaseState {
    next_id: u64,
    bases: BTreeMap<String, Vec<DataSourceId>>,
}

/// Knowledge base fake issuing `kb-N` and `ds-N` ids.
#[derive(Debug, Clone)]
pub struct FakeKnowledgeBaseService {
    journal: CallJournal,
    state: Arc<Mutex<KnowledgeBaseState>>,
}

impl FakeKnowledgeBaseService {
    /// No knowledge bases.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    /// Live knowledge base ids.
    pub fn knowledge_bases(&self) -> Vec<String> {
        lock(&self.state).bases.keys().cloned().collect()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = lock(&self.state);
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

impl KnowledgeBaseServicePort for FakeKnowledgeBaseService {
    fn create(
        &self,
        _ctx: &RequestContext,
        source_table: VectorTableName,
    ) -> BoxFuture<'_, Result<KnowledgeBaseId>> {
        Box::pin(async move {
            self.journal.record(ops::KB_CREATE, source_table.as_str())?;
            let id = self.next_id("kb");
            lock(&self.state).bases.insert(id.clone(), Vec::new());
            KnowledgeBaseId::parse(id).map_err(ErrorEnvelope::from)
        })
    }

    fn delete(
        &self,
        _ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal
                .record(ops::KB_DELETE, knowledge_base_id.as_str())?;
            lock(&self.state).bases.remove(knowledge_base_id.as_str());
            Ok(())
        })
    }

    fn create_data_source(
        &self,
        _ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<DataSourceId>> {
        Box::pin(async move {
            self.journal
                .record(ops::DS_CREATE, knowledge_base_id.as_str())?;
            let id = DataSourceId::parse(self.next_id("ds")).map_err(ErrorEnvelope::from)?;
            lock(&self.state)
                .bases
                .entry(knowledge_base_id.as_str().to_owned())
                .or_default()
                .push(id.clone());
            Ok(id)
        })
    }

    fn list_data_sources(
        &self,
        _ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<Vec<DataSourceId>>> {
        Box::pin(async move {
            self.journal
                .record(ops::DS_LIST, knowledge_base_id.as_str())?;
            Ok(lock(&self.state)
                .bases
                .get(knowledge_base_id.as_str())
                .cloned()
                .unwrap_or_default())
        })
    }

    fn delete_data_source(
        &self,
        _ctx: &RequestContext,
        knowledge_base_id: KnowledgeBaseId,
        data_source_id: DataSourceId,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal
                .record(ops::DS_DELETE, data_source_id.as_str())?;
            if let Some(sources) = lock(&self.state).bases.get_mut(knowledge_base_id.as_str()) {
                sources.retain(|source| source != &data_source_id);
            }
            Ok(())
        })
    }
}

/// Agent host fake: registrations `hosted-1`, `hosted-2`, ... and versions
/// `v1`, `v2`, ... per agent.
#[derive(Debug, Clone)]
pub struct FakeAgentService {
    journal: CallJournal,
    state: Arc<Mutex<HostedState>>,
}

#[derive(Debug, Default)]
struct HostedState {
    next_id: u32,
    registrations: BTreeMap<HostedAgentId, (AgentId, KnowledgeBaseId)>,
    versions: BTreeMap<AgentId, u32>,
}

impl HostedState {
    fn bump(&mut self, agent_id: &AgentId) -> Result<AgentVersion> {
        let version = self.versions.entry(agent_id.clone()).or_insert(0);
        *version += 1;
        AgentVersion::parse(format!("v{version}")).map_err(ErrorEnvelope::from)
    }
}

impl FakeAgentService {
    /// No agents.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    /// Agents with at least one live registration.
    pub fn agents(&self) -> Vec<AgentId> {
        let state = lock(&self.state);
        let owners: BTreeSet<AgentId> = state
            .registrations
            .values()
            .map(|(agent_id, _)| agent_id.clone())
            .collect();
        owners.into_iter().collect()
    }

    /// Live registrations.
    pub fn registrations(&self) -> Vec<HostedAgentId> {
        lock(&self.state).registrations.keys().cloned().collect()
    }

    /// Knowledge base a live registration answers from.
    pub fn knowledge_base_of(&self, hosted_agent_id: &HostedAgentId) -> Option<KnowledgeBaseId> {
        lock(&self.state)
            .registrations
            .get(hosted_agent_id)
            .map(|(_, knowledge_base_id)| knowledge_base_id.clone())
    }
}

impl AgentServicePort for FakeAgentService {
    fn create(
        &self,
        _ctx: &RequestContext,
        agent_id: AgentId,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<HostedAgent>> {
        Box::pin(async move {
            self.journal.record(
                ops::AGENT_CREATE,
                format!("{agent_id}@{knowledge_base_id}"),
            )?;
            let mut state = lock(&self.state);
            state.next_id += 1;
            let hosted_agent_id = HostedAgentId::parse(format!("hosted-{}", state.next_id))?;
            let agent_version = state.bump(&agent_id)?;
            state
                .registrations
                .insert(hosted_agent_id.clone(), (agent_id, knowledge_base_id));
            Ok(HostedAgent {
                hosted_agent_id,
                agent_version,
            })
        })
    }

    fn update(
        &self,
        _ctx: &RequestContext,
        hosted_agent_id: HostedAgentId,
        knowledge_base_id: KnowledgeBaseId,
    ) -> BoxFuture<'_, Result<AgentVersion>> {
        Box::pin(async move {
            self.journal.record(
                ops::AGENT_UPDATE,
                format!("{hosted_agent_id}@{knowledge_base_id}"),
            )?;
            let mut state = lock(&self.state);
            let Some((agent_id, bound)) = state.registrations.get_mut(&hosted_agent_id) else {
                return Err(ErrorEnvelope::not_found(format!(
                    "hosted agent {hosted_agent_id} not found"
                )));
            };
            *bound = knowledge_base_id;
            let agent_id = agent_id.clone();
            state.bump(&agent_id)
        })
    }

    fn delete(
        &self,
        _ctx: &RequestContext,
        hosted_agent_id: HostedAgentId,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal
                .record(ops::AGENT_DELETE, hosted_agent_id.as_str())?;
            lock(&self.state).registrations.remove(&hosted_agent_id);
            Ok(())
        })
    }
}

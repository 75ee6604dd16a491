//! Shared call journal with failure injection.
//!
//! Every fake appends to one journal, so tests can assert on the global
//! order of collaborator calls as well as on per-operation counts.

use code_agent_shared::{ErrorEnvelope, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operation labels recorded by the fakes.
pub mod ops {
    /// `SourceControlClient::clone_repository`.
    pub const CLONE: &str = "source_control.clone";
    /// `SourceControlClient::cleanup`.
    pub const CLEANUP: &str = "source_control.cleanup";
    /// `ObjectStorePort::upload_directory`.
    pub const UPLOAD: &str = "object_store.upload";
    /// `ObjectStorePort::delete_directory`.
    pub const DELETE_SNAPSHOT: &str = "object_store.delete";
    /// `VectorStoreSchemaPort::ensure_schema`.
    pub const ENSURE_SCHEMA: &str = "schema.ensure";
    /// `VectorStoreSchemaPort::drop_schema`.
    pub const DROP_SCHEMA: &str = "schema.drop";
    /// `KnowledgeBaseServicePort::create`.
    pub const KB_CREATE: &str = "kb.create";
    /// `KnowledgeBaseServicePort::delete`.
    pub const KB_DELETE: &str = "kb.delete";
    /// `KnowledgeBaseServicePort::create_data_source`.
    pub const DS_CREATE: &str = "kb.create_data_source";
    /// `KnowledgeBaseServicePort::list_data_sources`.
    pub const DS_LIST: &str = "kb.list_data_sources";
    /// `KnowledgeBaseServicePort::delete_data_source`.
    pub const DS_DELETE: &str = "kb.delete_data_source";
    /// `AgentServicePort::create`.
    pub const AGENT_CREATE: &str = "agent.create";
    /// `AgentServicePort::update`.
    pub const AGENT_UPDATE: &str = "agent.update";
    /// `AgentServicePort::delete`.
    pub const AGENT_DELETE: &str = "agent.delete";
    /// `AgentRecordStorePort::create`.
    pub const STORE_CREATE: &str = "store.create";
    /// `AgentRecordStorePort::get`.
    pub const STORE_GET: &str = "store.get";
    /// `AgentRecordStorePort::update`.
    pub const STORE_UPDATE: &str = "store.update";
    /// `AgentRecordStorePort::delete`.
    pub const STORE_DELETE: &str = "store.delete";
    /// `AgentRecordStorePort::list`.
    pub const STORE_LIST: &str = "store.list";

    /// Every provisioning and teardown operation (everything but the store).
    pub const BUILDER_OPS: [&str; 14] = [
        CLONE,
        CLEANUP,
        UPLOAD,
        DELETE_SNAPSHOT,
        ENSURE_SCHEMA,
        DROP_SCHEMA,
        KB_CREATE,
        KB_DELETE,
        DS_CREATE,
        DS_LIST,
        DS_DELETE,
        AGENT_CREATE,
        AGENT_UPDATE,
        AGENT_DELETE,
    ];
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Operation label, see [`ops`].
    pub op: &'static str,
    /// Main argument (table, id, path...).
    pub target: String,
}

#[derive(Debug, Clone)]
struct Injected {
    error: ErrorEnvelope,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct JournalState {
    calls: Vec<Call>,
    failures: HashMap<&'static str, Injected>,
}

/// Call journal shared by a set of fakes.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    state: Arc<Mutex<JournalState>>,
}

impl CallJournal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call to `op` fail with `error`.
    pub fn fail(&self, op: &'static str, error: ErrorEnvelope) {
        self.lock().failures.insert(
            op,
            Injected {
                error,
                remaining: None,
            },
        );
    }

    /// Make only the next call to `op` fail with `error`.
    pub fn fail_once(&self, op: &'static str, error: ErrorEnvelope) {
        self.lock().failures.insert(
            op,
            Injected {
                error,
                remaining: Some(1),
            },
        );
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Forget recorded calls (failures stay armed).
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Record a call, returning the injected failure if one is armed.
    pub fn record(&self, op: &'static str, target: impl Into<String>) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call {
            op,
            target: target.into(),
        });
        let (error, exhausted) = match state.failures.get_mut(op) {
            None => return Ok(()),
            Some(injected) => {
                let exhausted = match injected.remaining.as_mut() {
                    Some(remaining) if *remaining <= 1 => true,
                    Some(remaining) => {
                        *remaining -= 1;
                        false
                    },
                    None => false,
                };
                (injected.error.clone(), exhausted)
            },
        };
        if exhausted {
            state.failures.remove(op);
        }
        Err(error)
    }

    /// All calls, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Operation labels, in order.
    pub fn ops(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(|call| call.op).collect()
    }

    /// Number of calls to `op`.
    pub fn count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|call| call.op == op).count()
    }

    /// Targets passed to `op`, in order.
    pub fn targets(&self, op: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .map(|call| call.target.clone())
            .collect()
    }

    /// Number of provisioning or teardown calls (store calls excluded).
    pub fn builder_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| ops::BUILDER_OPS.contains(&call.op))
            .count()
    }

    /// True when no call was recorded at all.
    pub fn is_empty(&self) -> bool {
        self.lock().calls.is_empty()
    }
}

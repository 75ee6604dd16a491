//! In-memory adapter implementations for port contracts.
//!
//! These implementations are intended for:
//! - Unit/integration tests
//! - Deterministic contract tests for the ports layer
//! - Local experimentation without external dependencies

use crate::journal::{CallJournal, ops};
use code_agent_domain::{AgentId, AgentPage, AgentRecord, ListAgentsQuery, paginate};
use code_agent_ports::{
    AgentRecordStorePort, BoxFuture, ClockPort, LogEvent, LogFields, LoggerPort, TelemetryPort,
    TelemetryTags, TelemetryTimer, record_already_exists, record_not_found,
};
use code_agent_shared::{ErrorEnvelope, RequestContext, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

/// A no-op logger implementation.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl LoggerPort for NoopLogger {
    fn log(&self, _event: LogEvent) {}

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(Self)
    }
}

/// A no-op telemetry timer.
#[derive(Debug, Default)]
pub struct NoopTimer;

impl TelemetryTimer for NoopTimer {
    fn stop(&self) {}
}

/// A no-op telemetry implementation.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl TelemetryPort for NoopTelemetry {
    fn increment_counter(&self, _name: &str, _value: u64, _tags: Option<&TelemetryTags>) {}

    fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}

    fn start_timer(&self, _name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(NoopTimer)
    }
}

/// Logger that keeps every event for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
    base_fields: LogFields,
}

impl RecordingLogger {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far, including those from child loggers.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event names, in order.
    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|event| event.event.into())
            .collect()
    }

    /// True when an event named `name` was logged.
    pub fn contains(&self, name: &str) -> bool {
        self.events().iter().any(|event| event.event.as_ref() == name)
    }

    /// First event named `name`.
    pub fn find(&self, name: &str) -> Option<LogEvent> {
        self.events()
            .into_iter()
            .find(|event| event.event.as_ref() == name)
    }
}

impl LoggerPort for RecordingLogger {
    fn log(&self, mut event: LogEvent) {
        if !self.base_fields.is_empty() {
            let mut fields = self.base_fields.clone();
            fields.extend(event.fields.take().unwrap_or_default());
            event.fields = Some(fields);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut base_fields = self.base_fields.clone();
        base_fields.extend(fields);
        Box::new(Self {
            events: Arc::clone(&self.events),
            base_fields,
        })
    }
}

/// Clock returning a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now_ms: AtomicU64,
}

impl FixedClock {
    /// Clock frozen at `now_ms`.
    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(1_700_000_000_000)
    }
}

impl ClockPort for FixedClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// In-memory agent record store with conditioned writes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgentStore {
    journal: CallJournal,
    records: Arc<RwLock<BTreeMap<AgentId, AgentRecord>>>,
}

impl InMemoryAgentStore {
    /// Empty store with a private journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store journaling into `journal`.
    pub fn with_journal(journal: CallJournal) -> Self {
        Self {
            journal,
            records: Arc::default(),
        }
    }

    /// Current contents, bypassing the journal.
    pub async fn snapshot(&self) -> Vec<AgentRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Stored record, bypassing the journal.
    pub async fn peek(&self, agent_id: &AgentId) -> Option<AgentRecord> {
        self.records.read().await.get(agent_id).cloned()
    }
}

impl AgentRecordStorePort for InMemoryAgentStore {
    fn create(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.create")?;
            self.journal
                .record(ops::STORE_CREATE, record.agent_id.as_str())?;
            let mut records = self.records.write().await;
            if records.contains_key(&record.agent_id) {
                return Err(record_already_exists(&record.agent_id));
            }
            records.insert(record.agent_id.clone(), record);
            Ok(())
        })
    }

    fn get(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<AgentRecord>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.get")?;
            self.journal.record(ops::STORE_GET, agent_id.as_str())?;
            self.records
                .read()
                .await
                .get(&agent_id)
                .cloned()
                .ok_or_else(|| record_not_found(&agent_id))
        })
    }

    fn update(&self, ctx: &RequestContext, record: AgentRecord) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.update")?;
            self.journal
                .record(ops::STORE_UPDATE, record.agent_id.as_str())?;
            let mut records = self.records.write().await;
            let Some(slot) = records.get_mut(&record.agent_id) else {
                return Err(record_not_found(&record.agent_id));
            };
            *slot = record;
            Ok(())
        })
    }

    fn delete(&self, ctx: &RequestContext, agent_id: AgentId) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.delete")?;
            self.journal.record(ops::STORE_DELETE, agent_id.as_str())?;
            self.records
                .write()
                .await
                .remove(&agent_id)
                .map(|_| ())
                .ok_or_else(|| record_not_found(&agent_id))
        })
    }

    fn list(
        &self,
        ctx: &RequestContext,
        query: ListAgentsQuery,
    ) -> BoxFuture<'_, Result<AgentPage>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.list")?;
            self.journal.record(ops::STORE_LIST, "")?;
            let records = self.records.read().await;
            paginate(records.values(), &query).map_err(ErrorEnvelope::from)
        })
    }
}

//! # code-agent-testkit
//!
//! Test helpers, recording fakes and in-memory adapters.
//! This crate depends on `ports`, `domain` and `shared`.

pub mod errors;
pub mod fakes;
pub mod in_memory;
pub mod journal;

pub use fakes::{
    FakeAgentService, FakeCheckout, FakeKnowledgeBaseService, FakeObjectStore,
    FakeSourceControl, FakeVectorSchema,
};
pub use in_memory::{
    FixedClock, InMemoryAgentStore, NoopLogger, NoopTelemetry, NoopTimer, RecordingLogger,
};
pub use journal::{Call, CallJournal, ops};

/// One journal plus a fake for every collaborator, all wired to it.
#[derive(Debug, Clone)]
pub struct FakeCollaborators {
    /// Shared call journal.
    pub journal: CallJournal,
    /// Checkouts.
    pub source_control: FakeSourceControl,
    /// Snapshot storage.
    pub object_store: FakeObjectStore,
    /// Vector tables.
    pub schema: FakeVectorSchema,
    /// Knowledge bases.
    pub knowledge_bases: FakeKnowledgeBaseService,
    /// Hosted agents.
    pub agents: FakeAgentService,
    /// Agent records.
    pub store: InMemoryAgentStore,
}

impl FakeCollaborators {
    /// Fresh fakes sharing one journal.
    pub fn new() -> Self {
        let journal = CallJournal::new();
        Self {
            source_control: FakeSourceControl::new(journal.clone()),
            object_store: FakeObjectStore::new(journal.clone()),
            schema: FakeVectorSchema::new(journal.clone()),
            knowledge_bases: FakeKnowledgeBaseService::new(journal.clone()),
            agents: FakeAgentService::new(journal.clone()),
            store: InMemoryAgentStore::with_journal(journal.clone()),
            journal,
        }
    }
}

impl Default for FakeCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the testkit crate version.
#[must_use]
pub const fn testkit_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_ports::ports_crate_version;
    use code_agent_shared::shared_crate_version;

    #[test]
    fn testkit_crate_compiles() {
        let version = testkit_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn testkit_can_use_ports_and_shared() {
        assert!(!ports_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }

    #[test]
    fn error_fixtures_are_available() {
        let codes = errors::common_error_codes();
        assert!(!codes.is_empty());
    }

    #[test]
    fn fakes_share_one_journal() {
        let fakes = FakeCollaborators::new();
        assert!(fakes.journal.is_empty());
    }
}

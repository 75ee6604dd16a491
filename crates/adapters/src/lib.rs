//! # code-agent-adapters
//!
//! Local implementations of the provisioning ports: record stores, vector
//! table management, snapshot storage, git checkouts, the in-process
//! knowledge base and agent hosting services, and JSON logging/telemetry.
//! This crate depends on `ports`, `domain`, and `shared` only.

pub mod agent_host;
pub mod clock;
pub mod knowledge_base;
pub mod log_sink;
pub mod logger;
pub mod object_store;
pub mod registry;
pub mod source_control;
pub mod store;
pub mod telemetry;
pub mod vector_schema;

pub use agent_host::{HostedAgentEntry, LocalAgentHost};
pub use clock::SystemClock;
pub use knowledge_base::{KnowledgeBaseEntry, LocalKnowledgeBaseService};
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::JsonLogger;
pub use object_store::LocalObjectStore;
pub use source_control::{GitCheckout, GitSourceControl};
#[cfg(feature = "store-postgres")]
pub use store::PostgresAgentStore;
pub use store::{DocumentAgentStore, SqliteAgentStore};
pub use telemetry::JsonTelemetry;
#[cfg(feature = "store-postgres")]
pub use vector_schema::PostgresVectorSchema;
pub use vector_schema::SqliteVectorSchema;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! # code-agent-ports
//!
//! Port traits for the code-agent hexagonal architecture.
//!
//! This crate defines the interfaces between the provisioning use cases and
//! the infrastructure that carries them out. It depends only on `domain` and
//! `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod agent_service;
pub mod agent_store;
pub mod clock;
pub mod knowledge_base;
pub mod logger;
pub mod object_store;
pub mod source_control;
pub mod telemetry;
pub mod vector_schema;

pub use agent_service::*;
pub use agent_store::*;
pub use clock::*;
pub use knowledge_base::*;
pub use logger::*;
pub use object_store::*;
pub use source_control::*;
pub use telemetry::*;
pub use vector_schema::*;

//! # code-agent-domain
//!
//! Domain entities, primitives, and value objects for agent provisioning.
//!
//! - **Primitives** - `AgentId`, `RepositoryUrl`, `VectorTableName`, ...
//! - **Agent** - `AgentRecord` and `ProvisioningTarget`
//! - **Status** - `AgentStatus` lifecycle
//! - **Provider** - `AiProvider` and validated `ProviderConfig` payloads
//! - **Page** - listing order, page sizes and opaque cursors
//! - **Commands** - validated inputs for the agent use cases
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub use code_agent_shared::shared_crate_version;

pub mod agent;
pub mod commands;
pub mod page;
pub mod primitives;
pub mod provider;
pub mod status;

pub use agent::{AgentRecord, ProvisioningTarget};
pub use commands::{CreateAgentCommand, ListAgentsCommand, UpdateAgentCommand};
pub use page::{
    AgentPage, DEFAULT_PAGE_SIZE, ListAgentsQuery, ListCursor, MAX_PAGE_SIZE, PageError,
    PageSize, PageToken, listing_order, paginate,
};
pub use primitives::{
    AgentId, AgentName, AgentVersion, BranchName, CheckoutKey, DEFAULT_BRANCH, DataSourceId,
    HostedAgentId, KnowledgeBaseId, PrimitiveError, ProvisioningFingerprint, RepositoryUrl,
    VectorTableName, derive_checkout_key, derive_vector_table_name,
};
pub use provider::{
    AiProvider, BedrockProviderConfig, LocalProviderConfig, OpenAiProviderConfig,
    ProviderConfig, ProviderConfigError,
};
pub use status::{AgentStatus, StatusTransitionError};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

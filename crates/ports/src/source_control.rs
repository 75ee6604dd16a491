//! Source control boundary contract.

use crate::BoxFuture;
use code_agent_domain::{BranchName, CheckoutKey, RepositoryUrl};
use code_agent_shared::{RequestContext, Result};
use std::path::Path;
use std::sync::Arc;

/// What to check out and where it lives locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Repository to clone.
    pub repository_url: RepositoryUrl,
    /// Branch to clone.
    pub branch: BranchName,
    /// Deterministic local directory component.
    pub checkout_key: CheckoutKey,
}

/// A single checkout of a repository.
///
/// `path` is known before `clone_repository` runs, so teardown can address
/// the snapshot of a previous checkout without cloning again.
pub trait SourceControlClient: Send + Sync {
    /// Clone the repository into [`SourceControlClient::path`].
    fn clone_repository(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>>;

    /// Local path of the checkout.
    fn path(&self) -> &Path;

    /// Remove the local checkout. Idempotent.
    fn cleanup(&self) -> BoxFuture<'_, Result<()>>;
}

/// Factory for checkouts.
pub trait SourceControlPort: Send + Sync {
    /// Create a client for `request`. No I/O happens until a client method runs.
    fn client(&self, request: CheckoutRequest) -> Arc<dyn SourceControlClient>;
}

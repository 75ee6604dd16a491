//! Durable snapshot storage boundary contract.

use crate::BoxFuture;
use code_agent_shared::{RequestContext, Result};
use std::path::PathBuf;

/// Stores directory snapshots under a key prefix.
pub trait ObjectStorePort: Send + Sync {
    /// Upload every file under `local_path`, keyed below `key_prefix`.
    fn upload_directory(
        &self,
        ctx: &RequestContext,
        local_path: PathBuf,
        key_prefix: Box<str>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Remove everything below `key_prefix`. Removing an absent prefix succeeds.
    fn delete_directory(
        &self,
        ctx: &RequestContext,
        key_prefix: Box<str>,
    ) -> BoxFuture<'_, Result<()>>;
}

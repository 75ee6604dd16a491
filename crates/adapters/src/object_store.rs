//! Filesystem-backed snapshot storage.
//!
//! A key prefix maps to `<root>/<prefix components>`. Prefixes are usually
//! absolute checkout paths, so the leading separator is dropped and any
//! `.`/`..` component is discarded before joining.

use code_agent_ports::{BoxFuture, ObjectStorePort};
use code_agent_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

const SKIPPED_DIRS: [&str; 1] = [".git"];

/// Copies directory trees below a local root.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the objects stored below `key_prefix`.
    pub fn prefix_path(&self, key_prefix: &str) -> Result<PathBuf> {
        let relative = sanitize_prefix(key_prefix)?;
        Ok(self.root.join(relative))
    }
}

impl ObjectStorePort for LocalObjectStore {
    fn upload_directory(
        &self,
        ctx: &RequestContext,
        local_path: PathBuf,
        key_prefix: Box<str>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("object_store.upload")?;
            let destination = self.prefix_path(&key_prefix)?;
            let metadata = tokio::fs::metadata(&local_path).await.map_err(|error| {
                ErrorEnvelope::from(error)
                    .with_metadata("path", local_path.to_string_lossy().into_owned())
            })?;
            if !metadata.is_dir() {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "snapshot source is not a directory",
                )
                .with_metadata("path", local_path.to_string_lossy().into_owned()));
            }

            // Uploading the same prefix twice leaves exactly the latest tree.
            remove_tree(&destination).await?;
            let files = copy_tree(&ctx, &local_path, &destination).await?;
            tracing::debug!(
                prefix = %key_prefix,
                files,
                destination = %destination.display(),
                "snapshot uploaded"
            );
            Ok(())
        })
    }

    fn delete_directory(
        &self,
        ctx: &RequestContext,
        key_prefix: Box<str>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("object_store.delete")?;
            let destination = self.prefix_path(&key_prefix)?;
            remove_tree(&destination).await
        })
    }
}

fn sanitize_prefix(key_prefix: &str) -> Result<PathBuf> {
    let relative: PathBuf = Path::new(key_prefix.trim())
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            Component::Prefix(_) | Component::RootDir | Component::CurDir | Component::ParentDir => {
                None
            },
        })
        .collect();
    if relative.as_os_str().is_empty() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "object key prefix has no usable path components",
        )
        .with_metadata("key_prefix", key_prefix));
    }
    Ok(relative)
}

async fn remove_tree(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(ErrorEnvelope::from(error)
            .with_metadata("path", path.to_string_lossy().into_owned())),
    }
}

/// Copy regular files from `source` into `destination`; returns the file count.
async fn copy_tree(ctx: &RequestContext, source: &Path, destination: &Path) -> Result<u64> {
    let mut pending = vec![(source.to_path_buf(), destination.to_path_buf())];
    let mut copied = 0_u64;

    while let Some((from_dir, to_dir)) = pending.pop() {
        ctx.ensure_not_cancelled("object_store.upload")?;
        tokio::fs::create_dir_all(&to_dir).await?;
        let mut entries = tokio::fs::read_dir(&from_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if SKIPPED_DIRS.iter().any(|skipped| name == *skipped) {
                    continue;
                }
                pending.push((entry.path(), to_dir.join(&name)));
            } else if file_type.is_file() {
                tokio::fs::copy(entry.path(), to_dir.join(&name)).await?;
                copied += 1;
            }
            // Symlinks and special files are not part of a snapshot.
        }
    }
    Ok(copied)
}

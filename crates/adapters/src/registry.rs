//! JSON-file state shared by the in-process hosting services.
//!
//! State is loaded lazily on first use and rewritten after every successful
//! mutation (temp file + rename). Without a path the registry is memory-only.

use code_agent_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Serialized, lazily loaded state of type `T`.
#[derive(Debug)]
pub struct JsonRegistry<T> {
    path: Option<PathBuf>,
    state: Mutex<Option<T>>,
}

impl<T> JsonRegistry<T>
where
    T: Serialize + DeserializeOwned + Default + Send,
{
    /// Registry persisted at `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            state: Mutex::new(None),
        }
    }

    /// Registry that lives and dies with the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(None),
        }
    }

    /// Backing file, when persistent.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the state.
    pub async fn read<R>(&self, reader: impl FnOnce(&T) -> R) -> Result<R> {
        let mut guard = self.state.lock().await;
        let state = self.loaded(&mut guard).await?;
        Ok(reader(state))
    }

    /// Mutate the state; it is persisted only when `mutate` succeeds.
    pub async fn update<R>(&self, mutate: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut guard = self.state.lock().await;
        let state = self.loaded(&mut guard).await?;
        let mut next = clone_via_json(state)?;
        let outcome = mutate(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(outcome)
    }

    async fn loaded<'a>(&self, slot: &'a mut Option<T>) -> Result<&'a mut T> {
        if slot.is_none() {
            *slot = Some(self.load().await?);
        }
        slot.as_mut()
            .ok_or_else(|| ErrorEnvelope::invariant(ErrorCode::internal(), "registry state missing"))
    }

    async fn load(&self) -> Result<T> {
        let Some(path) = self.path.as_ref() else {
            return Ok(T::default());
        };
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|error| {
                registry_error("corrupt", path, format!("failed to parse registry: {error}"))
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(error) => Err(ErrorEnvelope::from(error)
                .with_metadata("path", path.to_string_lossy().into_owned())),
        }
    }

    async fn persist(&self, state: &T) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(state).map_err(|error| {
            registry_error("serialize", path, format!("failed to encode registry: {error}"))
        })?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, payload).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}

fn clone_via_json<T: Serialize + DeserializeOwned>(state: &T) -> Result<T> {
    serde_json::to_value(state)
        .and_then(serde_json::from_value)
        .map_err(|error| {
            ErrorEnvelope::invariant(
                ErrorCode::internal(),
                format!("registry state is not round-trippable: {error}"),
            )
        })
}

fn registry_error(code: &str, path: &Path, message: String) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("registry", code),
        message,
        ErrorClass::NonRetriable,
    )
    .with_metadata("path", path.to_string_lossy().into_owned())
}

//! Git checkouts through the `git` CLI.
//!
//! Each checkout lives at `<workspace_root>/<checkout_key>`. The key is
//! derived from the attempt's vector table name, so the path is known before
//! cloning and a later teardown can address the same snapshot prefix.

use code_agent_domain::RepositoryUrl;
use code_agent_ports::{BoxFuture, CheckoutRequest, SourceControlClient, SourceControlPort};
use code_agent_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Factory handing out one [`GitCheckout`] per request.
#[derive(Debug, Clone)]
pub struct GitSourceControl {
    workspace_root: PathBuf,
    git_binary: Box<str>,
}

impl GitSourceControl {
    /// Checkouts go below `workspace_root`.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            git_binary: "git".into(),
        }
    }

    /// Use another `git` executable.
    #[must_use]
    pub fn with_git_binary(mut self, binary: impl Into<Box<str>>) -> Self {
        self.git_binary = binary.into();
        self
    }

    /// Root every checkout lives under.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

impl SourceControlPort for GitSourceControl {
    fn client(&self, request: CheckoutRequest) -> Arc<dyn SourceControlClient> {
        let path = self.workspace_root.join(request.checkout_key.as_str());
        Arc::new(GitCheckout {
            request,
            path,
            git_binary: self.git_binary.clone(),
        })
    }
}

/// A single shallow clone of one branch.
#[derive(Debug, Clone)]
pub struct GitCheckout {
    request: CheckoutRequest,
    path: PathBuf,
    git_binary: Box<str>,
}

impl SourceControlClient for GitCheckout {
    fn clone_repository(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("source_control.clone")?;
            remove_dir_if_present(&self.path).await?;
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let repository = display_url(&self.request.repository_url);
            tracing::debug!(
                repository = %repository,
                branch = %self.request.branch,
                path = %self.path.display(),
                "cloning repository"
            );

            let mut command = Command::new(self.git_binary.as_ref());
            command
                .arg("clone")
                .arg("--depth")
                .arg("1")
                .arg("--branch")
                .arg(self.request.branch.as_str())
                .arg("--")
                .arg(self.request.repository_url.as_str())
                .arg(&self.path)
                .env("GIT_TERMINAL_PROMPT", "0")
                .kill_on_drop(true);

            let output = tokio::select! {
                output = command.output() => {
                    output.map_err(|error| spawn_failed(&self.git_binary, &error))?
                },
                () = ctx.cancelled() => {
                    return Err(ErrorEnvelope::cancelled("clone cancelled")
                        .with_metadata("operation", "source_control.clone"));
                },
            };

            if output.status.success() {
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ErrorEnvelope::unexpected(
                ErrorCode::new("source_control", "clone_failed"),
                format!("git clone failed: {}", stderr.trim()),
                ErrorClass::Retriable,
            )
            .with_metadata("repository", repository)
            .with_metadata("branch", self.request.branch.as_str())
            .with_metadata(
                "exit_code",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_owned(), |code| code.to_string()),
            ))
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn cleanup(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { remove_dir_if_present(&self.path).await })
    }
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(ErrorEnvelope::from(error)
            .with_metadata("path", path.to_string_lossy().into_owned())),
    }
}

fn spawn_failed(binary: &str, error: &std::io::Error) -> ErrorEnvelope {
    let class = if error.kind() == ErrorKind::NotFound {
        ErrorClass::NonRetriable
    } else {
        ErrorClass::Retriable
    };
    ErrorEnvelope::unexpected(
        ErrorCode::new("source_control", "git_unavailable"),
        format!("failed to run {binary}: {error}"),
        class,
    )
    .with_metadata("binary", binary)
}

/// Repository URL without user info, safe for logs and error metadata.
fn display_url(url: &RepositoryUrl) -> String {
    match url::Url::parse(url.as_str()) {
        Ok(mut parsed) if parsed.has_authority() => {
            // Both setters only fail for cannot-be-a-base URLs, excluded above.
            let _ = parsed.set_password(None);
            let _ = parsed.set_username("");
            parsed.to_string()
        },
        _ => url.as_str().to_owned(),
    }
}

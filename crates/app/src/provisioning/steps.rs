//! Provisioning step names and step-tagged errors.

use crate::observability::{Observer, duration_ms, fields};
use code_agent_ports::{LogLevel, telemetry_tags};
use code_agent_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Instant;

/// One externally visible provisioning or teardown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisioningStep {
    /// Clone the repository locally.
    CloneRepository,
    /// Create the vector table.
    EnsureSchema,
    /// Create the knowledge base.
    CreateKnowledgeBase,
    /// Upload the repository snapshot.
    UploadSnapshot,
    /// Bind the snapshot to the knowledge base.
    CreateDataSource,
    /// Unbind snapshots from the knowledge base.
    DeleteDataSource,
    /// Remove the uploaded snapshot.
    DeleteSnapshot,
    /// Delete the knowledge base.
    DeleteKnowledgeBase,
    /// Drop the vector table.
    DropSchema,
    /// Register the hosted agent.
    CreateAgent,
    /// Rebind the hosted agent to a new knowledge base.
    UpdateAgent,
    /// Delete the hosted agent.
    DeleteAgent,
}

impl ProvisioningStep {
    /// Stable snake_case label, used as the `step` metadata value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CloneRepository => "clone_repository",
            Self::EnsureSchema => "ensure_schema",
            Self::CreateKnowledgeBase => "create_knowledge_base",
            Self::UploadSnapshot => "upload_snapshot",
            Self::CreateDataSource => "create_data_source",
            Self::DeleteDataSource => "delete_data_source",
            Self::DeleteSnapshot => "delete_snapshot",
            Self::DeleteKnowledgeBase => "delete_knowledge_base",
            Self::DropSchema => "drop_schema",
            Self::CreateAgent => "create_agent",
            Self::UpdateAgent => "update_agent",
            Self::DeleteAgent => "delete_agent",
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A collaborator failed during `step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningError {
    /// Step that failed.
    pub step: ProvisioningStep,
    /// Collaborator error.
    pub cause: ErrorEnvelope,
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} failed: {}", self.step, self.cause.message)
    }
}

impl std::error::Error for ProvisioningError {}

impl From<ProvisioningError> for ErrorEnvelope {
    fn from(error: ProvisioningError) -> Self {
        let message = error.to_string();
        let mut envelope = Self::unexpected(ErrorCode::provisioning(), message, error.cause.class)
            .with_metadata("step", error.step.as_str())
            .with_metadata("cause_code", error.cause.code.to_string());
        for (key, value) in error.cause.metadata {
            envelope = envelope.with_metadata(format!("cause.{key}"), value);
        }
        envelope
    }
}

/// Wrap a collaborator failure; cancellations pass through untouched.
pub fn step_failed(step: ProvisioningStep, cause: ErrorEnvelope) -> ErrorEnvelope {
    if cause.is_cancelled() {
        cause
    } else {
        ProvisioningError { step, cause }.into()
    }
}

/// Run one step: cancellation check, timer, debug events, error tagging.
///
/// `call` is only invoked when the context is still live.
pub(crate) async fn run_step<T, F, Fut>(
    ctx: &RequestContext,
    observer: &Observer,
    step: ProvisioningStep,
    call: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    ctx.ensure_not_cancelled(step.as_str())?;
    let tags = telemetry_tags([("step", step.as_str())]);
    let timer = observer.timer(&format!("provisioning.{step}"), Some(&tags));
    let started_at = Instant::now();

    let result = call().await.map_err(|cause| step_failed(step, cause));

    if let Some(timer) = timer.as_ref() {
        timer.stop();
    }
    let mut log_fields = fields([
        ("step", Value::from(step.as_str())),
        ("durationMs", Value::from(duration_ms(started_at))),
        ("correlationId", Value::from(ctx.correlation_id().as_str())),
    ]);
    match &result {
        Ok(_) => observer.log(
            LogLevel::Debug,
            &format!("provisioning.{step}.completed"),
            "provisioning step completed",
            log_fields,
        ),
        Err(error) => {
            observer.count("provisioning.step.failed", Some(&tags));
            log_fields.insert("category".into(), Value::from(error.category().as_str()));
            observer.log_failure(
                LogLevel::Debug,
                &format!("provisioning.{step}.failed"),
                "provisioning step failed",
                log_fields,
                error,
            );
        },
    }
    result
}

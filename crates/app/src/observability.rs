//! Logging and telemetry plumbing shared by every use case.
//!
//! Both sinks are optional. A use case wraps its body in [`Observer::run`],
//! which emits `agents.<op>.start|completed|failed|aborted` events, a
//! `agents.<op>.total` timer and outcome counters.

use code_agent_ports::{
    LogEvent, LogFields, LogLevel, LoggerPort, TelemetryPort, TelemetryTags, TelemetryTimer,
};
use code_agent_shared::{ErrorEnvelope, ErrorKind, RequestContext, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Optional logger and telemetry sinks.
#[derive(Clone, Default)]
pub struct Observer {
    /// Structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Counter/timer sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl Observer {
    /// Observer with both sinks.
    #[must_use]
    pub fn new(logger: Arc<dyn LoggerPort>, telemetry: Arc<dyn TelemetryPort>) -> Self {
        Self {
            logger: Some(logger),
            telemetry: Some(telemetry),
        }
    }

    pub(crate) fn log(&self, level: LogLevel, event: &str, message: &str, fields: LogFields) {
        if let Some(logger) = self.logger.as_ref() {
            logger.log(LogEvent::new(level, event, message, Some(fields)));
        }
    }

    pub(crate) fn log_failure(
        &self,
        level: LogLevel,
        event: &str,
        message: &str,
        fields: LogFields,
        error: &ErrorEnvelope,
    ) {
        if let Some(logger) = self.logger.as_ref() {
            logger.failure(level, event, message, Some(fields), error);
        }
    }

    pub(crate) fn count(&self, name: &str, tags: Option<&TelemetryTags>) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            telemetry.increment_counter(name, 1, tags);
        }
    }

    pub(crate) fn timer(
        &self,
        name: &str,
        tags: Option<&TelemetryTags>,
    ) -> Option<Box<dyn TelemetryTimer>> {
        self.telemetry
            .as_ref()
            .map(|telemetry| telemetry.start_timer(name, tags))
    }

    /// Run a use-case body with start/outcome events around it.
    pub async fn run<T, F>(
        &self,
        ctx: &RequestContext,
        operation: &str,
        mut fields: LogFields,
        body: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started_at = Instant::now();
        insert_field(
            &mut fields,
            "correlationId",
            ctx.correlation_id().as_str(),
        );
        let total_timer = self.timer(&format!("agents.{operation}.total"), None);
        self.log(
            LogLevel::Info,
            &format!("agents.{operation}.start"),
            &format!("{operation} started"),
            fields.clone(),
        );

        let result = body.await;

        if let Some(timer) = total_timer.as_ref() {
            timer.stop();
        }
        fields.insert("durationMs".into(), Value::from(duration_ms(started_at)));

        match &result {
            Ok(_) => {
                self.count(&format!("agents.{operation}.executed"), None);
                self.log(
                    LogLevel::Info,
                    &format!("agents.{operation}.completed"),
                    &format!("{operation} completed"),
                    fields,
                );
            },
            Err(error) if error.is_cancelled() => {
                self.count(&format!("agents.{operation}.aborted"), None);
                self.log(
                    LogLevel::Info,
                    &format!("agents.{operation}.aborted"),
                    &format!("{operation} aborted"),
                    fields,
                );
            },
            Err(error) => {
                self.count(&format!("agents.{operation}.failed"), None);
                fields.insert("category".into(), Value::from(error.category().as_str()));
                let level = if error.kind == ErrorKind::Expected {
                    LogLevel::Warn
                } else {
                    LogLevel::Error
                };
                self.log_failure(
                    level,
                    &format!("agents.{operation}.failed"),
                    &format!("{operation} failed"),
                    fields,
                    error,
                );
            },
        }

        result
    }
}

pub(crate) fn duration_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn insert_field(fields: &mut LogFields, key: &str, value: impl Into<Value>) {
    fields.insert(key.into(), value.into());
}

pub(crate) fn fields<const N: usize>(pairs: [(&str, Value); N]) -> LogFields {
    pairs
        .into_iter()
        .map(|(key, value)| (Box::from(key), value))
        .collect()
}

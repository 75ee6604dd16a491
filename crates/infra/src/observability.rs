//! Logger and telemetry construction from config.

use code_agent_adapters::{JsonLogger, JsonTelemetry, LogSink, StderrLogSink};
use code_agent_config::ValidatedAgentServiceConfig;
use code_agent_ports::{LogFields, LoggerPort, TelemetryPort, TelemetryTags};
use serde_json::Value;
use std::sync::Arc;

const SERVICE_NAME: &str = "code-agent";

/// Logger and telemetry sharing one sink.
#[derive(Clone)]
pub struct Observability {
    /// Structured logger.
    pub logger: Arc<dyn LoggerPort>,
    /// Counters and timers.
    pub telemetry: Arc<dyn TelemetryPort>,
}

/// JSON logging and telemetry on stderr at the configured level.
#[must_use]
pub fn build_observability(config: &ValidatedAgentServiceConfig) -> Observability {
    build_observability_with_sink(config, Arc::new(StderrLogSink))
}

/// JSON logging and telemetry on `sink` at the configured level.
#[must_use]
pub fn build_observability_with_sink(
    config: &ValidatedAgentServiceConfig,
    sink: Arc<dyn LogSink>,
) -> Observability {
    let mut fields = LogFields::new();
    fields.insert("service".into(), Value::from(SERVICE_NAME));
    let logger = JsonLogger::new(Arc::clone(&sink))
        .with_base_fields(fields)
        .with_min_level(JsonLogger::level_from_name(&config.observability.log_level));

    let mut tags = TelemetryTags::new();
    tags.insert("service".into(), SERVICE_NAME.into());
    let telemetry = JsonTelemetry::new(sink).with_base_tags(tags);

    Observability {
        logger: Arc::new(logger),
        telemetry: Arc::new(telemetry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_adapters::MemoryLogSink;
    use code_agent_config::AgentServiceConfig;
    use code_agent_shared::Result;

    #[test]
    fn configured_level_filters_events() -> Result<()> {
        let mut config = AgentServiceConfig::default();
        config.observability.log_level = "warn".into();
        let config = config.validate_and_normalize()?;
        let sink = Arc::new(MemoryLogSink::new());
        let observability = build_observability_with_sink(&config, sink.clone());

        observability.logger.info("agents.getAgent.start", "quiet", None);
        observability.logger.warn("agents.deleteAgent.teardownFailed", "loud", None);

        let lines = sink.take_json();
        assert_eq!(lines.len(), 1);
        let line = lines.first().cloned().unwrap_or_default();
        assert_eq!(line["event"], "agents.deleteAgent.teardownFailed");
        assert_eq!(line["fields"]["service"], "code-agent");
        Ok(())
    }
}

//! JSON telemetry adapter (counters and timers).

use crate::log_sink::LogSink;
use crate::logger::now_epoch_ms;
use code_agent_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};
use code_agent_shared::{REDACTED, is_secret_key};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Emits one JSON line per metric to a [`LogSink`].
#[derive(Clone)]
pub struct JsonTelemetry {
    sink: Arc<dyn LogSink>,
    base_tags: TelemetryTags,
}

impl JsonTelemetry {
    /// Telemetry backed by `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_tags: TelemetryTags::new(),
        }
    }

    /// Tags applied to every metric.
    #[must_use]
    pub fn with_base_tags(mut self, tags: TelemetryTags) -> Self {
        self.base_tags = tags;
        self
    }

    fn merged(&self, tags: Option<&TelemetryTags>) -> TelemetryTags {
        let mut merged = self.base_tags.clone();
        if let Some(extra) = tags {
            merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        for (key, value) in &mut merged {
            if is_secret_key(key) {
                *value = REDACTED.into();
            }
        }
        merged
    }
}

impl TelemetryPort for JsonTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let line = metric_line(MetricKind::Counter, name, value, &self.merged(tags));
        self.sink.write_line(&line);
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let line = metric_line(MetricKind::Timer, name, duration_ms, &self.merged(tags));
        self.sink.write_line(&line);
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(JsonTimer {
            sink: Arc::clone(&self.sink),
            name: name.into(),
            tags: self.merged(tags),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }
}

struct JsonTimer {
    sink: Arc<dyn LogSink>,
    name: Box<str>,
    tags: TelemetryTags,
    started_at: Instant,
    stopped: AtomicBool,
}

impl TelemetryTimer for JsonTimer {
    fn stop(&self) {
        // Only the first stop records.
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let elapsed = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let line = metric_line(MetricKind::Timer, &self.name, elapsed, &self.tags);
        self.sink.write_line(&line);
    }
}

#[derive(Clone, Copy)]
enum MetricKind {
    Counter,
    Timer,
}

fn metric_line(kind: MetricKind, name: &str, value: u64, tags: &TelemetryTags) -> String {
    let mut payload = Map::new();
    payload.insert("type".to_owned(), Value::from("metric"));
    payload.insert("timestampMs".to_owned(), Value::from(now_epoch_ms()));
    let metric_type = match kind {
        MetricKind::Counter => "counter",
        MetricKind::Timer => {
            payload.insert("unit".to_owned(), Value::from("ms"));
            "timer"
        },
    };
    payload.insert("metricType".to_owned(), Value::from(metric_type));
    payload.insert("name".to_owned(), Value::from(name));
    payload.insert("value".to_owned(), Value::from(value));
    if !tags.is_empty() {
        let tags: Map<String, Value> = tags
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(value.as_ref())))
            .collect();
        payload.insert("tags".to_owned(), Value::Object(tags));
    }
    serde_json::to_string(&Value::Object(payload)).map_or_else(
        |_| "{\"type\":\"metric\",\"metricType\":\"error\",\"name\":\"telemetry.serializeFailed\",\"value\":1}\n".to_owned(),
        |mut line| {
            line.push('\n');
            line
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;
    use code_agent_ports::telemetry_tags;

    #[test]
    fn counters_and_timers_become_lines() {
        let sink = Arc::new(MemoryLogSink::new());
        let telemetry = JsonTelemetry::new(sink.clone())
            .with_base_tags(telemetry_tags([("service", "code-agent")]));

        telemetry.increment_counter(
            "agents.createAgent.executed",
            1,
            Some(&telemetry_tags([("provider", "local")])),
        );
        let timer = telemetry.start_timer("agents.createAgent.total", None);
        timer.stop();
        timer.stop();

        let lines = sink.take_json();
        assert_eq!(lines.len(), 2);
        let counter = lines.first().cloned().unwrap_or_default();
        assert_eq!(counter["metricType"], "counter");
        assert_eq!(counter["tags"]["service"], "code-agent");
        assert_eq!(counter["tags"]["provider"], "local");
        let timer = lines.get(1).cloned().unwrap_or_default();
        assert_eq!(timer["metricType"], "timer");
        assert_eq!(timer["unit"], "ms");
        assert_eq!(timer["name"], "agents.createAgent.total");
    }

    #[test]
    fn secret_tag_values_are_redacted() {
        let sink = Arc::new(MemoryLogSink::new());
        let telemetry = JsonTelemetry::new(sink.clone());
        telemetry.record_timer_ms("x", 5, Some(&telemetry_tags([("authToken", "abc")])));

        let lines = sink.take_json();
        assert_eq!(
            lines.first().map(|line| line["tags"]["authToken"].clone()),
            Some(Value::from(REDACTED))
        );
    }
}

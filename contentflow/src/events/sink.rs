//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, Level};

/// Receives pipeline events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    ///
    /// * `event_type` - dotted event name, e.g. `stage.completed`
    /// * `data` - optional JSON payload
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without awaiting. Must never panic.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to `tracing`.
///
/// `content_id` and `stage` are lifted out of the payload into log fields.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`. Anything other than DEBUG logs at INFO.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&Value>) {
        let content_id = data.and_then(|d| d.get("content_id")).and_then(Value::as_u64);
        let stage = data
            .and_then(|d| d.get("stage"))
            .and_then(Value::as_str)
            .unwrap_or("");

        if self.level == Level::DEBUG {
            debug!(event_type, ?content_id, stage, event_data = ?data, "Event: {}", event_type);
        } else {
            info!(event_type, ?content_id, stage, event_data = ?data, "Event: {}", event_type);
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Keeps every event in memory, for tests and the CLI summary.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Returns the event names in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose name starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Counts events with exactly this name.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events.read().iter().filter(|(t, _)| t == event_type).count()
    }

    /// Returns the payloads of events with exactly this name.
    #[must_use]
    pub fn payloads(&self, event_type: &str) -> Vec<Value> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t == event_type)
            .filter_map(|(_, d)| d.clone())
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_logging_sink_accepts_partial_payloads() {
        let sink = LoggingEventSink::debug();
        sink.emit("stage.started", Some(json!({"content_id": 3, "stage": "publish_vk"})))
            .await;
        sink.try_emit("batch.completed", Some(json!({"processed": 2})));
        sink.try_emit("batch.completed", None);
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("stage.started", None).await;
        sink.try_emit("stage.completed", Some(json!({"content_id": 1})));
        sink.try_emit("pipeline.retry", Some(json!({"attempt": 1})));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.names(), vec!["stage.started", "stage.completed", "pipeline.retry"]);
        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.count("pipeline.retry"), 1);
        assert_eq!(sink.payloads("stage.completed"), vec![json!({"content_id": 1})]);
    }

    #[tokio::test]
    async fn test_collecting_sink_clear() {
        let sink = CollectingEventSink::new();
        sink.emit("event", None).await;
        sink.clear();
        assert!(sink.is_empty());
    }
}

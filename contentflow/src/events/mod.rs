//! Pipeline event emission.
//!
//! The orchestrator, composite runner, batch driver and task runner report
//! progress to an [`EventSink`]. Emission never fails the caller.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A stage began for a record.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage finished and advanced the record.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage's precondition did not hold, so it did nothing.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// A stage failed and an error log was written.
pub const STAGE_FAILED: &str = "stage.failed";
/// The composite is about to retry a record.
pub const PIPELINE_RETRY: &str = "pipeline.retry";
/// The composite gave up on a record.
pub const PIPELINE_ABANDONED: &str = "pipeline.abandoned";
/// A batch sweep finished.
pub const BATCH_COMPLETED: &str = "batch.completed";
/// A task was dropped because the same record was already in flight.
pub const TASK_DUPLICATE: &str = "task.duplicate";

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sinks_are_object_safe() {
        let sinks: Vec<Arc<dyn EventSink>> = vec![
            Arc::new(NoOpEventSink),
            Arc::new(LoggingEventSink::default()),
            Arc::new(CollectingEventSink::new()),
        ];
        for sink in sinks {
            sink.emit(STAGE_STARTED, Some(serde_json::json!({"content_id": 1})))
                .await;
            sink.try_emit(BATCH_COMPLETED, None);
        }
    }
}

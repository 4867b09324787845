//! Worker loop that executes queued tasks.

use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::queue::{Delivery, Task, TaskQueue};
use crate::errors::PipelineError;
use crate::events::{EventSink, TASK_DUPLICATE};
use crate::pipeline::{
    BatchDriver, BatchReport, CompositeOutcome, CompositeRunner, InFlightRegistry, Orchestrator,
};

/// How many times a failed sweep is delivered before it is dropped.
const SWEEP_MAX_DELIVERIES: u32 = 3;

/// Wait before a failed sweep is requeued, multiplied by the delivery attempt.
const SWEEP_REDELIVERY_DELAY: Duration = Duration::from_secs(30);

/// What handling one delivery amounted to.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The composite ran for the record.
    Completed(CompositeOutcome),
    /// The record already had a pipeline in flight; the delivery was dropped.
    Duplicate,
    /// A sweep ran.
    Swept(BatchReport),
    /// A sweep could not list records.
    SweepFailed(PipelineError),
}

/// Pulls deliveries off a queue and runs them.
///
/// Deliveries are acknowledged only after the work finishes. A record has at
/// most one full pipeline in flight across all workers and sweeps.
#[derive(Clone)]
pub struct TaskRunner {
    queue: Arc<dyn TaskQueue>,
    composite: CompositeRunner,
    batch: BatchDriver,
    in_flight: InFlightRegistry,
    events: Arc<dyn EventSink>,
    workers: usize,
    sweep_redelivery_delay: Duration,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    /// Creates a runner with the configured worker count.
    #[must_use]
    pub fn new(orchestrator: Orchestrator, queue: Arc<dyn TaskQueue>) -> Self {
        let in_flight = orchestrator.in_flight().clone();
        let workers = orchestrator.config().scheduler.workers.max(1);
        let events = Arc::clone(orchestrator.events());
        Self {
            queue,
            composite: CompositeRunner::new(orchestrator.clone()),
            batch: BatchDriver::new(orchestrator),
            in_flight,
            events,
            workers,
            sweep_redelivery_delay: SWEEP_REDELIVERY_DELAY,
        }
    }

    /// Overrides the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Overrides the base wait before a failed sweep is requeued.
    #[must_use]
    pub fn with_sweep_redelivery_delay(mut self, delay: Duration) -> Self {
        self.sweep_redelivery_delay = delay;
        self
    }

    /// Replaces the composite runner, e.g. to change the retry policy.
    #[must_use]
    pub fn with_composite(mut self, composite: CompositeRunner) -> Self {
        self.composite = composite;
        self
    }

    /// The registry of records currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Runs the workers until the queue is drained or `shutdown` fires.
    ///
    /// A task already running when `shutdown` fires is finished first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(workers = self.workers, "Task runner starting");
        let workers = (0..self.workers).map(|worker| self.worker_loop(worker, &shutdown));
        join_all(workers).await;
        info!("Task runner stopped");
    }

    async fn worker_loop(&self, worker: usize, shutdown: &CancellationToken) {
        loop {
            let delivery = tokio::select! {
                () = shutdown.cancelled() => break,
                next = self.queue.dequeue() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };
            debug!(worker, delivery_id = %delivery.id, task = ?delivery.task, "Task received");
            self.handle(&delivery).await;
        }
        debug!(worker, "Worker exiting");
    }

    /// Executes one delivery and settles it with the queue.
    pub async fn handle(&self, delivery: &Delivery) -> TaskOutcome {
        match delivery.task {
            Task::RunPipeline { content_id } => {
                let Some(_guard) = self.in_flight.try_acquire(content_id) else {
                    info!(content_id = content_id.0, delivery_id = %delivery.id, "Duplicate task dropped");
                    self.events.try_emit(
                        TASK_DUPLICATE,
                        Some(json!({
                            "content_id": content_id.0,
                            "delivery_id": delivery.id.to_string(),
                        })),
                    );
                    self.ack(delivery).await;
                    return TaskOutcome::Duplicate;
                };

                let outcome = self.composite.run(content_id).await;
                self.ack(delivery).await;
                TaskOutcome::Completed(outcome)
            }
            Task::Sweep => match self.batch.sweep().await {
                Ok(report) => {
                    self.ack(delivery).await;
                    TaskOutcome::Swept(report)
                }
                Err(e) => {
                    error!(error = %e, attempt = delivery.attempt, "Sweep failed");
                    if delivery.attempt < SWEEP_MAX_DELIVERIES {
                        let delay = self.sweep_redelivery_delay * delivery.attempt;
                        debug!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "Sweep requeue delayed"
                        );
                        tokio::time::sleep(delay).await;
                        if let Err(qe) = self.queue.nack(delivery).await {
                            warn!(error = %qe, "Could not requeue sweep");
                        }
                    } else {
                        self.ack(delivery).await;
                    }
                    TaskOutcome::SweepFailed(e)
                }
            },
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.queue.ack(delivery).await {
            warn!(delivery_id = %delivery.id, error = %e, "Ack failed");
        }
    }
}

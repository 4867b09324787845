//! Periodic and manual triggers.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::queue::{Task, TaskQueue};
use crate::config::SchedulerConfig;
use crate::core::ContentId;
use crate::errors::QueueError;

/// Enqueues a sweep at a fixed interval.
///
/// The first sweep is enqueued immediately.
#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<dyn TaskQueue>,
    interval: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler with the configured interval.
    #[must_use]
    pub fn new(queue: Arc<dyn TaskQueue>, config: &SchedulerConfig) -> Self {
        Self {
            queue,
            interval: config.interval(),
        }
    }

    /// Overrides the interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The sweep interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks until `shutdown` fires or the queue closes. Returns the number
    /// of sweeps enqueued.
    pub async fn run(&self, shutdown: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut enqueued = 0;

        info!(interval_secs = self.interval.as_secs(), "Scheduler starting");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.queue.enqueue(Task::Sweep).await {
                        Ok(id) => {
                            enqueued += 1;
                            info!(delivery_id = %id, "Sweep scheduled");
                        }
                        Err(QueueError::Closed) => {
                            warn!("Queue closed, scheduler stopping");
                            break;
                        }
                        Err(e) => warn!(error = %e, "Could not schedule sweep"),
                    }
                }
            }
        }
        enqueued
    }
}

/// Entry points for requesting work.
#[derive(Clone)]
pub struct Triggers {
    queue: Arc<dyn TaskQueue>,
}

impl std::fmt::Debug for Triggers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Triggers").finish_non_exhaustive()
    }
}

impl Triggers {
    /// Creates triggers over a queue.
    #[must_use]
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    /// Requests one full pipeline run for a record.
    pub async fn run_pipeline(&self, id: ContentId) -> Result<Uuid, QueueError> {
        info!(content_id = id.0, "Pipeline run requested");
        self.queue.enqueue(Task::RunPipeline { content_id: id }).await
    }

    /// Requests one sweep outside the schedule.
    pub async fn sweep(&self) -> Result<Uuid, QueueError> {
        self.queue.enqueue(Task::Sweep).await
    }
}

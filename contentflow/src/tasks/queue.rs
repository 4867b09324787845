//! Task queue with acknowledgement after completion.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::core::ContentId;
use crate::errors::QueueError;

/// Work the runner knows how to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Run the full pipeline, with retries, for one record.
    RunPipeline {
        /// The record.
        content_id: ContentId,
    },
    /// Run one batch sweep.
    Sweep,
}

/// A task handed to a worker.
///
/// Stays unacknowledged until the worker calls `ack` or `nack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Delivery id, stable across redeliveries.
    pub id: Uuid,
    /// The task.
    pub task: Task,
    /// 1 on first delivery, incremented on every `nack`.
    pub attempt: u32,
}

/// At-least-once task delivery.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Adds a task and returns its delivery id.
    async fn enqueue(&self, task: Task) -> Result<Uuid, QueueError>;

    /// Waits for the next delivery. Returns `None` once the queue is closed
    /// and drained.
    async fn dequeue(&self) -> Option<Delivery>;

    /// Confirms a delivery is done.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Returns a delivery to the queue for another attempt.
    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError>;
}

/// Channel-backed queue for a single process.
#[derive(Debug)]
pub struct InMemoryTaskQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>,
    unacked: DashMap<Uuid, Delivery>,
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskQueue {
    /// Creates an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            unacked: DashMap::new(),
        }
    }

    /// Stops accepting tasks. Queued deliveries can still be dequeued.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Returns true once `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Deliveries handed out and not yet acknowledged.
    #[must_use]
    pub fn pending_acks(&self) -> usize {
        self.unacked.len()
    }

    fn send(&self, delivery: Delivery) -> Result<(), QueueError> {
        let sender = self.sender.lock().clone().ok_or(QueueError::Closed)?;
        sender.send(delivery).map_err(|_| QueueError::Closed)
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<Uuid, QueueError> {
        let delivery = Delivery {
            id: Uuid::new_v4(),
            task,
            attempt: 1,
        };
        let id = delivery.id;
        self.send(delivery)?;
        debug!(delivery_id = %id, ?task, "Task enqueued");
        Ok(id)
    }

    async fn dequeue(&self) -> Option<Delivery> {
        let delivery = self.receiver.lock().await.recv().await?;
        self.unacked.insert(delivery.id, delivery.clone());
        Some(delivery)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.unacked
            .remove(&delivery.id)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.id.to_string()))
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let (_, mut redelivery) = self
            .unacked
            .remove(&delivery.id)
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.id.to_string()))?;
        redelivery.attempt += 1;
        if let Err(e) = self.send(redelivery) {
            // Stays unacked when the requeue fails.
            self.unacked.insert(delivery.id, delivery.clone());
            return Err(e);
        }
        debug!(delivery_id = %delivery.id, attempt = delivery.attempt + 1, "Task requeued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_fifo_delivery_and_ack() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(Task::RunPipeline { content_id: ContentId(1) }).await.unwrap();
        queue.enqueue(Task::Sweep).await.unwrap();

        let first = queue.dequeue().await.unwrap();
        let second = queue.dequeue().await.unwrap();
        assert_eq!(first.task, Task::RunPipeline { content_id: ContentId(1) });
        assert_eq!(second.task, Task::Sweep);
        assert_eq!(queue.pending_acks(), 2);

        assert_ok!(queue.ack(&first).await);
        assert_ok!(queue.ack(&second).await);
        assert_eq!(queue.pending_acks(), 0);
    }

    #[tokio::test]
    async fn test_double_ack_is_rejected() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(Task::Sweep).await.unwrap();
        let delivery = queue.dequeue().await.unwrap();

        queue.ack(&delivery).await.unwrap();
        assert!(matches!(
            queue.ack(&delivery).await,
            Err(QueueError::UnknownDelivery(_))
        ));
    }

    #[tokio::test]
    async fn test_nack_redelivers_with_next_attempt() {
        let queue = InMemoryTaskQueue::new();
        let id = queue.enqueue(Task::Sweep).await.unwrap();
        let delivery = queue.dequeue().await.unwrap();

        queue.nack(&delivery).await.unwrap();
        let again = queue.dequeue().await.unwrap();

        assert_eq!(again.id, id);
        assert_eq!(again.attempt, 2);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(Task::Sweep).await.unwrap();
        queue.close();

        assert!(queue.is_closed());
        assert_err!(queue.enqueue(Task::Sweep).await);
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_nack_on_closed_queue_keeps_delivery_tracked() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(Task::Sweep).await.unwrap();
        let delivery = queue.dequeue().await.unwrap();
        queue.close();

        assert!(matches!(queue.nack(&delivery).await, Err(QueueError::Closed)));
        assert_eq!(queue.pending_acks(), 1);
        assert_ok!(queue.ack(&delivery).await);
    }

    #[test]
    fn test_task_wire_format() {
        let json = serde_json::to_value(Task::RunPipeline { content_id: ContentId(5) }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "run_pipeline", "content_id": 5}));
    }
}

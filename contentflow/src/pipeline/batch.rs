//! One sweep over every pending record.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::inflight::InFlightRegistry;
use super::orchestrator::Orchestrator;
use crate::core::{ContentId, ContentState};
use crate::errors::PipelineError;
use crate::events::BATCH_COMPLETED;

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Records the sweep selected.
    pub selected: usize,
    /// Records whose run had no failed stage.
    pub succeeded: Vec<ContentId>,
    /// Records whose run stopped at a failed stage.
    pub failed: Vec<ContentId>,
    /// Records skipped because another task held them.
    pub in_flight: Vec<ContentId>,
}

impl BatchReport {
    /// Records a run was made for.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs one pipeline pass per pending record, in ascending id order.
///
/// A failing record does not stop the sweep. There are no retries here;
/// a record left pending is picked up again by the next sweep.
#[derive(Debug, Clone)]
pub struct BatchDriver {
    orchestrator: Orchestrator,
    in_flight: InFlightRegistry,
}

impl BatchDriver {
    /// Creates a driver sharing the orchestrator's in-flight registry.
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        let in_flight = orchestrator.in_flight().clone();
        Self {
            orchestrator,
            in_flight,
        }
    }

    /// Shares an in-flight registry with other runners.
    #[must_use]
    pub fn with_in_flight(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    /// Processes every record in `draft`, `article_ready` or `images_ready`.
    ///
    /// Fails only if the pending records cannot be listed.
    pub async fn sweep(&self) -> Result<BatchReport, PipelineError> {
        let items = self
            .orchestrator
            .store()
            .list_by_state(&ContentState::PENDING)
            .await?;

        let mut report = BatchReport {
            selected: items.len(),
            ..BatchReport::default()
        };
        info!(selected = report.selected, "Batch sweep started");

        for item in items {
            let Some(_guard) = self.in_flight.try_acquire(item.id) else {
                info!(content_id = item.id.0, "Record already in flight, skipping");
                report.in_flight.push(item.id);
                continue;
            };

            match self.orchestrator.run_pipeline(item.id).await {
                Ok(run) if run.is_success() => report.succeeded.push(item.id),
                Ok(_) => report.failed.push(item.id),
                Err(e) => {
                    warn!(content_id = item.id.0, error = %e, "Pipeline run aborted");
                    report.failed.push(item.id);
                }
            }
        }

        info!(
            processed = report.processed(),
            failed = report.failed.len(),
            "Batch sweep finished"
        );
        self.orchestrator.events().try_emit(
            BATCH_COMPLETED,
            Some(json!({
                "selected": report.selected,
                "succeeded": report.succeeded,
                "failed": report.failed,
                "in_flight": report.in_flight,
            })),
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NewContentItem;
    use crate::testing::{FailingStore, PipelineFixture};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_skips_terminal_records() {
        let fx = PipelineFixture::new();
        let pending = fx.insert(NewContentItem::new("A", "a")).await;
        let abandoned = fx.insert(NewContentItem::new("B", "b")).await;
        fx.orchestrator.abandon(abandoned, "manual").await.unwrap();

        let report = BatchDriver::new(fx.orchestrator.clone()).sweep().await.unwrap();

        assert_eq!(report.selected, 1);
        assert_eq!(report.succeeded, vec![pending]);
        assert_eq!(fx.item(abandoned).await.state, ContentState::Failed);
    }

    #[tokio::test]
    async fn test_in_flight_records_are_left_alone() {
        let fx = PipelineFixture::new();
        let id = fx.insert(NewContentItem::new("A", "a")).await;
        let registry = InFlightRegistry::new();
        let _held = registry.try_acquire(id).unwrap();

        let report = BatchDriver::new(fx.orchestrator.clone())
            .with_in_flight(registry)
            .sweep()
            .await
            .unwrap();

        assert_eq!(report.in_flight, vec![id]);
        assert_eq!(report.processed(), 0);
        assert_eq!(fx.item(id).await.state, ContentState::Draft);
    }

    #[tokio::test]
    async fn test_default_registry_is_the_orchestrators() {
        let fx = PipelineFixture::new();
        let id = fx.insert(NewContentItem::new("A", "a")).await;
        let _held = fx.orchestrator.in_flight().try_acquire(id).unwrap();

        let report = fx.batch().sweep().await.unwrap();

        assert_eq!(report.in_flight, vec![id]);
        assert!(fx.article.calls().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_is_returned() {
        let store = Arc::new(FailingStore::new(crate::store::InMemoryContentStore::new()));
        store.fail_reads(true);
        let fx = PipelineFixture::with_store(store);

        let err = BatchDriver::new(fx.orchestrator.clone()).sweep().await.unwrap_err();
        assert_eq!(err.kind(), "StoreError");
    }
}

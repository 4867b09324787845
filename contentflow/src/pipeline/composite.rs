//! Whole-pipeline retry.

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::orchestrator::Orchestrator;
use super::retry::{RetryDecision, RetryPolicy};
use super::stage::PipelineRun;
use crate::core::{ContentId, ContentState};
use crate::errors::PipelineError;
use crate::events::{PIPELINE_ABANDONED, PIPELINE_RETRY};

/// Result of running the composite for one record.
#[derive(Debug, Clone)]
pub struct CompositeOutcome {
    /// The record.
    pub content_id: ContentId,
    /// Pipeline runs made, including the first.
    pub attempts: usize,
    /// True if the last run had no failed stage.
    pub succeeded: bool,
    /// The failure of the last run, if any.
    pub last_error: Option<PipelineError>,
    /// Record state after the last run, if the record could be read.
    pub final_state: Option<ContentState>,
}

/// Re-runs the full stage sequence until it succeeds or attempts run out.
///
/// The record keeps whatever state the last run reached; giving up never
/// moves it to `failed`.
#[derive(Debug, Clone)]
pub struct CompositeRunner {
    orchestrator: Orchestrator,
    retry: RetryPolicy,
}

impl CompositeRunner {
    /// Creates a runner using the configured retry policy.
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        let retry = orchestrator.config().retry.policy();
        Self {
            orchestrator,
            retry,
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The orchestrator runs go through.
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Runs the pipeline for a record with retries.
    pub async fn run(&self, id: ContentId) -> CompositeOutcome {
        let events = Arc::clone(self.orchestrator.events());
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.orchestrator.run_pipeline(id).await {
                Ok(run) if run.is_success() => {
                    info!(content_id = id.0, attempt, "Pipeline run succeeded");
                    return self.finish(id, attempt, None).await;
                }
                Ok(run) => first_failure(&run),
                Err(e) => {
                    error!(content_id = id.0, attempt, error = %e, "Pipeline run aborted");
                    e
                }
            };

            match self.retry.decide(attempt, error.is_retryable()) {
                RetryDecision::Retry(delay) => {
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    warn!(
                        content_id = id.0,
                        attempt,
                        delay_ms,
                        error = %error,
                        "Retrying pipeline"
                    );
                    events.try_emit(
                        PIPELINE_RETRY,
                        Some(json!({
                            "content_id": id.0,
                            "attempt": attempt,
                            "delay_ms": delay_ms,
                            "error": error.to_dict(),
                        })),
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                    warn!(content_id = id.0, attempts = attempt, error = %error, "Giving up on record");
                    events.try_emit(
                        PIPELINE_ABANDONED,
                        Some(json!({
                            "content_id": id.0,
                            "attempts": attempt,
                            "error": error.to_dict(),
                        })),
                    );
                    return self.finish(id, attempt, Some(error)).await;
                }
            }
        }
    }

    async fn finish(
        &self,
        id: ContentId,
        attempts: usize,
        last_error: Option<PipelineError>,
    ) -> CompositeOutcome {
        let final_state = match self.orchestrator.store().get(id).await {
            Ok(item) => item.map(|i| i.state),
            Err(e) => {
                warn!(content_id = id.0, error = %e, "Could not read final state");
                None
            }
        };
        CompositeOutcome {
            content_id: id,
            attempts,
            succeeded: last_error.is_none(),
            last_error,
            final_state,
        }
    }
}

fn first_failure(run: &PipelineRun) -> PipelineError {
    run.failure()
        .cloned()
        .unwrap_or_else(|| PipelineError::InvariantViolation("failed run without error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NewContentItem;
    use crate::errors::ProviderError;
    use crate::testing::PipelineFixture;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let fx = PipelineFixture::new();
        let id = fx.insert(NewContentItem::new("T", "b")).await;

        let outcome = CompositeRunner::new(fx.orchestrator.clone()).run(id).await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.final_state, Some(ContentState::Published));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_attempt() {
        let fx = PipelineFixture::new();
        fx.article
            .push_error(ProviderError::Network("connection reset".to_string()));
        let id = fx.insert(NewContentItem::new("T", "b")).await;

        let start = tokio::time::Instant::now();
        let outcome = CompositeRunner::new(fx.orchestrator.clone()).run(id).await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 2);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(fx.logs(id).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overridden_policy_controls_spacing() {
        let fx = PipelineFixture::new();
        fx.article.fail_always(ProviderError::Network("down".to_string()));
        let id = fx.insert(NewContentItem::new("T", "b")).await;

        let start = tokio::time::Instant::now();
        let outcome = CompositeRunner::new(fx.orchestrator.clone())
            .with_retry(RetryPolicy::fixed(2, Duration::from_secs(5)))
            .run(id)
            .await;

        assert_eq!(outcome.attempts, 2);
        assert!(!outcome.succeeded);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(fx.article.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let fx = PipelineFixture::new();

        let outcome = CompositeRunner::new(fx.orchestrator.clone())
            .run(ContentId(404))
            .await;

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.last_error.unwrap().kind(), "NotFound");
        assert_eq!(outcome.final_state, None);
    }
}

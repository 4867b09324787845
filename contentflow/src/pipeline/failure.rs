//! Stage failure classification and persistence.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use super::stage::{bounded, Stage};
use crate::core::{ContentId, ErrorLogEntry, NewErrorLog, Severity};
use crate::errors::PipelineError;
use crate::providers::{QaProvider, QaReport};
use crate::store::ContentStore;

const NOT_FOUND_CAUSE: &str = "Invalid content_item_id";
const NOT_FOUND_RECOMMENDATION: &str = "Check task input and DB integrity";

/// Writes one error log entry per stage failure.
///
/// The QA provider is asked to classify the error text first. If that call
/// fails the entry is written as high severity with no cause.
#[derive(Clone)]
pub struct FailureRecorder {
    store: Arc<dyn ContentStore>,
    qa: Arc<dyn QaProvider>,
    timeout: Duration,
}

impl std::fmt::Debug for FailureRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureRecorder")
            .field("qa", &self.qa.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl FailureRecorder {
    /// Creates a recorder.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, qa: Arc<dyn QaProvider>, timeout: Duration) -> Self {
        Self { store, qa, timeout }
    }

    /// Classifies and persists a stage failure.
    ///
    /// Only a store failure is returned; classification problems are absorbed.
    pub async fn record(
        &self,
        id: ContentId,
        stage: Stage,
        err: &PipelineError,
    ) -> Result<ErrorLogEntry, PipelineError> {
        if matches!(err, PipelineError::NotFound(_)) {
            return self.record_not_found(id, stage).await;
        }

        let message = err.to_string();
        let entry = match self.classify(stage, &message).await {
            Some(report) => NewErrorLog::new(stage.name(), &message)
                .with_severity(report.severity)
                .with_cause(report.cause)
                .with_recommendation(report.recommendation),
            None => NewErrorLog::new(stage.name(), &message),
        };

        self.append(entry.for_content(id)).await
    }

    /// Persists a missing-record failure without classification.
    pub async fn record_not_found(
        &self,
        id: ContentId,
        stage: Stage,
    ) -> Result<ErrorLogEntry, PipelineError> {
        let entry = NewErrorLog::new(stage.name(), PipelineError::NotFound(id).to_string())
            .for_content(id)
            .with_severity(Severity::High)
            .with_cause(Some(NOT_FOUND_CAUSE.to_string()))
            .with_recommendation(Some(NOT_FOUND_RECOMMENDATION.to_string()));
        self.append(entry).await
    }

    /// Asks QA to triage an error message. Returns `None` if QA is unavailable.
    pub async fn classify(&self, stage: Stage, message: &str) -> Option<QaReport> {
        let result = match stage {
            Stage::GenerateArticle => {
                bounded(
                    "error classification",
                    self.timeout,
                    self.qa.analyze_article("Error during article generation", message),
                )
                .await
            }
            Stage::GenerateImages => {
                let reported = [message.to_string()];
                bounded(
                    "error classification",
                    self.timeout,
                    self.qa.analyze_images("Image generation error", &reported),
                )
                .await
            }
            Stage::PublishTelegram | Stage::PublishVk => {
                let platform = stage.platform().map(|p| p.to_string()).unwrap_or_default();
                let title = format!("Error during publish to {platform}");
                bounded(
                    "error classification",
                    self.timeout,
                    self.qa.analyze_article(&title, message),
                )
                .await
            }
        };

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(stage = %stage, error = %e, "Error classification unavailable");
                None
            }
        }
    }

    async fn append(&self, entry: NewErrorLog) -> Result<ErrorLogEntry, PipelineError> {
        self.store.append_error_log(entry).await.map_err(|e| {
            error!(error = %e, "Failed to persist error log");
            PipelineError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ProviderError, QaSubject};
    use crate::store::InMemoryContentStore;
    use crate::testing::{FailingStore, ScriptedQaProvider};
    use pretty_assertions::assert_eq;

    fn recorder(store: Arc<dyn ContentStore>, qa: Arc<ScriptedQaProvider>) -> FailureRecorder {
        FailureRecorder::new(store, qa, Duration::from_secs(90))
    }

    #[tokio::test]
    async fn test_classified_entry_carries_qa_verdict() {
        let store = Arc::new(InMemoryContentStore::new());
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 8.0));
        qa.push_article(Ok(QaReport {
            score: 2.0,
            comment: "bad".to_string(),
            severity: Severity::Medium,
            cause: Some("quota".to_string()),
            recommendation: Some("top up".to_string()),
        }));

        let err = PipelineError::ProviderTransport("429".to_string());
        let entry = recorder(store.clone(), qa.clone())
            .record(ContentId(3), Stage::PublishVk, &err)
            .await
            .unwrap();

        assert_eq!(entry.module, "publish_vk");
        assert_eq!(entry.severity, Severity::Medium);
        assert_eq!(entry.cause.as_deref(), Some("quota"));
        assert_eq!(entry.recommendation.as_deref(), Some("top up"));
        assert_eq!(qa.article_calls()[0].0, "Error during publish to vk");
        assert_eq!(store.error_logs(Some(ContentId(3))).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_qa_falls_back_to_high() {
        let store = Arc::new(InMemoryContentStore::new());
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 8.0));
        qa.push_images(Err(ProviderError::Network("down".to_string())));

        let err = PipelineError::EmptyGenerationResult("Image generation returned empty list".into());
        let entry = recorder(store, qa.clone())
            .record(ContentId(1), Stage::GenerateImages, &err)
            .await
            .unwrap();

        assert_eq!(entry.severity, Severity::High);
        assert_eq!(entry.cause, None);
        assert_eq!(entry.recommendation, None);
        assert_eq!(entry.error, "Image generation returned empty list");
        assert_eq!(
            qa.image_calls()[0],
            ("Image generation error".to_string(), vec!["Image generation returned empty list".to_string()])
        );
    }

    #[tokio::test]
    async fn test_not_found_is_not_classified() {
        let store = Arc::new(InMemoryContentStore::new());
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 8.0));

        let entry = recorder(store, qa.clone())
            .record(ContentId(42), Stage::GenerateArticle, &PipelineError::NotFound(ContentId(42)))
            .await
            .unwrap();

        assert_eq!(entry.cause.as_deref(), Some(NOT_FOUND_CAUSE));
        assert_eq!(entry.recommendation.as_deref(), Some(NOT_FOUND_RECOMMENDATION));
        assert!(qa.article_calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = Arc::new(FailingStore::new(InMemoryContentStore::new()));
        store.fail_appends(true);
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 8.0));

        let err = PipelineError::qa_gate(QaSubject::Article, 3.0, 5.0);
        let result = recorder(store, qa)
            .record(ContentId(1), Stage::PublishTelegram, &err)
            .await;

        assert_eq!(result.unwrap_err().kind(), "StoreError");
    }
}

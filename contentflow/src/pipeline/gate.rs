//! Pre-publish QA gate.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::stage::bounded;
use crate::config::QaGateConfig;
use crate::core::ContentItem;
use crate::errors::{PipelineError, QaSubject};
use crate::providers::{QaProvider, QaReport};

/// Scores artifacts and rejects those below the threshold.
///
/// Nothing is cached: every publish attempt re-runs QA.
#[derive(Clone)]
pub struct QaGate {
    qa: Arc<dyn QaProvider>,
    threshold: f64,
    timeout: Duration,
}

impl std::fmt::Debug for QaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaGate")
            .field("qa", &self.qa.name())
            .field("threshold", &self.threshold)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QaGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(qa: Arc<dyn QaProvider>, config: &QaGateConfig, timeout: Duration) -> Self {
        Self {
            qa,
            threshold: config.threshold,
            timeout,
        }
    }

    /// The minimum passing score.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores an article without judging it.
    pub async fn score_article(&self, title: &str, text: &str) -> Result<QaReport, PipelineError> {
        bounded("article QA", self.timeout, self.qa.analyze_article(title, text)).await
    }

    /// Scores an image list without judging it.
    pub async fn score_images(
        &self,
        title: &str,
        images: &[String],
    ) -> Result<QaReport, PipelineError> {
        bounded("image QA", self.timeout, self.qa.analyze_images(title, images)).await
    }

    fn judge(&self, subject: QaSubject, report: QaReport) -> Result<QaReport, PipelineError> {
        if report.passes(self.threshold) {
            info!(%subject, score = report.score, "QA gate passed");
            Ok(report)
        } else {
            warn!(%subject, score = report.score, threshold = self.threshold, "QA gate rejected");
            Err(PipelineError::qa_gate(subject, report.score, self.threshold))
        }
    }

    /// Scores an article and rejects it below the threshold.
    pub async fn check_article(&self, title: &str, text: &str) -> Result<QaReport, PipelineError> {
        let report = self.score_article(title, text).await?;
        self.judge(QaSubject::Article, report)
    }

    /// Scores an image list and rejects it below the threshold.
    pub async fn check_images(
        &self,
        title: &str,
        images: &[String],
    ) -> Result<QaReport, PipelineError> {
        let report = self.score_images(title, images).await?;
        self.judge(QaSubject::Images, report)
    }

    /// Runs the article check, then the image check if the record has images.
    pub async fn check_for_publish(&self, item: &ContentItem) -> Result<(), PipelineError> {
        self.check_article(&item.title, &item.body).await?;
        if !item.images.is_empty() {
            self.check_images(&item.title, &item.images).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentId, NewContentItem};
    use crate::testing::ScriptedQaProvider;
    use chrono::Utc;

    fn gate(qa: Arc<ScriptedQaProvider>) -> QaGate {
        QaGate::new(qa, &QaGateConfig::default(), Duration::from_secs(90))
    }

    fn item(images: &[&str]) -> ContentItem {
        let mut item = NewContentItem::new("T", "").into_item(ContentId(1), Utc::now());
        item.body = "body".to_string();
        item.images = images.iter().map(|s| (*s).to_string()).collect();
        item
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let qa = Arc::new(ScriptedQaProvider::scoring(5.0, 5.0));
        assert!(gate(qa).check_article("T", "x").await.is_ok());
    }

    #[tokio::test]
    async fn test_low_article_score_rejects_with_score() {
        let qa = Arc::new(ScriptedQaProvider::scoring(3.0, 9.0));
        let err = gate(qa.clone()).check_for_publish(&item(&["a"])).await.unwrap_err();

        assert_eq!(err.to_string(), "Article failed QA (score=3)");
        assert_eq!(qa.image_calls().len(), 0);
    }

    #[tokio::test]
    async fn test_low_image_score_rejects() {
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 4.0));
        let err = gate(qa).check_for_publish(&item(&["a", "b"])).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::QaGateFailure { subject: QaSubject::Images, .. }
        ));
    }

    #[tokio::test]
    async fn test_no_images_skips_image_check() {
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 0.0));
        gate(qa.clone()).check_for_publish(&item(&[])).await.unwrap();
        assert_eq!(qa.article_calls().len(), 1);
        assert!(qa.image_calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_never_passes() {
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 8.0));
        qa.push_article(Ok(QaReport::fallback()));
        let err = gate(qa).check_article("T", "x").await.unwrap_err();
        assert_eq!(err.kind(), "QAGateFailure");
    }

    #[tokio::test(start_paused = true)]
    async fn test_qa_timeout_is_transport_failure() {
        let qa = Arc::new(ScriptedQaProvider::scoring(8.0, 8.0).with_delay(Duration::from_secs(120)));
        let err = gate(qa).score_article("T", "x").await.unwrap_err();
        assert_eq!(err.kind(), "ProviderTransportError");
    }
}

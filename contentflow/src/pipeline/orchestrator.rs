//! The per-record state machine.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use super::failure::FailureRecorder;
use super::gate::QaGate;
use super::inflight::InFlightRegistry;
use super::stage::{bounded, PipelineRun, Stage, StageOutcome, StageReport};
use crate::config::AppConfig;
use crate::core::{ContentId, ContentItem, ContentPatch, ContentState, NewErrorLog, Platform, Severity};
use crate::errors::{PipelineError, StoreError};
use crate::events::{
    EventSink, NoOpEventSink, PIPELINE_ABANDONED, STAGE_COMPLETED, STAGE_FAILED, STAGE_SKIPPED,
    STAGE_STARTED,
};
use crate::observability::{stage_span, SpanTimer};
use crate::providers::{ArticleRequest, ImageRequest, ProviderSet};
use crate::publishers::{Post, PublisherSet};
use crate::store::ContentStore;

const EMPTY_ARTICLE: &str = "Article generation returned empty result";
const EMPTY_IMAGES: &str = "Image generation returned empty list";
const ABANDON_MODULE: &str = "abandon";

/// Runs stages against the content store.
///
/// Every stage is a failure boundary: an error is classified, written to the
/// error log, and reported as [`StageOutcome::Failed`] while the record keeps
/// its state. Only a failure to write the log itself is returned as `Err`.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<AppConfig>,
    store: Arc<dyn ContentStore>,
    providers: ProviderSet,
    publishers: PublisherSet,
    gate: QaGate,
    failures: FailureRecorder,
    events: Arc<dyn EventSink>,
    in_flight: InFlightRegistry,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("publishers", &self.publishers)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator from explicit adapters.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn ContentStore>,
        providers: ProviderSet,
        publishers: PublisherSet,
    ) -> Self {
        let gate = QaGate::new(
            Arc::clone(&providers.qa),
            &config.qa_gate,
            config.timeouts.qa(),
        );
        let failures = FailureRecorder::new(
            Arc::clone(&store),
            Arc::clone(&providers.qa),
            config.timeouts.qa(),
        );
        Self {
            config,
            store,
            providers,
            publishers,
            gate,
            failures,
            events: Arc::new(NoOpEventSink),
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Creates an orchestrator with adapters selected by configuration.
    #[must_use]
    pub fn from_config(config: Arc<AppConfig>, store: Arc<dyn ContentStore>) -> Self {
        let providers = ProviderSet::from_config(&config);
        let publishers = PublisherSet::from_config(&config);
        Self::new(config, store, providers, publishers)
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// The content store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// The event sink.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Records with a full pipeline in flight.
    ///
    /// Batch drivers and task runners built from this orchestrator share it.
    #[must_use]
    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs the article stage.
    pub async fn generate_article(&self, id: ContentId) -> Result<StageOutcome, PipelineError> {
        Ok(self.run_stage(id, Stage::GenerateArticle).await?.outcome)
    }

    /// Runs the image stage.
    pub async fn generate_images(&self, id: ContentId) -> Result<StageOutcome, PipelineError> {
        Ok(self.run_stage(id, Stage::GenerateImages).await?.outcome)
    }

    /// Runs the publish stage for one platform.
    pub async fn publish(
        &self,
        id: ContentId,
        platform: Platform,
    ) -> Result<StageOutcome, PipelineError> {
        Ok(self.run_stage(id, Stage::publish(platform)).await?.outcome)
    }

    /// Runs every stage in order, stopping at the first failure.
    pub async fn run_pipeline(&self, id: ContentId) -> Result<PipelineRun, PipelineError> {
        let mut reports = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let report = self.run_stage(id, stage).await?;
            let failed = report.outcome.is_failed();
            reports.push(report);
            if failed {
                break;
            }
        }
        Ok(PipelineRun {
            content_id: id,
            reports,
        })
    }

    /// Runs one stage inside its span, emitting events and logging failures.
    pub async fn run_stage(&self, id: ContentId, stage: Stage) -> Result<StageReport, PipelineError> {
        let span = stage_span(id, stage.name());
        async move {
            let timer = SpanTimer::start(stage.name());
            self.events.try_emit(
                STAGE_STARTED,
                Some(json!({"content_id": id.0, "stage": stage.name()})),
            );

            let outcome = match self.execute(id, stage).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(error = %error, kind = error.kind(), "Stage failed");
                    StageOutcome::Failed { error }
                }
            };
            let duration_ms = timer.finish();
            self.emit_outcome(id, stage, &outcome, duration_ms);

            if let StageOutcome::Failed { error } = &outcome {
                self.failures.record(id, stage, error).await?;
            }

            Ok(StageReport {
                stage,
                outcome,
                duration_ms,
            })
        }
        .instrument(span)
        .await
    }

    /// Moves a record to `failed` and logs the reason.
    ///
    /// Already failed records are returned unchanged. The record is claimed
    /// while this runs so no sweep starts on it. A stage already running
    /// finds the record failed when it writes and discards its result.
    pub async fn abandon(&self, id: ContentId, reason: &str) -> Result<ContentItem, PipelineError> {
        let claim = self.in_flight.try_acquire(id);
        if claim.is_none() {
            warn!(content_id = id.0, "Abandoning a record with a run in flight");
        }

        let item = self.load(id).await?;
        if item.state == ContentState::Failed {
            return Ok(item);
        }

        let item = self
            .store
            .update(id, ContentPatch::new().state(ContentState::Failed))
            .await?
            .ok_or(PipelineError::NotFound(id))?;
        self.store
            .append_error_log(
                NewErrorLog::new(ABANDON_MODULE, reason)
                    .for_content(id)
                    .with_severity(Severity::High),
            )
            .await?;

        info!(content_id = id.0, reason, "Record abandoned");
        self.events.try_emit(
            PIPELINE_ABANDONED,
            Some(json!({"content_id": id.0, "reason": reason, "state": item.state})),
        );
        Ok(item)
    }

    async fn execute(&self, id: ContentId, stage: Stage) -> Result<StageOutcome, PipelineError> {
        match stage {
            Stage::GenerateArticle => self.article_stage(id).await,
            Stage::GenerateImages => self.image_stage(id).await,
            Stage::PublishTelegram => self.publish_stage(id, Platform::Telegram).await,
            Stage::PublishVk => self.publish_stage(id, Platform::Vk).await,
        }
    }

    async fn article_stage(&self, id: ContentId) -> Result<StageOutcome, PipelineError> {
        let item = self.load(id).await?;
        if item.state != ContentState::Draft {
            return Ok(StageOutcome::skipped(format!("state is {}", item.state)));
        }

        let request = ArticleRequest::for_item(&item, &self.config.generation);
        let response = bounded(
            "article generation",
            self.config.timeouts.article(),
            self.providers.article.generate(&request),
        )
        .await?;
        if response.text.trim().is_empty() {
            return Err(PipelineError::EmptyGenerationResult(EMPTY_ARTICLE.to_string()));
        }
        debug!(chars = response.text.chars().count(), "Article generated");

        let report = self.gate.score_article(&item.title, &response.text).await?;
        let patch = ContentPatch::new()
            .body(response.text)
            .article_qa(report.summary())
            .state(ContentState::ArticleReady);
        self.save(id, item.state, patch).await
    }

    async fn image_stage(&self, id: ContentId) -> Result<StageOutcome, PipelineError> {
        let item = self.load(id).await?;
        if item.state != ContentState::ArticleReady {
            return Ok(StageOutcome::skipped(format!("state is {}", item.state)));
        }
        if item.wants_no_images() {
            return Ok(StageOutcome::skipped("no images requested"));
        }
        if !item.has_body() {
            return Err(PipelineError::InvariantViolation(
                "Article text is empty, cannot generate images".to_string(),
            ));
        }

        let request = ImageRequest::for_item(&item, self.config.generation.image_context_chars);
        let mut images = bounded(
            "image generation",
            self.config.timeouts.image(),
            self.providers.image.generate(&request),
        )
        .await?;
        if images.is_empty() {
            return Err(PipelineError::EmptyGenerationResult(EMPTY_IMAGES.to_string()));
        }
        images.truncate(item.image_count as usize);
        debug!(count = images.len(), "Images generated");

        let report = self.gate.score_images(&item.title, &images).await?;
        let patch = ContentPatch::new()
            .images(images)
            .image_qa(report.summary())
            .state(ContentState::ImagesReady);
        self.save(id, item.state, patch).await
    }

    async fn publish_stage(
        &self,
        id: ContentId,
        platform: Platform,
    ) -> Result<StageOutcome, PipelineError> {
        let item = self.load(id).await?;
        if !item.targets.get(platform) {
            return Ok(StageOutcome::skipped(format!("{platform} is not a target")));
        }
        let ready = item.state == ContentState::ImagesReady
            || (item.state == ContentState::ArticleReady && item.wants_no_images());
        if !ready {
            return Ok(StageOutcome::skipped(format!("state is {}", item.state)));
        }
        if item.posted.get(platform) && self.config.publish.skip_already_posted {
            return Ok(StageOutcome::skipped(format!("already posted to {platform}")));
        }
        if let Some(violation) = item.invariant_violation() {
            return Err(PipelineError::InvariantViolation(violation));
        }

        self.gate.check_for_publish(&item).await?;

        let post = Post::from_item(&item);
        let receipt = bounded(
            "publish",
            self.config.timeouts.publish(),
            self.publishers.get(platform).publish(&post),
        )
        .await?;
        info!(
            %platform,
            post_id = receipt.post_id.as_deref().unwrap_or(""),
            attachments = receipt.attachments,
            "Published"
        );

        let mut posted = item.posted;
        posted.set(platform, true);
        let mut patch = ContentPatch::new().posted(platform, true);
        if posted.covers(&item.targets) {
            patch = patch.state(ContentState::Published);
        }
        let outcome = self.save(id, item.state, patch).await?;
        if outcome.is_skipped() {
            // The post exists even though the record moved on.
            self.store
                .update(id, ContentPatch::new().posted(platform, true))
                .await?;
        }
        Ok(outcome)
    }

    async fn load(&self, id: ContentId) -> Result<ContentItem, PipelineError> {
        self.store
            .get(id)
            .await?
            .ok_or(PipelineError::NotFound(id))
    }

    /// Writes a stage result unless the record left `expected` meanwhile.
    async fn save(
        &self,
        id: ContentId,
        expected: ContentState,
        patch: ContentPatch,
    ) -> Result<StageOutcome, PipelineError> {
        match self.store.update(id, patch.when_state(expected)).await {
            Ok(Some(item)) => Ok(StageOutcome::Completed { state: item.state }),
            Ok(None) => Err(PipelineError::NotFound(id)),
            Err(StoreError::StateConflict { actual, .. }) => {
                warn!(%expected, %actual, "Record changed while the stage ran, result discarded");
                Ok(StageOutcome::skipped(format!(
                    "state changed to {actual} while running"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn emit_outcome(&self, id: ContentId, stage: Stage, outcome: &StageOutcome, duration_ms: f64) {
        match outcome {
            StageOutcome::Completed { state } => self.events.try_emit(
                STAGE_COMPLETED,
                Some(json!({
                    "content_id": id.0,
                    "stage": stage.name(),
                    "state": state,
                    "duration_ms": duration_ms,
                })),
            ),
            StageOutcome::Skipped { reason } => self.events.try_emit(
                STAGE_SKIPPED,
                Some(json!({
                    "content_id": id.0,
                    "stage": stage.name(),
                    "reason": reason,
                })),
            ),
            StageOutcome::Failed { error } => self.events.try_emit(
                STAGE_FAILED,
                Some(json!({
                    "content_id": id.0,
                    "stage": stage.name(),
                    "error": error.to_dict(),
                    "duration_ms": duration_ms,
                })),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NewContentItem;
    use crate::events::CollectingEventSink;
    use crate::testing::PipelineFixture;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_article_stage_skips_outside_draft() {
        let fx = PipelineFixture::new();
        let id = fx.insert(NewContentItem::new("T", "b")).await;
        fx.store
            .update(id, ContentPatch::new().body("x").state(ContentState::ArticleReady))
            .await
            .unwrap();

        let outcome = fx.orchestrator.generate_article(id).await.unwrap();

        assert!(outcome.is_skipped());
        assert!(fx.article.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_article_is_failure_and_state_kept() {
        let fx = PipelineFixture::new();
        fx.article.push_text("   ");
        let id = fx.insert(NewContentItem::new("T", "b")).await;

        let outcome = fx.orchestrator.generate_article(id).await.unwrap();

        assert_eq!(outcome.error().unwrap().to_string(), EMPTY_ARTICLE);
        assert_eq!(fx.item(id).await.state, ContentState::Draft);
        assert_eq!(fx.logs(id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_image_list_is_truncated_to_count() {
        let fx = PipelineFixture::new();
        fx.image.push_images(vec!["a", "b", "c"]);
        let id = fx.insert(NewContentItem::new("T", "b").with_image_count(2)).await;

        fx.orchestrator.generate_article(id).await.unwrap();
        let outcome = fx.orchestrator.generate_images(id).await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(fx.item(id).await.images, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_body_in_article_ready_is_invariant_violation() {
        let fx = PipelineFixture::new();
        let id = fx.insert(NewContentItem::new("T", "b")).await;
        fx.store
            .update(id, ContentPatch::new().state(ContentState::ArticleReady))
            .await
            .unwrap();

        let outcome = fx.orchestrator.generate_images(id).await.unwrap();

        assert_eq!(outcome.error().unwrap().kind(), "InvariantViolation");
        assert!(fx.image.calls().is_empty());
        assert_eq!(fx.item(id).await.state, ContentState::ArticleReady);
    }

    #[tokio::test]
    async fn test_publish_one_platform_keeps_state() {
        let fx = PipelineFixture::new();
        let id = fx.insert(NewContentItem::new("T", "b")).await;
        fx.orchestrator.generate_article(id).await.unwrap();
        fx.orchestrator.generate_images(id).await.unwrap();

        let outcome = fx.orchestrator.publish(id, Platform::Telegram).await.unwrap();

        assert!(outcome.is_completed());
        let item = fx.item(id).await;
        assert!(item.posted.telegram);
        assert!(!item.posted.vk);
        assert_eq!(item.state, ContentState::ImagesReady);
    }

    #[tokio::test]
    async fn test_stage_events_carry_content_id() {
        let sink = Arc::new(CollectingEventSink::new());
        let fx = PipelineFixture::new().with_events(sink.clone());
        let id = fx.insert(NewContentItem::new("T", "b")).await;

        fx.orchestrator.generate_article(id).await.unwrap();

        assert_eq!(sink.names(), vec![STAGE_STARTED, STAGE_COMPLETED]);
        let payload = &sink.payloads(STAGE_COMPLETED)[0];
        assert_eq!(payload["content_id"], json!(id.0));
        assert_eq!(payload["state"], json!("article_ready"));
    }

    #[tokio::test]
    async fn test_abandon_is_idempotent() {
        let fx = PipelineFixture::new();
        let id = fx.insert(NewContentItem::new("T", "b")).await;

        let item = fx.orchestrator.abandon(id, "operator request").await.unwrap();
        assert_eq!(item.state, ContentState::Failed);
        fx.orchestrator.abandon(id, "again").await.unwrap();

        let logs = fx.logs(id).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].module, ABANDON_MODULE);
        assert_eq!(logs[0].error, "operator request");
    }

    #[tokio::test]
    async fn test_abandon_missing_record() {
        let fx = PipelineFixture::new();
        let err = fx.orchestrator.abandon(ContentId(99), "x").await.unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }
}

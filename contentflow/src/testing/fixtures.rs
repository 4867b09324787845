//! Ready-wired pipelines and sample records.

use chrono::Utc;
use std::sync::Arc;

use super::mocks::{
    RecordingPublisher, ScriptedArticleProvider, ScriptedImageProvider, ScriptedQaProvider,
};
use crate::config::AppConfig;
use crate::core::{ContentId, ContentItem, ErrorLogEntry, NewContentItem, Platform};
use crate::events::{EventSink, NoOpEventSink};
use crate::pipeline::{BatchDriver, CompositeRunner, Orchestrator};
use crate::providers::ProviderSet;
use crate::publishers::{Publisher, PublisherSet};
use crate::store::{ContentStore, InMemoryContentStore};

/// An orchestrator over scripted adapters and a store.
///
/// The adapters are public so tests can script replies and inspect calls.
/// The `with_*` methods rebuild the orchestrator around the same store.
pub struct PipelineFixture {
    /// Configuration the orchestrator runs with.
    pub config: Arc<AppConfig>,
    /// The store.
    pub store: Arc<dyn ContentStore>,
    /// Article provider.
    pub article: Arc<ScriptedArticleProvider>,
    /// Image provider.
    pub image: Arc<ScriptedImageProvider>,
    /// QA provider.
    pub qa: Arc<ScriptedQaProvider>,
    /// Telegram publisher.
    pub telegram: Arc<RecordingPublisher>,
    /// VK publisher.
    pub vk: Arc<RecordingPublisher>,
    /// The orchestrator under test.
    pub orchestrator: Orchestrator,
    publishers: PublisherSet,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineFixture")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineFixture {
    /// Creates a fixture over an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryContentStore::new()))
    }

    /// Creates a fixture over the given store.
    #[must_use]
    pub fn with_store(store: Arc<dyn ContentStore>) -> Self {
        let telegram = Arc::new(RecordingPublisher::new(Platform::Telegram));
        let vk = Arc::new(RecordingPublisher::new(Platform::Vk));
        let publishers = PublisherSet::new(telegram.clone(), vk.clone());
        let config = Arc::new(AppConfig::stubbed());
        let article = Arc::new(ScriptedArticleProvider::new());
        let image = Arc::new(ScriptedImageProvider::new());
        let qa = Arc::new(ScriptedQaProvider::default());
        let events: Arc<dyn EventSink> = Arc::new(NoOpEventSink);
        let orchestrator = Orchestrator::new(
            Arc::clone(&config),
            Arc::clone(&store),
            ProviderSet::new(article.clone(), image.clone(), qa.clone()),
            publishers.clone(),
        );
        Self {
            config,
            store,
            article,
            image,
            qa,
            telegram,
            vk,
            orchestrator,
            publishers,
            events,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Arc::new(config);
        self.rebuild();
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self.rebuild();
        self
    }

    /// Replaces the publishers, e.g. with mocks.
    ///
    /// The recording publishers stay in place but are no longer called.
    #[must_use]
    pub fn with_publishers(mut self, telegram: Arc<dyn Publisher>, vk: Arc<dyn Publisher>) -> Self {
        self.publishers = PublisherSet::new(telegram, vk);
        self.rebuild();
        self
    }

    /// Replaces the scripted providers.
    #[must_use]
    pub fn with_providers(
        mut self,
        article: ScriptedArticleProvider,
        image: ScriptedImageProvider,
        qa: ScriptedQaProvider,
    ) -> Self {
        self.article = Arc::new(article);
        self.image = Arc::new(image);
        self.qa = Arc::new(qa);
        self.rebuild();
        self
    }

    fn rebuild(&mut self) {
        let providers = ProviderSet::new(self.article.clone(), self.image.clone(), self.qa.clone());
        self.orchestrator = Orchestrator::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            providers,
            self.publishers.clone(),
        )
        .with_event_sink(Arc::clone(&self.events));
    }

    /// A composite runner over the orchestrator.
    #[must_use]
    pub fn composite(&self) -> CompositeRunner {
        CompositeRunner::new(self.orchestrator.clone())
    }

    /// A batch driver over the orchestrator.
    #[must_use]
    pub fn batch(&self) -> BatchDriver {
        BatchDriver::new(self.orchestrator.clone())
    }

    /// Inserts a record and returns its id.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects the record.
    pub async fn insert(&self, item: NewContentItem) -> ContentId {
        match self.store.insert(item).await {
            Ok(item) => item.id,
            Err(e) => panic!("fixture insert failed: {e}"),
        }
    }

    /// Fetches a record that must exist.
    ///
    /// # Panics
    ///
    /// Panics if the record is missing or the store fails.
    pub async fn item(&self, id: ContentId) -> ContentItem {
        match self.store.get(id).await {
            Ok(Some(item)) => item,
            Ok(None) => panic!("record {id} not found"),
            Err(e) => panic!("fixture get failed: {e}"),
        }
    }

    /// Error logs of one record.
    ///
    /// # Panics
    ///
    /// Panics if the store fails.
    pub async fn logs(&self, id: ContentId) -> Vec<ErrorLogEntry> {
        match self.store.error_logs(Some(id)).await {
            Ok(logs) => logs,
            Err(e) => panic!("fixture error_logs failed: {e}"),
        }
    }
}

/// A draft input with the given title.
#[must_use]
pub fn new_item(title: &str) -> NewContentItem {
    NewContentItem::new(title, format!("About {title}")).with_keywords(["news"])
}

/// `count` draft inputs titled `Item 1`, `Item 2`, ...
#[must_use]
pub fn sample_items(count: usize) -> Vec<NewContentItem> {
    (1..=count).map(|i| new_item(&format!("Item {i}"))).collect()
}

/// A materialised draft record, for tests that bypass the store.
#[must_use]
pub fn draft_item(id: u64, title: &str) -> ContentItem {
    new_item(title).into_item(ContentId(id), Utc::now())
}

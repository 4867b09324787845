//! Scripted adapters for testing.
//!
//! Each mock answers from a queue first and falls back to a default once the
//! queue is empty, and records every call it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{
    ContentId, ContentItem, ContentPatch, ContentState, ErrorLogEntry, NewContentItem, NewErrorLog,
    Platform, Severity,
};
use crate::errors::{ProviderError, StoreError};
use crate::providers::{
    ArticleProvider, ArticleRequest, ArticleResponse, ImageProvider, ImageRequest, QaProvider,
    QaReport,
};
use crate::publishers::{Post, PublishReceipt, Publisher};
use crate::store::ContentStore;

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// An article provider with scripted replies.
#[derive(Debug)]
pub struct ScriptedArticleProvider {
    queue: Mutex<VecDeque<Result<String, ProviderError>>>,
    default: Mutex<Result<String, ProviderError>>,
    by_title: Mutex<HashMap<String, ProviderError>>,
    calls: Mutex<Vec<ArticleRequest>>,
    delay: Option<Duration>,
}

impl Default for ScriptedArticleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedArticleProvider {
    /// Creates a provider answering "body text".
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new(Ok("body text".to_string())),
            by_title: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.queue.lock().push_back(Ok(text.into()));
    }

    /// Queues a failure.
    pub fn push_error(&self, err: ProviderError) {
        self.queue.lock().push_back(Err(err));
    }

    /// Fails every call once the queue is empty.
    pub fn fail_always(&self, err: ProviderError) {
        *self.default.lock() = Err(err);
    }

    /// Fails every call for records with this title.
    pub fn fail_title(&self, title: impl Into<String>, err: ProviderError) {
        self.by_title.lock().insert(title.into(), err);
    }

    /// Returns the requests received.
    #[must_use]
    pub fn calls(&self) -> Vec<ArticleRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ArticleProvider for ScriptedArticleProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ArticleRequest) -> Result<ArticleResponse, ProviderError> {
        self.calls.lock().push(request.clone());
        pause(self.delay).await;

        if let Some(err) = self.by_title.lock().get(&request.title) {
            return Err(err.clone());
        }
        let next = self.queue.lock().pop_front();
        let text = next.unwrap_or_else(|| self.default.lock().clone())?;
        Ok(ArticleResponse {
            title: request.title.clone(),
            text,
            model: "scripted".to_string(),
        })
    }
}

/// An image provider with scripted replies.
#[derive(Debug)]
pub struct ScriptedImageProvider {
    queue: Mutex<VecDeque<Result<Vec<String>, ProviderError>>>,
    default: Mutex<Result<Vec<String>, ProviderError>>,
    calls: Mutex<Vec<ImageRequest>>,
    delay: Option<Duration>,
}

impl Default for ScriptedImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedImageProvider {
    /// Creates a provider answering `["img1", "img2"]`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new(Ok(vec!["img1".to_string(), "img2".to_string()])),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues an image list.
    pub fn push_images(&self, images: Vec<&str>) {
        self.queue
            .lock()
            .push_back(Ok(images.into_iter().map(String::from).collect()));
    }

    /// Queues a failure.
    pub fn push_error(&self, err: ProviderError) {
        self.queue.lock().push_back(Err(err));
    }

    /// Fails every call once the queue is empty.
    pub fn fail_always(&self, err: ProviderError) {
        *self.default.lock() = Err(err);
    }

    /// Returns the requests received.
    #[must_use]
    pub fn calls(&self) -> Vec<ImageRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ImageProvider for ScriptedImageProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ProviderError> {
        self.calls.lock().push(request.clone());
        pause(self.delay).await;

        let next = self.queue.lock().pop_front();
        next.unwrap_or_else(|| self.default.lock().clone())
    }
}

type QaReply = Result<QaReport, ProviderError>;

/// A QA provider with scripted verdicts.
///
/// Article and image calls have separate queues and defaults. Failure
/// classification goes through the same calls.
#[derive(Debug)]
pub struct ScriptedQaProvider {
    article_queue: Mutex<VecDeque<QaReply>>,
    image_queue: Mutex<VecDeque<QaReply>>,
    article_default: Mutex<QaReply>,
    image_default: Mutex<QaReply>,
    article_calls: Mutex<Vec<(String, String)>>,
    image_calls: Mutex<Vec<(String, Vec<String>)>>,
    delay: Option<Duration>,
}

impl Default for ScriptedQaProvider {
    fn default() -> Self {
        Self::scoring(8.0, 7.0)
    }
}

impl ScriptedQaProvider {
    /// Creates a provider that scores articles and images with fixed values.
    #[must_use]
    pub fn scoring(article: f64, images: f64) -> Self {
        Self {
            article_queue: Mutex::new(VecDeque::new()),
            image_queue: Mutex::new(VecDeque::new()),
            article_default: Mutex::new(Ok(Self::report(article))),
            image_default: Mutex::new(Ok(Self::report(images))),
            article_calls: Mutex::new(Vec::new()),
            image_calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// A low-severity verdict with the given score.
    #[must_use]
    pub fn report(score: f64) -> QaReport {
        QaReport {
            score,
            comment: format!("scripted score {score}"),
            severity: Severity::Low,
            cause: None,
            recommendation: None,
        }
    }

    /// Sleeps before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues an article verdict.
    pub fn push_article(&self, reply: QaReply) {
        self.article_queue.lock().push_back(reply);
    }

    /// Queues an image verdict.
    pub fn push_images(&self, reply: QaReply) {
        self.image_queue.lock().push_back(reply);
    }

    /// Changes the default article score.
    pub fn set_article_score(&self, score: f64) {
        *self.article_default.lock() = Ok(Self::report(score));
    }

    /// Changes the default image score.
    pub fn set_image_score(&self, score: f64) {
        *self.image_default.lock() = Ok(Self::report(score));
    }

    /// Fails every call once the queues are empty.
    pub fn fail_always(&self, err: ProviderError) {
        *self.article_default.lock() = Err(err.clone());
        *self.image_default.lock() = Err(err);
    }

    /// Returns the `(title, text)` pairs of article calls.
    #[must_use]
    pub fn article_calls(&self) -> Vec<(String, String)> {
        self.article_calls.lock().clone()
    }

    /// Returns the `(title, images)` pairs of image calls.
    #[must_use]
    pub fn image_calls(&self) -> Vec<(String, Vec<String>)> {
        self.image_calls.lock().clone()
    }
}

#[async_trait]
impl QaProvider for ScriptedQaProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze_article(&self, title: &str, text: &str) -> Result<QaReport, ProviderError> {
        self.article_calls
            .lock()
            .push((title.to_string(), text.to_string()));
        pause(self.delay).await;

        let next = self.article_queue.lock().pop_front();
        next.unwrap_or_else(|| self.article_default.lock().clone())
    }

    async fn analyze_images(
        &self,
        title: &str,
        images: &[String],
    ) -> Result<QaReport, ProviderError> {
        self.image_calls
            .lock()
            .push((title.to_string(), images.to_vec()));
        pause(self.delay).await;

        let next = self.image_queue.lock().pop_front();
        next.unwrap_or_else(|| self.image_default.lock().clone())
    }
}

/// A publisher that records every post.
#[derive(Debug)]
pub struct RecordingPublisher {
    platform: Platform,
    posts: Mutex<Vec<Post>>,
    queue: Mutex<VecDeque<ProviderError>>,
    failure: Mutex<Option<ProviderError>>,
    delay: Option<Duration>,
}

impl RecordingPublisher {
    /// Creates a publisher that always succeeds.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            posts: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            failure: Mutex::new(None),
            delay: None,
        }
    }

    /// Sleeps before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails the next call.
    pub fn push_error(&self, err: ProviderError) {
        self.queue.lock().push_back(err);
    }

    /// Fails every call once the queue is empty.
    pub fn fail_always(&self, err: ProviderError) {
        *self.failure.lock() = Some(err);
    }

    /// Returns every post received, including failed ones.
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    /// Number of publish calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.posts.lock().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(&self, post: &Post) -> Result<PublishReceipt, ProviderError> {
        let number = {
            let mut posts = self.posts.lock();
            posts.push(post.clone());
            posts.len()
        };
        pause(self.delay).await;

        let queued = self.queue.lock().pop_front();
        if let Some(err) = queued.or_else(|| self.failure.lock().clone()) {
            return Err(err);
        }
        Ok(PublishReceipt {
            platform: self.platform,
            post_id: Some(format!("{}-{number}", self.platform)),
            attachments: post.images.len(),
        })
    }
}

/// Wraps a store and fails selected operations on demand.
pub struct FailingStore {
    inner: Arc<dyn ContentStore>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_appends: AtomicBool,
}

impl std::fmt::Debug for FailingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingStore")
            .field("fail_reads", &self.fail_reads)
            .field("fail_writes", &self.fail_writes)
            .field("fail_appends", &self.fail_appends)
            .finish_non_exhaustive()
    }
}

impl FailingStore {
    /// Wraps a store with every operation passing through.
    #[must_use]
    pub fn new(inner: impl ContentStore + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_appends: AtomicBool::new(false),
        }
    }

    /// Fails `get`, `list_by_state` and `error_logs`.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fails `insert`, `update` and `delete`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fails `append_error_log`.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("{operation} failed (injected)")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentStore for FailingStore {
    async fn insert(&self, item: NewContentItem) -> Result<ContentItem, StoreError> {
        Self::check(&self.fail_writes, "insert")?;
        self.inner.insert(item).await
    }

    async fn get(&self, id: ContentId) -> Result<Option<ContentItem>, StoreError> {
        Self::check(&self.fail_reads, "get")?;
        self.inner.get(id).await
    }

    async fn update(
        &self,
        id: ContentId,
        patch: ContentPatch,
    ) -> Result<Option<ContentItem>, StoreError> {
        Self::check(&self.fail_writes, "update")?;
        self.inner.update(id, patch).await
    }

    async fn list_by_state(&self, states: &[ContentState]) -> Result<Vec<ContentItem>, StoreError> {
        Self::check(&self.fail_reads, "list")?;
        self.inner.list_by_state(states).await
    }

    async fn delete(&self, id: ContentId) -> Result<bool, StoreError> {
        Self::check(&self.fail_writes, "delete")?;
        self.inner.delete(id).await
    }

    async fn append_error_log(&self, entry: NewErrorLog) -> Result<ErrorLogEntry, StoreError> {
        Self::check(&self.fail_appends, "append_error_log")?;
        self.inner.append_error_log(entry).await
    }

    async fn error_logs(&self, id: Option<ContentId>) -> Result<Vec<ErrorLogEntry>, StoreError> {
        Self::check(&self.fail_reads, "error_logs")?;
        self.inner.error_logs(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryContentStore;

    fn article_request(title: &str) -> ArticleRequest {
        ArticleRequest {
            title: title.to_string(),
            brief: String::new(),
            keywords: Vec::new(),
            style: "informative".to_string(),
            platform: "telegram".to_string(),
            length: "medium".to_string(),
        }
    }

    #[tokio::test]
    async fn test_article_queue_then_default() {
        let provider = ScriptedArticleProvider::new();
        provider.push_error(ProviderError::Network("down".to_string()));

        assert!(provider.generate(&article_request("a")).await.is_err());
        let response = provider.generate(&article_request("a")).await.unwrap();
        assert_eq!(response.text, "body text");
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_article_failure_by_title() {
        let provider = ScriptedArticleProvider::new();
        provider.fail_title("bad", ProviderError::Empty("nothing".to_string()));

        assert!(provider.generate(&article_request("bad")).await.is_err());
        assert!(provider.generate(&article_request("good")).await.is_ok());
    }

    #[tokio::test]
    async fn test_qa_records_calls() {
        let qa = ScriptedQaProvider::scoring(3.0, 9.0);
        let report = qa.analyze_article("t", "x").await.unwrap();
        assert!((report.score - 3.0).abs() < f64::EPSILON);
        qa.analyze_images("t", &["i".to_string()]).await.unwrap();

        assert_eq!(qa.article_calls(), vec![("t".to_string(), "x".to_string())]);
        assert_eq!(qa.image_calls()[0].1, vec!["i".to_string()]);
    }

    #[tokio::test]
    async fn test_recording_publisher() {
        let publisher = RecordingPublisher::new(Platform::Vk);
        publisher.push_error(ProviderError::api("VK", 5, "auth"));
        let post = Post {
            title: "t".to_string(),
            text: "x".to_string(),
            images: vec!["i".to_string()],
        };

        assert!(publisher.publish(&post).await.is_err());
        let receipt = publisher.publish(&post).await.unwrap();
        assert_eq!(receipt.post_id.as_deref(), Some("vk-2"));
        assert_eq!(publisher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_store_toggles() {
        let store = FailingStore::new(InMemoryContentStore::new());
        let item = store.insert(NewContentItem::new("t", "b")).await.unwrap();

        store.fail_reads(true);
        assert!(store.get(item.id).await.is_err());
        store.fail_reads(false);
        assert!(store.get(item.id).await.unwrap().is_some());
    }
}

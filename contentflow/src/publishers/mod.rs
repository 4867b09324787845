//! Platform publisher boundary.
//!
//! A publisher makes one text post and then one attachment operation per
//! image, in list order. Any non-success answer from the platform is an
//! error; partial attachment progress is not rolled back.

mod dry_run;
mod telegram;
mod vk;

pub use dry_run::DryRunPublisher;
pub use telegram::TelegramPublisher;
pub use vk::VkPublisher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{AppConfig, PublisherMode};
use crate::core::{ContentItem, Platform};
use crate::errors::ProviderError;

/// What gets posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Title.
    pub title: String,
    /// Body text.
    pub text: String,
    /// Image references in posting order.
    pub images: Vec<String>,
}

impl Post {
    /// Builds a post from a record.
    #[must_use]
    pub fn from_item(item: &ContentItem) -> Self {
        Self {
            title: item.title.clone(),
            text: item.body.clone(),
            images: item.images.clone(),
        }
    }
}

/// Platform acknowledgement of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Where it was posted.
    pub platform: Platform,
    /// Platform id of the text post, when the platform returns one.
    pub post_id: Option<String>,
    /// Number of images attached.
    pub attachments: usize,
}

/// Posts content to one platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// The platform this publisher posts to.
    fn platform(&self) -> Platform;

    /// Posts the text, then attaches each image.
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, ProviderError>;
}

/// One publisher per platform.
#[derive(Clone)]
pub struct PublisherSet {
    telegram: Arc<dyn Publisher>,
    vk: Arc<dyn Publisher>,
}

impl std::fmt::Debug for PublisherSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherSet")
            .field("telegram", &self.telegram.platform())
            .field("vk", &self.vk.platform())
            .finish()
    }
}

impl PublisherSet {
    /// Creates a set from explicit publishers.
    #[must_use]
    pub fn new(telegram: Arc<dyn Publisher>, vk: Arc<dyn Publisher>) -> Self {
        Self { telegram, vk }
    }

    /// Creates a dry-run set.
    #[must_use]
    pub fn dry_run() -> Self {
        Self::new(
            Arc::new(DryRunPublisher::new(Platform::Telegram)),
            Arc::new(DryRunPublisher::new(Platform::Vk)),
        )
    }

    /// Selects publishers according to configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        match config.providers.publisher {
            PublisherMode::Live => Self::new(
                Arc::new(TelegramPublisher::new(&config.telegram)),
                Arc::new(VkPublisher::new(&config.vk)),
            ),
            PublisherMode::DryRun => Self::dry_run(),
        }
    }

    /// Returns the publisher for a platform.
    #[must_use]
    pub fn get(&self, platform: Platform) -> &Arc<dyn Publisher> {
        match platform {
            Platform::Telegram => &self.telegram,
            Platform::Vk => &self.vk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentId, NewContentItem};
    use chrono::Utc;

    #[test]
    fn test_post_from_item() {
        let mut item = NewContentItem::new("T", "B").into_item(ContentId(1), Utc::now());
        item.body = "text".to_string();
        item.images = vec!["a".to_string(), "b".to_string()];

        let post = Post::from_item(&item);
        assert_eq!(post.title, "T");
        assert_eq!(post.text, "text");
        assert_eq!(post.images, vec!["a", "b"]);
    }

    #[test]
    fn test_set_routes_by_platform() {
        let set = PublisherSet::dry_run();
        assert_eq!(set.get(Platform::Telegram).platform(), Platform::Telegram);
        assert_eq!(set.get(Platform::Vk).platform(), Platform::Vk);
    }

    #[tokio::test]
    async fn test_mock_publisher_can_stand_in() {
        let mut mock = MockPublisher::new();
        mock.expect_platform().return_const(Platform::Vk);
        mock.expect_publish().times(1).returning(|post| {
            Ok(PublishReceipt {
                platform: Platform::Vk,
                post_id: Some("1".to_string()),
                attachments: post.images.len(),
            })
        });

        let post = Post {
            title: "t".to_string(),
            text: "x".to_string(),
            images: vec!["i".to_string()],
        };
        let receipt = mock.publish(&post).await.unwrap();
        assert_eq!(receipt.attachments, 1);
        assert_eq!(mock.platform(), Platform::Vk);
    }
}

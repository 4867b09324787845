//! Publisher that only logs.

use async_trait::async_trait;
use tracing::info;

use super::{Post, PublishReceipt, Publisher};
use crate::core::Platform;
use crate::errors::ProviderError;

/// Logs the post instead of sending it. Always succeeds.
#[derive(Debug, Clone, Copy)]
pub struct DryRunPublisher {
    platform: Platform,
}

impl DryRunPublisher {
    /// Creates a dry-run publisher for a platform.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(&self, post: &Post) -> Result<PublishReceipt, ProviderError> {
        info!(
            platform = %self.platform,
            title = %post.title,
            chars = post.text.chars().count(),
            images = post.images.len(),
            "Dry run: post not sent"
        );
        Ok(PublishReceipt {
            platform: self.platform,
            post_id: None,
            attachments: post.images.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_succeeds() {
        let publisher = DryRunPublisher::new(Platform::Vk);
        let receipt = publisher
            .publish(&Post {
                title: "t".to_string(),
                text: "x".to_string(),
                images: vec!["a".to_string(), "b".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(receipt.platform, Platform::Vk);
        assert_eq!(receipt.attachments, 2);
        assert!(receipt.post_id.is_none());
    }
}

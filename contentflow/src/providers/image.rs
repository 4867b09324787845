//! Image generation providers.

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::openai::{ImageGenerationRequest, OpenAiClient};
use crate::config::OpenAiConfig;
use crate::core::ContentItem;
use crate::errors::ProviderError;
use crate::utils::char_prefix;

/// Input for image generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Article title.
    pub title: String,
    /// Bounded prefix of the article body.
    pub context: String,
    /// Visual style.
    pub style: String,
    /// Number of images wanted.
    pub count: u32,
}

impl ImageRequest {
    /// Builds a request from a record, keeping the first `context_chars`
    /// characters of the body as context.
    #[must_use]
    pub fn for_item(item: &ContentItem, context_chars: usize) -> Self {
        Self {
            title: item.title.clone(),
            context: char_prefix(&item.body, context_chars).to_string(),
            style: item.image_style.clone(),
            count: item.image_count,
        }
    }
}

/// Produces an ordered list of image references.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Variant name.
    fn name(&self) -> &str;

    /// Generates up to `request.count` images.
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ProviderError>;
}

/// Builds the illustration prompt for a request.
#[must_use]
pub fn build_image_prompt(request: &ImageRequest) -> String {
    format!(
        "Create a high-quality illustration for an article.\n\n\
         Title: {}\n\n\
         Context:\n{}\n\n\
         Visual style: {}\n\
         Requirements:\n\
         - No text on image\n\
         - Professional composition\n\
         - Suitable for social media and blog preview\n",
        request.title, request.context, request.style
    )
}

/// Images API backed provider.
#[derive(Debug, Clone)]
pub struct OpenAiImageProvider {
    client: OpenAiClient,
    model: String,
    size: String,
    quality: String,
}

impl OpenAiImageProvider {
    /// Creates the provider.
    #[must_use]
    pub fn new(client: OpenAiClient, config: &OpenAiConfig) -> Self {
        Self {
            client,
            model: config.image_model.clone(),
            size: config.image_size.clone(),
            quality: config.image_quality.clone(),
        }
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ProviderError> {
        info!(title = %request.title, count = request.count, model = %self.model, "Generating images");

        let body = ImageGenerationRequest {
            model: self.model.clone(),
            prompt: build_image_prompt(request),
            size: self.size.clone(),
            quality: self.quality.clone(),
            n: request.count,
        };
        self.client.generate_images(&body).await
    }
}

/// Deterministic provider returning placeholder URLs derived from the prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubImageProvider;

impl StubImageProvider {
    /// Returns the URLs the stub produces for a request.
    #[must_use]
    pub fn urls_for(request: &ImageRequest) -> Vec<String> {
        let digest = format!("{:x}", Md5::digest(build_image_prompt(request).as_bytes()));
        let short = &digest[..8];
        (1..=request.count)
            .map(|i| format!("https://stub.images/{short}_{i}.png"))
            .collect()
    }
}

#[async_trait]
impl ImageProvider for StubImageProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ProviderError> {
        Ok(Self::urls_for(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentId, NewContentItem};
    use chrono::Utc;

    fn request(count: u32) -> ImageRequest {
        ImageRequest {
            title: "T".to_string(),
            context: "body".to_string(),
            style: "flat".to_string(),
            count,
        }
    }

    #[test]
    fn test_for_item_bounds_context() {
        let mut item = NewContentItem::new("T", "")
            .with_image_count(2)
            .into_item(ContentId(1), Utc::now());
        item.body = "é".repeat(2000);

        let request = ImageRequest::for_item(&item, 1500);
        assert_eq!(request.context.chars().count(), 1500);
        assert_eq!(request.count, 2);
    }

    #[test]
    fn test_prompt_contains_context_and_style() {
        let prompt = build_image_prompt(&request(1));
        assert!(prompt.contains("Title: T"));
        assert!(prompt.contains("Context:\nbody"));
        assert!(prompt.contains("Visual style: flat"));
        assert!(prompt.contains("No text on image"));
    }

    #[tokio::test]
    async fn test_stub_urls_are_stable_and_counted() {
        let urls = StubImageProvider.generate(&request(3)).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].starts_with("https://stub.images/"));
        assert!(urls[0].ends_with("_1.png"));
        assert!(urls[2].ends_with("_3.png"));
        assert_eq!(urls, StubImageProvider::urls_for(&request(3)));
    }

    #[tokio::test]
    async fn test_stub_zero_count_is_empty() {
        let urls = StubImageProvider.generate(&request(0)).await.unwrap();
        assert!(urls.is_empty());
    }
}

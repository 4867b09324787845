//! Generation and QA provider boundaries.
//!
//! Providers are stateless: inputs go in, an artifact comes out, and the
//! only side effect is the external call. Each capability has an
//! LLM-backed and a deterministic stub implementation, chosen by
//! [`ProviderSet::from_config`] at start-up.

mod article;
mod image;
pub mod openai;
mod qa;

pub use article::{
    build_article_prompt, ArticleProvider, ArticleRequest, ArticleResponse, OpenAiArticleProvider,
    StubArticleProvider,
};
pub use image::{
    build_image_prompt, ImageProvider, ImageRequest, OpenAiImageProvider, StubImageProvider,
};
pub use qa::{
    build_article_qa_prompt, build_image_qa_prompt, parse_qa_response, OpenAiQaProvider,
    QaProvider, QaReport, StubQaProvider,
};

use std::sync::Arc;

use crate::config::{AppConfig, ProviderKind};
use openai::OpenAiClient;

/// The providers one orchestrator runs with.
#[derive(Clone)]
pub struct ProviderSet {
    /// Article generation.
    pub article: Arc<dyn ArticleProvider>,
    /// Image generation.
    pub image: Arc<dyn ImageProvider>,
    /// QA scoring and failure classification.
    pub qa: Arc<dyn QaProvider>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("article", &self.article.name())
            .field("image", &self.image.name())
            .field("qa", &self.qa.name())
            .finish()
    }
}

impl ProviderSet {
    /// Creates a set from explicit providers.
    #[must_use]
    pub fn new(
        article: Arc<dyn ArticleProvider>,
        image: Arc<dyn ImageProvider>,
        qa: Arc<dyn QaProvider>,
    ) -> Self {
        Self { article, image, qa }
    }

    /// Creates a set of stub providers.
    #[must_use]
    pub fn stub() -> Self {
        Self::new(
            Arc::new(StubArticleProvider),
            Arc::new(StubImageProvider),
            Arc::new(StubQaProvider),
        )
    }

    /// Selects providers according to configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let client = OpenAiClient::new(&config.openai);

        let article: Arc<dyn ArticleProvider> = match config.providers.article {
            ProviderKind::OpenAi => {
                Arc::new(OpenAiArticleProvider::new(client.clone(), &config.openai))
            }
            ProviderKind::Stub => Arc::new(StubArticleProvider),
        };
        let image: Arc<dyn ImageProvider> = match config.providers.image {
            ProviderKind::OpenAi => {
                Arc::new(OpenAiImageProvider::new(client.clone(), &config.openai))
            }
            ProviderKind::Stub => Arc::new(StubImageProvider),
        };
        let qa: Arc<dyn QaProvider> = match config.providers.qa {
            ProviderKind::OpenAi => Arc::new(OpenAiQaProvider::new(
                client,
                &config.openai,
                &config.qa_gate,
            )),
            ProviderKind::Stub => Arc::new(StubQaProvider),
        };

        Self::new(article, image, qa)
    }
}

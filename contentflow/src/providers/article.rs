//! Article generation providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::openai::{ChatMessage, ChatRequest, OpenAiClient};
use crate::config::{GenerationConfig, OpenAiConfig};
use crate::core::ContentItem;
use crate::errors::ProviderError;

const ARTICLE_SYSTEM_PROMPT: &str = "You are a professional editor and article writer.";

/// Input for article generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRequest {
    /// Article title.
    pub title: String,
    /// Topic description.
    pub brief: String,
    /// Keywords to cover.
    pub keywords: Vec<String>,
    /// Tone.
    pub style: String,
    /// Target platform hint.
    pub platform: String,
    /// Length hint.
    pub length: String,
}

impl ArticleRequest {
    /// Builds a request from a record, filling unset options from defaults.
    #[must_use]
    pub fn for_item(item: &ContentItem, defaults: &GenerationConfig) -> Self {
        Self {
            title: item.title.clone(),
            brief: item.brief.clone(),
            keywords: item.keywords.clone(),
            style: item.style.clone().unwrap_or_else(|| defaults.style.clone()),
            platform: item
                .platform_hint
                .clone()
                .unwrap_or_else(|| defaults.platform.clone()),
            length: item.length.clone().unwrap_or_else(|| defaults.length.clone()),
        }
    }
}

/// Generated article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleResponse {
    /// Title the article was written for.
    pub title: String,
    /// Body text.
    pub text: String,
    /// Model that produced it.
    pub model: String,
}

/// Produces article text.
#[async_trait]
pub trait ArticleProvider: Send + Sync {
    /// Variant name, e.g. `openai` or `stub`.
    fn name(&self) -> &str;

    /// Generates an article.
    async fn generate(&self, request: &ArticleRequest) -> Result<ArticleResponse, ProviderError>;
}

/// Builds the writer prompt for a request.
#[must_use]
pub fn build_article_prompt(request: &ArticleRequest) -> String {
    let mut prompt = format!(
        "You are a professional content writer.\n\n\
         Write an article on the topic:\n\"{}\"\n\n\
         Topic description:\n{}\n",
        request.title, request.brief
    );
    if !request.keywords.is_empty() {
        prompt.push_str(&format!("\nKeywords: {}\n", request.keywords.join(", ")));
    }
    prompt.push_str(&format!(
        "\nRequirements:\n\
         - Style: {}\n\
         - Length: {}\n\
         - Platform: {}\n\
         - Structured text\n\
         - No emoji\n\
         - No mention of AI\n\
         - No filler or generic phrases\n\
         - Specific, useful and readable\n\n\
         Format:\n\
         - Heading\n\
         - Main text\n\
         - Paragraphs of 3-4 lines",
        request.style, request.length, request.platform
    ));
    prompt
}

/// Chat-completion backed article writer.
#[derive(Debug, Clone)]
pub struct OpenAiArticleProvider {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiArticleProvider {
    /// Creates the provider.
    #[must_use]
    pub fn new(client: OpenAiClient, config: &OpenAiConfig) -> Self {
        Self {
            client,
            model: config.article_model.clone(),
            temperature: config.article_temperature,
            max_tokens: config.article_max_tokens,
        }
    }
}

#[async_trait]
impl ArticleProvider for OpenAiArticleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &ArticleRequest) -> Result<ArticleResponse, ProviderError> {
        info!(title = %request.title, model = %self.model, "Generating article");

        let chat = ChatRequest::new(&self.model)
            .message(ChatMessage::system(ARTICLE_SYSTEM_PROMPT))
            .message(ChatMessage::user(build_article_prompt(request)))
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

        let text = self.client.chat(&chat).await?;

        Ok(ArticleResponse {
            title: request.title.clone(),
            text: text.trim().to_string(),
            model: self.model.clone(),
        })
    }
}

/// Deterministic article writer for development and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubArticleProvider;

#[async_trait]
impl ArticleProvider for StubArticleProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: &ArticleRequest) -> Result<ArticleResponse, ProviderError> {
        let mut text = format!("{}\n\n", request.title);
        if request.brief.trim().is_empty() {
            text.push_str(&format!("A {} note about {}.", request.style, request.title));
        } else {
            text.push_str(request.brief.trim());
        }
        if !request.keywords.is_empty() {
            text.push_str(&format!("\n\nKeywords: {}", request.keywords.join(", ")));
        }

        Ok(ArticleResponse {
            title: request.title.clone(),
            text,
            model: "stub".to_string(),
        })
    }
}

//! Minimal OpenAI-compatible REST client shared by the LLM-backed providers.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OpenAiConfig;
use crate::errors::ProviderError;

const SERVICE: &str = "OpenAI";

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model name.
    pub model: String,
    /// Conversation.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Creates a request for a model.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Appends a message.
    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the token cap.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<ChoiceRaw>,
}

#[derive(Debug, Deserialize)]
struct ChoiceRaw {
    message: MessageRaw,
}

#[derive(Debug, Deserialize)]
struct MessageRaw {
    #[serde(default)]
    content: Option<String>,
}

/// Image generation request body.
#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest {
    /// Model name.
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// Image size.
    pub size: String,
    /// Image quality.
    pub quality: String,
    /// Number of images.
    pub n: u32,
}

#[derive(Debug, Deserialize)]
struct ImageResponseRaw {
    #[serde(default)]
    data: Vec<ImageDataRaw>,
}

#[derive(Debug, Deserialize)]
struct ImageDataRaw {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

/// HTTP client for the chat and image endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a client from configuration.
    ///
    /// A missing key is reported on first use, not here.
    #[must_use]
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            http: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials("openai", "OPENAI_API_KEY"))
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let key = self.api_key()?;
        let response = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, path, "OpenAI request failed");
                ProviderError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %text, path, "OpenAI API error");
            return Err(ProviderError::api(SERVICE, status.as_u16(), text));
        }
        Ok(response)
    }

    /// Runs a chat completion and returns the first choice's text.
    ///
    /// A missing choice or null content yields an empty string; callers
    /// decide whether that is an error.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let start = std::time::Instant::now();
        let response = self.post_json("chat/completions", request).await?;
        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "OpenAI chat completion"
        );

        Ok(raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Generates images and returns their references in response order.
    ///
    /// Entries carrying neither a URL nor inline data are dropped.
    pub async fn generate_images(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<Vec<String>, ProviderError> {
        let start = std::time::Instant::now();
        let response = self.post_json("images/generations", request).await?;
        let raw: ImageResponseRaw = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        debug!(
            model = %request.model,
            requested = request.n,
            returned = raw.data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "OpenAI image generation"
        );

        Ok(raw
            .data
            .into_iter()
            .filter_map(|d| match (d.url, d.b64_json) {
                (Some(url), _) if !url.is_empty() => Some(url),
                (_, Some(b64)) if !b64.is_empty() => Some(format!("data:image/png;base64,{b64}")),
                _ => None,
            })
            .collect())
    }
}

//! Telegram Bot API publisher.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{Post, PublishReceipt, Publisher};
use crate::config::TelegramConfig;
use crate::core::Platform;
use crate::errors::ProviderError;
use crate::utils::escape_html;

const SERVICE: &str = "Telegram";

#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

/// Formats the text message: bold escaped title, blank line, escaped body.
#[must_use]
pub(crate) fn format_message(post: &Post) -> String {
    format!(
        "<b>{}</b>\n\n{}",
        escape_html(&post.title),
        escape_html(&post.text)
    )
}

/// Posts to a channel through a bot.
#[derive(Debug, Clone)]
pub struct TelegramPublisher {
    http: Client,
    api_base: String,
    bot_token: Option<String>,
    channel_id: Option<String>,
}

impl TelegramPublisher {
    /// Creates the publisher. Missing credentials are reported on first use.
    #[must_use]
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            channel_id: config.channel_id.clone(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials("telegram", "BOT_TOKEN"))?;
        let channel = self
            .channel_id
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials("telegram", "TELEGRAM_CHANNEL_ID"))?;
        Ok((token, channel))
    }

    async fn call(
        &self,
        token: &str,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, ProviderError> {
        let response = self
            .http
            .post(format!("{}/bot{token}/{method}", self.api_base))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: BotResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::api(SERVICE, status.as_u16(), e.to_string()))?;

        if !parsed.ok {
            return Err(ProviderError::api(
                SERVICE,
                parsed.error_code.unwrap_or_else(|| status.as_u16()),
                format!(
                    "{method}: {}",
                    parsed.description.unwrap_or_else(|| "request failed".to_string())
                ),
            ));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn publish(&self, post: &Post) -> Result<PublishReceipt, ProviderError> {
        let (token, channel) = self.credentials()?;

        let result = self
            .call(
                token,
                "sendMessage",
                json!({
                    "chat_id": channel,
                    "text": format_message(post),
                    "parse_mode": "HTML",
                }),
            )
            .await?;
        let post_id = result
            .as_ref()
            .and_then(|r| r.get("message_id"))
            .map(ToString::to_string);

        for (index, image) in post.images.iter().enumerate() {
            self.call(
                token,
                "sendPhoto",
                json!({
                    "chat_id": channel,
                    "photo": image,
                    "caption": post.title,
                }),
            )
            .await?;
            debug!(index, "Telegram photo sent");
        }

        info!(
            channel,
            images = post.images.len(),
            "Published to Telegram"
        );

        Ok(PublishReceipt {
            platform: Platform::Telegram,
            post_id,
            attachments: post.images.len(),
        })
    }
}

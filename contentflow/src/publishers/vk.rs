//! VK community wall publisher.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use super::{Post, PublishReceipt, Publisher};
use crate::config::VkConfig;
use crate::core::Platform;
use crate::errors::ProviderError;

const SERVICE: &str = "VK";

struct Credentials<'a> {
    token: &'a str,
    group_id: &'a str,
}

impl Credentials<'_> {
    fn owner_id(&self) -> String {
        format!("-{}", self.group_id)
    }
}

/// Formats the wall message: title, blank line, body.
#[must_use]
pub(crate) fn format_message(post: &Post) -> String {
    format!("{}\n\n{}", post.title, post.text)
}

/// Reads the `response` member of a method reply, turning an `error`
/// member into an API error.
fn unwrap_response(method: &str, body: Value) -> Result<Value, ProviderError> {
    if let Some(error) = body.get("error") {
        let code = error
            .get("error_code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(0);
        let message = error
            .get("error_msg")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(ProviderError::api(SERVICE, code, format!("{method}: {message}")));
    }
    body.get("response")
        .cloned()
        .ok_or_else(|| ProviderError::Malformed(format!("VK {method}: no response member")))
}

fn field<'a>(method: &str, value: &'a Value, key: &str) -> Result<&'a Value, ProviderError> {
    value
        .get(key)
        .ok_or_else(|| ProviderError::Malformed(format!("VK {method}: missing '{key}'")))
}

fn as_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Posts to a community wall and attaches photos one by one.
#[derive(Debug, Clone)]
pub struct VkPublisher {
    http: Client,
    api_base: String,
    api_version: String,
    access_token: Option<String>,
    group_id: Option<String>,
}

impl VkPublisher {
    /// Creates the publisher. Missing credentials are reported on first use.
    #[must_use]
    pub fn new(config: &VkConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
            group_id: config.group_id.clone(),
        }
    }

    fn credentials(&self) -> Result<Credentials<'_>, ProviderError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials("vk", "VK_ACCESS_TOKEN"))?;
        let group_id = self
            .group_id
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials("vk", "VK_GROUP_ID"))?;
        Ok(Credentials { token, group_id })
    }

    async fn call(
        &self,
        creds: &Credentials<'_>,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let body: Value = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .query(params)
            .query(&[("access_token", creds.token), ("v", self.api_version.as_str())])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("VK {method}: {e}")))?;
        unwrap_response(method, body)
    }

    /// Uploads one image and returns its attachment id.
    async fn upload_photo(
        &self,
        creds: &Credentials<'_>,
        image: &str,
    ) -> Result<String, ProviderError> {
        let server = self
            .call(
                creds,
                "photos.getWallUploadServer",
                &[("group_id", creds.group_id.to_string())],
            )
            .await?;
        let upload_url = field("photos.getWallUploadServer", &server, "upload_url")?
            .as_str()
            .ok_or_else(|| ProviderError::Malformed("VK upload_url is not a string".to_string()))?
            .to_string();

        let bytes = self.http.get(image).send().await?.error_for_status()?.bytes().await?;
        let form = Form::new().part(
            "photo",
            Part::bytes(bytes.to_vec()).file_name("image.png"),
        );
        let uploaded: Value = self
            .http
            .post(&upload_url)
            .multipart(form)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("VK upload: {e}")))?;

        let saved = self
            .call(
                creds,
                "photos.saveWallPhoto",
                &[
                    ("group_id", creds.group_id.to_string()),
                    ("server", as_param(field("upload", &uploaded, "server")?)),
                    ("photo", as_param(field("upload", &uploaded, "photo")?)),
                    ("hash", as_param(field("upload", &uploaded, "hash")?)),
                ],
            )
            .await?;
        let photo = saved
            .get(0)
            .ok_or_else(|| ProviderError::Malformed("VK saveWallPhoto: empty list".to_string()))?;
        let id = as_param(field("photos.saveWallPhoto", photo, "id")?);
        let owner = photo
            .get("owner_id")
            .map_or_else(|| creds.owner_id(), as_param);

        Ok(format!("photo{owner}_{id}"))
    }
}

#[async_trait]
impl Publisher for VkPublisher {
    fn platform(&self) -> Platform {
        Platform::Vk
    }

    async fn publish(&self, post: &Post) -> Result<PublishReceipt, ProviderError> {
        let creds = self.credentials()?;
        let message = format_message(post);

        let posted = self
            .call(
                &creds,
                "wall.post",
                &[
                    ("owner_id", creds.owner_id()),
                    ("from_group", "1".to_string()),
                    ("message", message.clone()),
                ],
            )
            .await?;
        let post_id = as_param(field("wall.post", &posted, "post_id")?);

        let mut attachments: Vec<String> = Vec::with_capacity(post.images.len());
        for image in &post.images {
            attachments.push(self.upload_photo(&creds, image).await?);
            self.call(
                &creds,
                "wall.edit",
                &[
                    ("owner_id", creds.owner_id()),
                    ("post_id", post_id.clone()),
                    ("message", message.clone()),
                    ("attachments", attachments.join(",")),
                ],
            )
            .await?;
            debug!(post_id = %post_id, attached = attachments.len(), "VK photo attached");
        }

        info!(post_id = %post_id, images = attachments.len(), "Published to VK");

        Ok(PublishReceipt {
            platform: Platform::Vk,
            post_id: Some(post_id),
            attachments: attachments.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_format() {
        let post = Post {
            title: "Title".to_string(),
            text: "Body".to_string(),
            images: Vec::new(),
        };
        assert_eq!(format_message(&post), "Title\n\nBody");
    }

    #[test]
    fn test_unwrap_response_reads_error_member() {
        let err = unwrap_response(
            "wall.post",
            json!({"error": {"error_code": 15, "error_msg": "Access denied"}}),
        )
        .unwrap_err();
        match err {
            ProviderError::Api { status, body, .. } => {
                assert_eq!(status, 15);
                assert_eq!(body, "wall.post: Access denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unwrap_response_returns_payload() {
        let payload = unwrap_response("wall.post", json!({"response": {"post_id": 42}})).unwrap();
        assert_eq!(as_param(field("wall.post", &payload, "post_id").unwrap()), "42");
    }

    #[test]
    fn test_unwrap_response_without_members_is_malformed() {
        let err = unwrap_response("wall.post", json!({})).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_group_is_reported_before_network() {
        let config = VkConfig {
            access_token: Some("token".to_string()),
            ..VkConfig::default()
        };
        let err = VkPublisher::new(&config)
            .publish(&Post {
                title: "t".to_string(),
                text: "x".to_string(),
                images: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::MissingCredentials { ref variable, .. } if variable == "VK_GROUP_ID"
        ));
    }
}

//! The content record and its partial-update type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ContentState, Platform};

/// Identifier of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u64);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ContentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Last QA verdict stored on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaSummary {
    /// Score on the 0–10 scale.
    pub score: f64,
    /// Human-readable summary from the QA provider.
    pub comment: String,
}

/// One boolean per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFlags {
    /// Telegram (platform A).
    pub telegram: bool,
    /// VK (platform B).
    pub vk: bool,
}

impl PlatformFlags {
    /// Both flags set.
    #[must_use]
    pub const fn both() -> Self {
        Self { telegram: true, vk: true }
    }

    /// Both flags cleared.
    #[must_use]
    pub const fn none() -> Self {
        Self { telegram: false, vk: false }
    }

    /// Returns the flag for a platform.
    #[must_use]
    pub fn get(&self, platform: Platform) -> bool {
        match platform {
            Platform::Telegram => self.telegram,
            Platform::Vk => self.vk,
        }
    }

    /// Sets the flag for a platform.
    pub fn set(&mut self, platform: Platform, value: bool) {
        match platform {
            Platform::Telegram => self.telegram = value,
            Platform::Vk => self.vk = value,
        }
    }

    /// Returns true if every platform set in `targets` is also set here.
    #[must_use]
    pub fn covers(&self, targets: &Self) -> bool {
        Platform::ALL
            .iter()
            .all(|p| !targets.get(*p) || self.get(*p))
    }
}

impl Default for PlatformFlags {
    fn default() -> Self {
        Self::none()
    }
}

fn default_targets() -> PlatformFlags {
    PlatformFlags::both()
}

fn default_image_count() -> u32 {
    1
}

/// A content record moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique id.
    pub id: ContentId,
    /// Article title.
    pub title: String,
    /// Free-form description of what to write about.
    #[serde(default)]
    pub brief: String,
    /// Keywords to weave into the article.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Article tone override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Target platform hint for the article writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_hint: Option<String>,
    /// Article length hint (`short`, `medium`, `long`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    /// Visual style for image generation.
    #[serde(default)]
    pub image_style: String,
    /// Number of images requested; zero means the record publishes text only.
    #[serde(default = "default_image_count")]
    pub image_count: u32,
    /// Generated body text.
    #[serde(default)]
    pub body: String,
    /// Generated image references, in posting order.
    #[serde(default)]
    pub images: Vec<String>,
    /// Current pipeline state.
    #[serde(default)]
    pub state: ContentState,
    /// Last article QA verdict.
    #[serde(default)]
    pub article_qa: Option<QaSummary>,
    /// Last image QA verdict.
    #[serde(default)]
    pub image_qa: Option<QaSummary>,
    /// Platforms this record should be published to.
    #[serde(default = "default_targets")]
    pub targets: PlatformFlags,
    /// Platforms this record has been posted to.
    #[serde(default)]
    pub posted: PlatformFlags,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Returns true if the record asked for no images.
    #[must_use]
    pub fn wants_no_images(&self) -> bool {
        self.image_count == 0
    }

    /// Returns true if the body text is present.
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Returns true if every targeted platform has been posted to.
    #[must_use]
    pub fn all_targets_posted(&self) -> bool {
        self.posted.covers(&self.targets)
    }

    /// Checks the data invariants tied to the current state.
    ///
    /// Returns a description of the first violation found.
    #[must_use]
    pub fn invariant_violation(&self) -> Option<String> {
        if self.state.requires_body() && !self.has_body() {
            return Some(format!("body text is empty in state {}", self.state));
        }
        let images_required = matches!(
            self.state,
            ContentState::ImagesReady | ContentState::Published
        ) && !self.wants_no_images();
        if images_required && self.images.is_empty() {
            return Some(format!("image list is empty in state {}", self.state));
        }
        None
    }
}

/// Input for creating a new draft record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewContentItem {
    /// Article title.
    pub title: String,
    /// Free-form description of what to write about.
    #[serde(default)]
    pub brief: String,
    /// Keywords to weave into the article.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Article tone override.
    #[serde(default)]
    pub style: Option<String>,
    /// Target platform hint for the article writer.
    #[serde(default)]
    pub platform_hint: Option<String>,
    /// Article length hint.
    #[serde(default)]
    pub length: Option<String>,
    /// Visual style for image generation.
    #[serde(default)]
    pub image_style: String,
    /// Number of images requested; defaults to one.
    #[serde(default)]
    pub image_count: Option<u32>,
    /// Platforms to publish to; defaults to both.
    #[serde(default)]
    pub targets: Option<PlatformFlags>,
}

impl NewContentItem {
    /// Creates a draft input with a title and brief.
    #[must_use]
    pub fn new(title: impl Into<String>, brief: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            brief: brief.into(),
            ..Self::default()
        }
    }

    /// Sets the keywords.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the image style.
    #[must_use]
    pub fn with_image_style(mut self, style: impl Into<String>) -> Self {
        self.image_style = style.into();
        self
    }

    /// Sets the requested image count.
    #[must_use]
    pub fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = Some(count);
        self
    }

    /// Sets the publish targets.
    #[must_use]
    pub fn with_targets(mut self, targets: PlatformFlags) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Materialises the draft record.
    #[must_use]
    pub fn into_item(self, id: ContentId, now: DateTime<Utc>) -> ContentItem {
        ContentItem {
            id,
            title: self.title,
            brief: self.brief,
            keywords: self.keywords,
            style: self.style,
            platform_hint: self.platform_hint,
            length: self.length,
            image_style: self.image_style,
            image_count: self.image_count.unwrap_or_else(default_image_count),
            body: String::new(),
            images: Vec::new(),
            state: ContentState::Draft,
            article_qa: None,
            image_qa: None,
            targets: self.targets.unwrap_or_else(default_targets),
            posted: PlatformFlags::none(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a content record.
///
/// Only fields set to `Some` are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentPatch {
    /// New body text.
    pub body: Option<String>,
    /// New image list.
    pub images: Option<Vec<String>>,
    /// New state.
    pub state: Option<ContentState>,
    /// New article QA verdict.
    pub article_qa: Option<QaSummary>,
    /// New image QA verdict.
    pub image_qa: Option<QaSummary>,
    /// Posted flag to set for one platform.
    pub posted: Option<(Platform, bool)>,
    /// State the record must still be in for the write to apply.
    pub expected_state: Option<ContentState>,
}

impl ContentPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the image list.
    #[must_use]
    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }

    /// Sets the state.
    #[must_use]
    pub fn state(mut self, state: ContentState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the article QA verdict.
    #[must_use]
    pub fn article_qa(mut self, qa: QaSummary) -> Self {
        self.article_qa = Some(qa);
        self
    }

    /// Sets the image QA verdict.
    #[must_use]
    pub fn image_qa(mut self, qa: QaSummary) -> Self {
        self.image_qa = Some(qa);
        self
    }

    /// Sets a posted flag.
    #[must_use]
    pub fn posted(mut self, platform: Platform, value: bool) -> Self {
        self.posted = Some((platform, value));
        self
    }

    /// Makes the write conditional on the record still being in `state`.
    #[must_use]
    pub fn when_state(mut self, state: ContentState) -> Self {
        self.expected_state = Some(state);
        self
    }

    /// Returns true if the patch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.images.is_none()
            && self.state.is_none()
            && self.article_qa.is_none()
            && self.image_qa.is_none()
            && self.posted.is_none()
    }

    /// Returns the record's actual state if the condition does not hold.
    #[must_use]
    pub fn conflict(&self, item: &ContentItem) -> Option<ContentState> {
        match self.expected_state {
            Some(expected) if expected != item.state => Some(item.state),
            _ => None,
        }
    }

    /// Applies the patch in place and bumps `updated_at`.
    pub fn apply(self, item: &mut ContentItem, now: DateTime<Utc>) {
        if let Some(body) = self.body {
            item.body = body;
        }
        if let Some(images) = self.images {
            item.images = images;
        }
        if let Some(state) = self.state {
            item.state = state;
        }
        if let Some(qa) = self.article_qa {
            item.article_qa = Some(qa);
        }
        if let Some(qa) = self.image_qa {
            item.image_qa = Some(qa);
        }
        if let Some((platform, value)) = self.posted {
            item.posted.set(platform, value);
        }
        item.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn draft() -> ContentItem {
        NewContentItem::new("X", "Y").into_item(ContentId(1), Utc::now())
    }

    #[test]
    fn test_new_item_defaults() {
        let item = draft();
        assert_eq!(item.state, ContentState::Draft);
        assert_eq!(item.image_count, 1);
        assert_eq!(item.targets, PlatformFlags::both());
        assert_eq!(item.posted, PlatformFlags::none());
        assert!(item.body.is_empty());
        assert!(item.invariant_violation().is_none());
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut item = draft();
        let before = item.updated_at;

        ContentPatch::new()
            .body("body text")
            .state(ContentState::ArticleReady)
            .apply(&mut item, before + chrono::Duration::seconds(1));

        assert_eq!(item.body, "body text");
        assert_eq!(item.state, ContentState::ArticleReady);
        assert_eq!(item.title, "X");
        assert!(item.images.is_empty());
        assert!(item.updated_at > before);
    }

    #[test]
    fn test_patch_sets_single_platform_flag() {
        let mut item = draft();
        ContentPatch::new()
            .posted(Platform::Vk, true)
            .apply(&mut item, Utc::now());

        assert!(item.posted.vk);
        assert!(!item.posted.telegram);
        assert!(!item.all_targets_posted());
    }

    #[test]
    fn test_disabled_target_does_not_block_publication() {
        let mut item = NewContentItem::new("X", "Y")
            .with_targets(PlatformFlags { telegram: true, vk: false })
            .into_item(ContentId(2), Utc::now());

        item.posted.set(Platform::Telegram, true);
        assert!(item.all_targets_posted());
    }

    #[test]
    fn test_invariant_violations() {
        let mut item = draft();
        item.state = ContentState::ArticleReady;
        assert!(item.invariant_violation().unwrap().contains("body"));

        item.body = "text".to_string();
        item.state = ContentState::ImagesReady;
        assert!(item.invariant_violation().unwrap().contains("image"));

        item.image_count = 0;
        assert!(item.invariant_violation().is_none());
    }

    #[test]
    fn test_item_deserializes_with_defaults() {
        let json = serde_json::json!({
            "id": 7,
            "title": "T",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });
        let item: ContentItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.id, ContentId(7));
        assert_eq!(item.image_count, 1);
        assert_eq!(item.targets, PlatformFlags::both());
        assert_eq!(item.state, ContentState::Draft);
    }

    #[test]
    fn test_empty_patch() {
        assert!(ContentPatch::new().is_empty());
        assert!(ContentPatch::new().when_state(ContentState::Draft).is_empty());
        assert!(!ContentPatch::new().body("x").is_empty());
    }

    #[test]
    fn test_conditional_patch_reports_conflict() {
        let mut item = draft();
        let patch = ContentPatch::new()
            .state(ContentState::ArticleReady)
            .when_state(ContentState::Draft);
        assert_eq!(patch.conflict(&item), None);

        item.state = ContentState::Failed;
        assert_eq!(patch.conflict(&item), Some(ContentState::Failed));
        assert_eq!(ContentPatch::new().conflict(&item), None);
    }
}

//! Content state, severity and platform enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The pipeline state of a content record.
///
/// Records move `draft → article_ready → images_ready → published`.
/// `failed` is terminal and only entered through an administrative abandon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentState {
    /// Created, waiting for article generation.
    Draft,
    /// Body text generated and scored.
    ArticleReady,
    /// Images generated and scored.
    ImagesReady,
    /// Posted to every targeted platform.
    Published,
    /// Abandoned; never processed again.
    Failed,
}

impl Default for ContentState {
    fn default() -> Self {
        Self::Draft
    }
}

impl fmt::Display for ContentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::ArticleReady => write!(f, "article_ready"),
            Self::ImagesReady => write!(f, "images_ready"),
            Self::Published => write!(f, "published"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl ContentState {
    /// All states a batch sweep still picks up.
    pub const PENDING: [Self; 3] = [Self::Draft, Self::ArticleReady, Self::ImagesReady];

    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// Returns true if the record still has pipeline work left.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the body text must be present in this state.
    #[must_use]
    pub fn requires_body(&self) -> bool {
        matches!(self, Self::ArticleReady | Self::ImagesReady | Self::Published)
    }
}

/// Coarse triage label attached to a logged failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or informational.
    Low,
    /// Needs attention eventually.
    Medium,
    /// Blocks the record.
    High,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// A publishing platform.
///
/// Telegram is platform A and VK is platform B in the stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Telegram channel (platform A).
    Telegram,
    /// VK community wall (platform B).
    Vk,
}

impl Platform {
    /// Both platforms in publishing order.
    pub const ALL: [Self; 2] = [Self::Telegram, Self::Vk];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telegram => write!(f, "telegram"),
            Self::Vk => write!(f, "vk"),
        }
    }
}

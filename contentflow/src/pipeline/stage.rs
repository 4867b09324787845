//! Stage identities and per-stage results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::core::{ContentId, ContentState, Platform};
use crate::errors::{PipelineError, ProviderError};

/// One step of the fixed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Write the article body.
    GenerateArticle,
    /// Produce illustrations.
    GenerateImages,
    /// Post to Telegram.
    PublishTelegram,
    /// Post to VK.
    PublishVk,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [
        Self::GenerateArticle,
        Self::GenerateImages,
        Self::PublishTelegram,
        Self::PublishVk,
    ];

    /// Stable name, used as the error log module.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateArticle => "generate_article",
            Self::GenerateImages => "generate_images",
            Self::PublishTelegram => "publish_telegram",
            Self::PublishVk => "publish_vk",
        }
    }

    /// The platform a publish stage posts to.
    #[must_use]
    pub fn platform(&self) -> Option<Platform> {
        match self {
            Self::PublishTelegram => Some(Platform::Telegram),
            Self::PublishVk => Some(Platform::Vk),
            Self::GenerateArticle | Self::GenerateImages => None,
        }
    }

    /// The publish stage for a platform.
    #[must_use]
    pub fn publish(platform: Platform) -> Self {
        match platform {
            Platform::Telegram => Self::PublishTelegram,
            Platform::Vk => Self::PublishVk,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a stage did.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The stage did its work; the record is now in `state`.
    Completed {
        /// State after the stage.
        state: ContentState,
    },
    /// The precondition did not hold, nothing was changed or logged.
    Skipped {
        /// Why the stage did not run.
        reason: String,
    },
    /// The stage failed and an error log entry was written.
    Failed {
        /// The classified failure.
        error: PipelineError,
    },
}

impl StageOutcome {
    /// Creates a skipped outcome.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Returns true for [`StageOutcome::Completed`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Returns true for [`StageOutcome::Skipped`].
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Returns true for [`StageOutcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short label for events and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A stage outcome with timing.
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Which stage ran.
    pub stage: Stage,
    /// What it did.
    pub outcome: StageOutcome,
    /// Wall time in milliseconds.
    pub duration_ms: f64,
}

/// One pass of the stage sequence over a record.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// The record.
    pub content_id: ContentId,
    /// Reports for the stages that ran, in order. Stops after a failure.
    pub reports: Vec<StageReport>,
}

impl PipelineRun {
    /// Returns the failure that halted the run, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&PipelineError> {
        self.reports.iter().find_map(|r| r.outcome.error())
    }

    /// Returns the stage that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        self.reports
            .iter()
            .find(|r| r.outcome.is_failed())
            .map(|r| r.stage)
    }

    /// Returns true if no stage failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    /// Returns the report for a stage, if it ran.
    #[must_use]
    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }
}

/// Awaits a provider call for at most `bound`.
///
/// Elapsing the bound is a transport failure like any other.
pub(crate) async fn bounded<T, F>(
    operation: &str,
    bound: Duration,
    call: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(bound, call).await {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => Err(ProviderError::timeout(operation, bound).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<&str> = Stage::ALL.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec!["generate_article", "generate_images", "publish_telegram", "publish_vk"]
        );
        assert_eq!(Stage::publish(Platform::Vk), Stage::PublishVk);
        assert_eq!(Stage::PublishTelegram.platform(), Some(Platform::Telegram));
        assert_eq!(Stage::GenerateImages.platform(), None);
    }

    #[test]
    fn test_run_reports_first_failure() {
        let run = PipelineRun {
            content_id: ContentId(1),
            reports: vec![
                StageReport {
                    stage: Stage::GenerateArticle,
                    outcome: StageOutcome::skipped("state is article_ready"),
                    duration_ms: 0.1,
                },
                StageReport {
                    stage: Stage::GenerateImages,
                    outcome: StageOutcome::Failed {
                        error: PipelineError::EmptyGenerationResult("empty".into()),
                    },
                    duration_ms: 1.0,
                },
            ],
        };

        assert!(!run.is_success());
        assert_eq!(run.failed_stage(), Some(Stage::GenerateImages));
        assert_eq!(run.failure().unwrap().kind(), "EmptyGenerationResult");
        assert!(run.report(Stage::PublishVk).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<(), PipelineError> = bounded("slow call", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), "ProviderTransportError");
        assert!(err.to_string().contains("slow call timed out after 5s"));
    }

    #[tokio::test]
    async fn test_bounded_passes_through_errors() {
        let result: Result<(), PipelineError> =
            bounded("call", Duration::from_secs(5), async { Err(ProviderError::Empty("none".into())) })
                .await;
        assert_eq!(result.unwrap_err().kind(), "EmptyGenerationResult");
    }
}

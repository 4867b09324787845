//! QA scoring providers and the response contract they share.
//!
//! A QA call never yields a malformed result: anything the model returns
//! that cannot be read as a score is replaced by [`QaReport::fallback`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::openai::{ChatMessage, ChatRequest, OpenAiClient};
use crate::config::{OpenAiConfig, QaGateConfig};
use crate::core::{QaSummary, Severity};
use crate::errors::ProviderError;
use crate::utils::char_prefix;

const QA_SYSTEM_PROMPT: &str = "You are a strict QA system. Output ONLY valid JSON.";

const RESPONSE_FORMAT: &str = r#"Respond STRICTLY in valid JSON:

{
  "score": number from 0 to 10,
  "comment": "short human-readable summary",
  "severity": "low" | "medium" | "high",
  "cause": "main problem if any or null",
  "recommendation": "how to improve or null"
}"#;

/// Structured QA verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    /// Score on the 0–10 scale.
    pub score: f64,
    /// Short summary.
    pub comment: String,
    /// Triage severity.
    pub severity: Severity,
    /// Main problem, if any.
    pub cause: Option<String>,
    /// Suggested fix, if any.
    pub recommendation: Option<String>,
}

impl QaReport {
    /// The record substituted for unreadable QA output.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            score: 0.0,
            comment: "QA response parsing failed".to_string(),
            severity: Severity::High,
            cause: Some("Invalid JSON from QA model".to_string()),
            recommendation: Some("Inspect QA prompt or provider".to_string()),
        }
    }

    /// The verdict returned by the stub provider.
    #[must_use]
    pub fn stub_ok() -> Self {
        Self {
            score: 9.5,
            comment: "Looks good (stub QA)".to_string(),
            severity: Severity::Low,
            cause: None,
            recommendation: None,
        }
    }

    /// Returns true if the score reaches `threshold`.
    #[must_use]
    pub fn passes(&self, threshold: f64) -> bool {
        self.score >= threshold
    }

    /// Score and comment, as stored on a record.
    #[must_use]
    pub fn summary(&self) -> QaSummary {
        QaSummary {
            score: self.score,
            comment: self.comment.clone(),
        }
    }
}

fn read_score(value: Option<&Value>) -> Option<f64> {
    let score = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    score.is_finite().then(|| score.clamp(0.0, 10.0))
}

fn read_optional_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Reads a QA model reply.
///
/// Non-JSON input, a non-object, or a missing or non-numeric score yields
/// the fallback report. A missing comment reads as empty and a missing or
/// unknown severity as low. Scores are clamped to 0–10.
#[must_use]
pub fn parse_qa_response(raw: &str) -> QaReport {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw.trim()) else {
        return QaReport::fallback();
    };
    let Some(score) = read_score(map.get("score")) else {
        return QaReport::fallback();
    };

    let comment = match map.get("comment") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };
    let severity = map
        .get("severity")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(Severity::Low);

    QaReport {
        score,
        comment,
        severity,
        cause: read_optional_text(map.get("cause")),
        recommendation: read_optional_text(map.get("recommendation")),
    }
}

/// Builds the article QA prompt from the first `max_chars` characters of `text`.
#[must_use]
pub fn build_article_qa_prompt(title: &str, text: &str, max_chars: usize) -> String {
    format!(
        "You are an automated QA engineer for AI-generated content.\n\n\
         Evaluate the following ARTICLE.\n\n\
         Title:\n{title}\n\n\
         Text:\n{}\n\n\
         Check for:\n\
         - logical consistency\n\
         - factual errors (if obvious)\n\
         - structure and readability\n\
         - SEO-friendliness\n\
         - spam, filler or repetition\n\
         - safety and policy risks\n\n\
         {RESPONSE_FORMAT}\n",
        char_prefix(text, max_chars)
    )
}

/// Builds the image QA prompt from the first `limit` references.
#[must_use]
pub fn build_image_qa_prompt(title: &str, images: &[String], limit: usize) -> String {
    let listed: Vec<&str> = images.iter().take(limit).map(String::as_str).collect();
    format!(
        "You are an automated QA engineer for AI-generated images.\n\n\
         Article title:\n{title}\n\n\
         Generated images (URLs or error messages):\n{}\n\n\
         Check for:\n\
         - relevance to article topic\n\
         - diversity (not duplicates)\n\
         - suitability for social media or blog\n\
         - obvious generation failures\n\n\
         {RESPONSE_FORMAT}\n",
        listed.join("\n")
    )
}

/// Scores articles and image sets.
///
/// The same calls classify stage failures: the failed stage passes its error
/// text in place of the artifact.
#[async_trait]
pub trait QaProvider: Send + Sync {
    /// Variant name.
    fn name(&self) -> &str;

    /// Scores an article.
    async fn analyze_article(&self, title: &str, text: &str) -> Result<QaReport, ProviderError>;

    /// Scores a list of image references.
    async fn analyze_images(&self, title: &str, images: &[String])
        -> Result<QaReport, ProviderError>;
}

/// Chat-completion backed QA.
#[derive(Debug, Clone)]
pub struct OpenAiQaProvider {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    excerpt_chars: usize,
    image_limit: usize,
}

impl OpenAiQaProvider {
    /// Creates the provider.
    #[must_use]
    pub fn new(client: OpenAiClient, config: &OpenAiConfig, gate: &QaGateConfig) -> Self {
        Self {
            client,
            model: config.qa_model.clone(),
            temperature: config.qa_temperature,
            excerpt_chars: gate.article_excerpt_chars,
            image_limit: gate.image_list_limit,
        }
    }

    async fn run(&self, prompt: String) -> Result<QaReport, ProviderError> {
        let chat = ChatRequest::new(&self.model)
            .message(ChatMessage::system(QA_SYSTEM_PROMPT))
            .message(ChatMessage::user(prompt))
            .temperature(self.temperature);

        match self.client.chat(&chat).await {
            Ok(content) => {
                let report = parse_qa_response(&content);
                debug!(score = report.score, severity = %report.severity, "QA verdict");
                Ok(report)
            }
            Err(ProviderError::Malformed(message)) => {
                warn!(error = %message, "Unreadable QA response envelope");
                Ok(QaReport::fallback())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl QaProvider for OpenAiQaProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn analyze_article(&self, title: &str, text: &str) -> Result<QaReport, ProviderError> {
        self.run(build_article_qa_prompt(title, text, self.excerpt_chars))
            .await
    }

    async fn analyze_images(
        &self,
        title: &str,
        images: &[String],
    ) -> Result<QaReport, ProviderError> {
        self.run(build_image_qa_prompt(title, images, self.image_limit))
            .await
    }
}

/// QA that approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubQaProvider;

#[async_trait]
impl QaProvider for StubQaProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn analyze_article(&self, _title: &str, _text: &str) -> Result<QaReport, ProviderError> {
        Ok(QaReport::stub_ok())
    }

    async fn analyze_images(
        &self,
        _title: &str,
        _images: &[String],
    ) -> Result<QaReport, ProviderError> {
        Ok(QaReport::stub_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_response() {
        let report = parse_qa_response(
            r#"{"score": 7.5, "comment": "ok", "severity": "medium", "cause": "tone", "recommendation": "shorten"}"#,
        );
        assert_eq!(
            report,
            QaReport {
                score: 7.5,
                comment: "ok".to_string(),
                severity: Severity::Medium,
                cause: Some("tone".to_string()),
                recommendation: Some("shorten".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_non_json_yields_fallback() {
        for raw in ["not json", "", "```json\n{}\n```", "[1, 2]", "42"] {
            assert_eq!(parse_qa_response(raw), QaReport::fallback(), "input: {raw:?}");
        }
    }

    #[test]
    fn test_fallback_fields_are_fixed() {
        let fallback = QaReport::fallback();
        assert!(fallback.score.abs() < f64::EPSILON);
        assert_eq!(fallback.severity, Severity::High);
        assert_eq!(fallback.comment, "QA response parsing failed");
        assert_eq!(fallback.cause.as_deref(), Some("Invalid JSON from QA model"));
    }

    #[test]
    fn test_parse_missing_or_bad_score_yields_fallback() {
        assert_eq!(parse_qa_response(r#"{"comment": "x"}"#), QaReport::fallback());
        assert_eq!(parse_qa_response(r#"{"score": "high"}"#), QaReport::fallback());
        assert_eq!(parse_qa_response(r#"{"score": null}"#), QaReport::fallback());
    }

    #[test]
    fn test_parse_partial_response_uses_defaults() {
        let report = parse_qa_response(r#"{"score": "6"}"#);
        assert!((report.score - 6.0).abs() < f64::EPSILON);
        assert_eq!(report.comment, "");
        assert_eq!(report.severity, Severity::Low);
        assert!(report.cause.is_none());
        assert!(report.recommendation.is_none());
    }

    #[test]
    fn test_parse_clamps_and_tolerates_unknown_severity() {
        let report = parse_qa_response(r#"{"score": 14, "severity": "critical", "cause": null}"#);
        assert!((report.score - 10.0).abs() < f64::EPSILON);
        assert_eq!(report.severity, Severity::Low);

        let report = parse_qa_response(r#"{"score": -3, "severity": " HIGH "}"#);
        assert!(report.score.abs() < f64::EPSILON);
        assert_eq!(report.severity, Severity::High);
    }

    #[test]
    fn test_passes_is_inclusive() {
        let mut report = QaReport::stub_ok();
        report.score = 5.0;
        assert!(report.passes(5.0));
        report.score = 4.99;
        assert!(!report.passes(5.0));
    }

    #[test]
    fn test_article_prompt_excerpt_is_bounded() {
        let text = "x".repeat(5000);
        let prompt = build_article_qa_prompt("T", &text, 3000);
        assert!(prompt.contains(&"x".repeat(3000)));
        assert!(!prompt.contains(&"x".repeat(3001)));
        assert!(prompt.contains("Respond STRICTLY in valid JSON"));
    }

    #[test]
    fn test_image_prompt_lists_first_entries() {
        let images: Vec<String> = (1..=7).map(|i| format!("img{i}")).collect();
        let prompt = build_image_qa_prompt("T", &images, 5);
        assert!(prompt.contains("img5"));
        assert!(!prompt.contains("img6"));
    }

    #[tokio::test]
    async fn test_stub_approves() {
        let report = StubQaProvider.analyze_article("t", "x").await.unwrap();
        assert_eq!(report, QaReport::stub_ok());
        let report = StubQaProvider.analyze_images("t", &[]).await.unwrap();
        assert!(report.passes(5.0));
    }

    #[tokio::test]
    async fn test_openai_without_key_reports_missing_credentials() {
        let provider = OpenAiQaProvider::new(
            OpenAiClient::new(&OpenAiConfig::default()),
            &OpenAiConfig::default(),
            &QaGateConfig::default(),
        );
        let err = provider.analyze_article("t", "x").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentials { .. }));
    }
}

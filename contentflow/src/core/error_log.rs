//! Append-only error log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentId, Severity};

/// A persisted failure record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    /// Store-assigned id, increasing with insertion order.
    pub id: u64,
    /// Owning record, if the failure is record-scoped.
    pub content_id: Option<ContentId>,
    /// Stage or module the failure originated from.
    pub module: String,
    /// Error message.
    pub error: String,
    /// Triage severity.
    pub severity: Severity,
    /// Probable cause.
    pub cause: Option<String>,
    /// Suggested fix.
    pub recommendation: Option<String>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// An error log entry before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewErrorLog {
    /// Owning record, if any.
    pub content_id: Option<ContentId>,
    /// Stage or module name.
    pub module: String,
    /// Error message.
    pub error: String,
    /// Triage severity.
    pub severity: Severity,
    /// Probable cause.
    pub cause: Option<String>,
    /// Suggested fix.
    pub recommendation: Option<String>,
}

impl NewErrorLog {
    /// Creates a high-severity entry with no cause or recommendation.
    ///
    /// This is the fallback used when secondary classification is unavailable.
    #[must_use]
    pub fn new(module: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            content_id: None,
            module: module.into(),
            error: error.into(),
            severity: Severity::High,
            cause: None,
            recommendation: None,
        }
    }

    /// Scopes the entry to a record.
    #[must_use]
    pub fn for_content(mut self, id: ContentId) -> Self {
        self.content_id = Some(id);
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Option<String>) -> Self {
        self.cause = cause;
        self
    }

    /// Sets the recommendation.
    #[must_use]
    pub fn with_recommendation(mut self, recommendation: Option<String>) -> Self {
        self.recommendation = recommendation;
        self
    }

    /// Stamps the entry with an id and creation time.
    #[must_use]
    pub fn into_entry(self, id: u64, created_at: DateTime<Utc>) -> ErrorLogEntry {
        ErrorLogEntry {
            id,
            content_id: self.content_id,
            module: self.module,
            error: self.error,
            severity: self.severity,
            cause: self.cause,
            recommendation: self.recommendation,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_error_log_defaults_to_high_without_cause() {
        let log = NewErrorLog::new("generate_article", "boom");
        assert_eq!(log.severity, Severity::High);
        assert!(log.cause.is_none());
        assert!(log.recommendation.is_none());
        assert!(log.content_id.is_none());
    }

    #[test]
    fn test_into_entry_keeps_fields() {
        let now = Utc::now();
        let entry = NewErrorLog::new("publish_vk", "timeout")
            .for_content(ContentId(3))
            .with_severity(Severity::Low)
            .with_cause(Some("slow network".into()))
            .into_entry(11, now);

        assert_eq!(entry.id, 11);
        assert_eq!(entry.content_id, Some(ContentId(3)));
        assert_eq!(entry.module, "publish_vk");
        assert_eq!(entry.severity, Severity::Low);
        assert_eq!(entry.cause.as_deref(), Some("slow network"));
        assert_eq!(entry.created_at, now);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = NewErrorLog::new("m", "e").into_entry(1, Utc::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["severity"], "high");
        assert!(json["cause"].is_null());
    }
}

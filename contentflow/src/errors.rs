//! Error types for the contentflow pipeline.
//!
//! `PipelineError` is the taxonomy every stage failure is classified into.
//! Adapter-level errors (`ProviderError`, `StoreError`) convert into it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::{ContentId, ContentState};

/// What a QA gate was scoring when it rejected a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaSubject {
    /// The article body.
    Article,
    /// The generated image set.
    Images,
}

impl fmt::Display for QaSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Article => write!(f, "Article"),
            Self::Images => write!(f, "Images"),
        }
    }
}

/// The main error type for pipeline operations.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The content record does not exist.
    #[error("Content item not found: {0}")]
    NotFound(ContentId),

    /// A provider returned no usable output.
    #[error("{0}")]
    EmptyGenerationResult(String),

    /// A QA score fell below the publishing threshold.
    #[error("{subject} failed QA (score={score})")]
    QaGateFailure {
        /// What was scored.
        subject: QaSubject,
        /// The score returned by the QA provider.
        score: f64,
        /// The threshold it had to reach.
        threshold: f64,
    },

    /// Network, authentication, API status or timeout failure of an external call.
    #[error("Provider transport error: {0}")]
    ProviderTransport(String),

    /// A generation provider answered with a body that could not be read.
    #[error("Provider response malformed: {0}")]
    ProviderResponseMalformed(String),

    /// Upstream credentials are not configured.
    #[error("Missing credentials for {provider}: {variable} is not set")]
    MissingCredentials {
        /// Provider or publisher name.
        provider: String,
        /// The configuration variable that is missing.
        variable: String,
    },

    /// A record is in a state its data does not support.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The content store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Returns the stable taxonomy name of the error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::EmptyGenerationResult(_) => "EmptyGenerationResult",
            Self::QaGateFailure { .. } => "QAGateFailure",
            Self::ProviderTransport(_) => "ProviderTransportError",
            Self::ProviderResponseMalformed(_) => "ProviderResponseMalformed",
            Self::MissingCredentials { .. } => "MissingCredentials",
            Self::InvariantViolation(_) => "InvariantViolation",
            Self::Store(_) => "StoreError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Returns true if re-running the pipeline later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmptyGenerationResult(_)
            | Self::QaGateFailure { .. }
            | Self::ProviderTransport(_)
            | Self::ProviderResponseMalformed(_)
            | Self::Store(_) => true,
            Self::NotFound(_)
            | Self::MissingCredentials { .. }
            | Self::InvariantViolation(_)
            | Self::Config(_) => false,
        }
    }

    /// Creates a QA gate failure.
    #[must_use]
    pub fn qa_gate(subject: QaSubject, score: f64, threshold: f64) -> Self {
        Self::QaGateFailure {
            subject,
            score,
            threshold,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));

        match self {
            Self::NotFound(id) => {
                map.insert("content_id".to_string(), serde_json::json!(id.0));
            }
            Self::QaGateFailure {
                subject,
                score,
                threshold,
            } => {
                map.insert("subject".to_string(), serde_json::json!(subject));
                map.insert("score".to_string(), serde_json::json!(score));
                map.insert("threshold".to_string(), serde_json::json!(threshold));
            }
            Self::MissingCredentials { provider, variable } => {
                map.insert("provider".to_string(), serde_json::json!(provider));
                map.insert("variable".to_string(), serde_json::json!(variable));
            }
            _ => {}
        }

        map
    }
}

/// Errors raised by provider and publisher adapters.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Credentials are not configured.
    #[error("{variable} is not set for {provider}")]
    MissingCredentials {
        /// Provider name.
        provider: String,
        /// Missing variable.
        variable: String,
    },

    /// The request could not be sent or the connection failed.
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete in time.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// What was being called.
        operation: String,
        /// The bound that was exceeded.
        seconds: u64,
    },

    /// The remote answered with a non-success status or error payload.
    #[error("{service} API error ({status}): {body}")]
    Api {
        /// Remote service name.
        service: String,
        /// HTTP status or platform error code.
        status: u16,
        /// Response body or error description.
        body: String,
    },

    /// The response body could not be interpreted.
    #[error("Parse error: {0}")]
    Malformed(String),

    /// The provider returned nothing usable.
    #[error("{0}")]
    Empty(String),
}

impl ProviderError {
    /// Creates a missing-credentials error.
    #[must_use]
    pub fn missing_credentials(provider: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::MissingCredentials {
            provider: provider.into(),
            variable: variable.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, bound: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds: bound.as_secs(),
        }
    }

    /// Creates an API error.
    #[must_use]
    pub fn api(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            status,
            body: body.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredentials { provider, variable } => {
                Self::MissingCredentials { provider, variable }
            }
            ProviderError::Malformed(message) => Self::ProviderResponseMalformed(message),
            ProviderError::Empty(message) => Self::EmptyGenerationResult(message),
            other @ (ProviderError::Network(_)
            | ProviderError::Timeout { .. }
            | ProviderError::Api { .. }) => Self::ProviderTransport(other.to_string()),
        }
    }
}

/// Errors raised by the content store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend is unavailable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write was rejected.
    #[error("Store write rejected: {0}")]
    Rejected(String),

    /// A conditional write found the record in another state.
    #[error("Record {id} is {actual}, expected {expected}")]
    StateConflict {
        /// The record.
        id: ContentId,
        /// State the write was conditioned on.
        expected: ContentState,
        /// State the record was actually in.
        actual: ContentState,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("Invalid value for {key}: {message}")]
    Invalid {
        /// The variable name.
        key: String,
        /// What was wrong.
        message: String,
    },

    /// A config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Errors raised by the task queue.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The queue no longer accepts or yields tasks.
    #[error("Task queue closed")]
    Closed,

    /// An ack or nack referenced an unknown delivery.
    #[error("Unknown delivery: {0}")]
    UnknownDelivery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qa_gate_failure_message_carries_score() {
        let err = PipelineError::qa_gate(QaSubject::Article, 3.0, 5.0);
        assert_eq!(err.to_string(), "Article failed QA (score=3)");
        assert_eq!(err.kind(), "QAGateFailure");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_found_is_terminal() {
        let err = PipelineError::NotFound(ContentId(9));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn test_provider_error_conversion() {
        let missing: PipelineError =
            ProviderError::missing_credentials("openai", "OPENAI_API_KEY").into();
        assert!(matches!(missing, PipelineError::MissingCredentials { .. }));
        assert!(!missing.is_retryable());

        let timeout: PipelineError =
            ProviderError::timeout("image generation", Duration::from_secs(120)).into();
        assert!(matches!(timeout, PipelineError::ProviderTransport(_)));
        assert!(timeout.to_string().contains("120s"));

        let empty: PipelineError = ProviderError::Empty("nothing".into()).into();
        assert_eq!(empty.kind(), "EmptyGenerationResult");

        let malformed: PipelineError = ProviderError::Malformed("bad".into()).into();
        assert_eq!(malformed.kind(), "ProviderResponseMalformed");
    }

    #[test]
    fn test_to_dict() {
        let err = PipelineError::qa_gate(QaSubject::Images, 4.5, 5.0);
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "QAGateFailure");
        assert_eq!(dict.get("subject").unwrap(), "images");
        assert_eq!(dict.get("score").unwrap(), 4.5);
        assert_eq!(dict.get("retryable").unwrap(), true);
    }

    #[test]
    fn test_store_error_is_retryable() {
        let err: PipelineError = StoreError::Unavailable("down".into()).into();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "StoreError");
    }
}

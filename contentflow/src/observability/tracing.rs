//! Subscriber installation and stage timing.

use std::time::Instant;
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::core::ContentId;
use crate::errors::ConfigError;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Fails if the level
/// is not a valid filter or a subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::invalid("LOG_LEVEL", e.to_string()))?,
    };

    let (json, plain) = if config.json {
        (
            Some(tracing_subscriber::fmt::layer().json().with_current_span(true)),
            None,
        )
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_target(true)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()
        .map_err(|e| ConfigError::invalid("log", e.to_string()))
}

/// Opens the span a stage runs in.
#[must_use]
pub fn stage_span(content_id: ContentId, stage: &str) -> Span {
    tracing::info_span!("stage", content_id = content_id.0, stage)
}

/// Measures how long a stage took.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Milliseconds since start.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// The timed operation's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the timer and returns the duration in milliseconds.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

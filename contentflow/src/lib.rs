//! # Contentflow
//!
//! An article and image generation pipeline with QA gates and social publishing.
//!
//! Each content record moves through four stages:
//!
//! - **Generate article**: an LLM writes the body from a title and brief
//! - **Generate images**: illustrations are produced from the title and body
//! - **Publish to Telegram / VK**: after a QA gate, text and images are posted
//!
//! Every stage is a failure boundary: errors are classified, written to an
//! append-only error log, and leave the record in its last good state.
//! A composite runner retries the whole sequence, a batch driver sweeps every
//! pending record, and a task runner executes queued work.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contentflow::prelude::*;
//!
//! let config = Arc::new(AppConfig::from_env()?);
//! let store = Arc::new(InMemoryContentStore::new());
//! let orchestrator = Orchestrator::from_config(config, store.clone());
//!
//! let item = store.insert(NewContentItem::new("Title", "Brief")).await?;
//! let outcome = CompositeRunner::new(orchestrator).run(item.id).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod publishers;
pub mod store;
pub mod tasks;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::config::AppConfig;
    pub use crate::core::{
        ContentId, ContentItem, ContentPatch, ContentState, ErrorLogEntry, NewContentItem,
        Platform, PlatformFlags, Severity,
    };
    pub use crate::errors::{PipelineError, ProviderError, StoreError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        BatchDriver, BatchReport, CompositeOutcome, CompositeRunner, Orchestrator, Stage,
        StageOutcome,
    };
    pub use crate::providers::{ArticleProvider, ImageProvider, ProviderSet, QaProvider, QaReport};
    pub use crate::publishers::{Publisher, PublisherSet};
    pub use crate::store::{ContentStore, InMemoryContentStore};
    pub use crate::tasks::{InMemoryTaskQueue, Scheduler, Task, TaskQueue, TaskRunner, Triggers};
}

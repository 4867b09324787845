//! Testing utilities for contentflow pipelines.
//!
//! This module provides:
//! - Scripted providers, a recording publisher and a failure-injecting store
//! - A ready-wired pipeline fixture and sample records
//! - Assertions for record state, error logs and event order

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_events_in_order, assert_fallback_log, assert_posted, assert_state};
pub use fixtures::{draft_item, new_item, sample_items, PipelineFixture};
pub use mocks::{
    FailingStore, RecordingPublisher, ScriptedArticleProvider, ScriptedImageProvider,
    ScriptedQaProvider,
};

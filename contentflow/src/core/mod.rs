//! Core domain model types for contentflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Content state, severity and platform enums
//! - The content record and its partial-update patch
//! - Append-only error log entries

mod content;
mod error_log;
mod status;

pub use content::{ContentId, ContentItem, ContentPatch, NewContentItem, PlatformFlags, QaSummary};
pub use error_log::{ErrorLogEntry, NewErrorLog};
pub use status::{ContentState, Platform, Severity};

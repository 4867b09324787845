//! Content record store boundary.
//!
//! The orchestrator only sees the [`ContentStore`] trait. Every method is a
//! single atomic operation; there is no implicit transaction spanning calls,
//! so callers order their writes so that a failure between two calls leaves
//! the record retryable.

mod memory;

pub use memory::{InMemoryContentStore, StoreSnapshot};

use async_trait::async_trait;

use crate::core::{
    ContentId, ContentItem, ContentPatch, ContentState, ErrorLogEntry, NewContentItem, NewErrorLog,
};
use crate::errors::StoreError;

/// Durable state for content records and their error history.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Creates a new record in `draft`.
    async fn insert(&self, item: NewContentItem) -> Result<ContentItem, StoreError>;

    /// Fetches a record by id.
    async fn get(&self, id: ContentId) -> Result<Option<ContentItem>, StoreError>;

    /// Applies a partial update and returns the updated record.
    ///
    /// Returns `None` if the record does not exist. A patch built with
    /// [`ContentPatch::when_state`] is applied only if the record is still in
    /// that state, otherwise [`StoreError::StateConflict`] is returned and
    /// nothing is written.
    async fn update(
        &self,
        id: ContentId,
        patch: ContentPatch,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// Lists records in any of the given states, in ascending id order.
    async fn list_by_state(&self, states: &[ContentState]) -> Result<Vec<ContentItem>, StoreError>;

    /// Deletes a record together with its error logs.
    ///
    /// Returns false if the record did not exist.
    async fn delete(&self, id: ContentId) -> Result<bool, StoreError>;

    /// Appends an error log entry.
    async fn append_error_log(&self, entry: NewErrorLog) -> Result<ErrorLogEntry, StoreError>;

    /// Lists error logs in insertion order, optionally scoped to one record.
    async fn error_logs(&self, id: Option<ContentId>) -> Result<Vec<ErrorLogEntry>, StoreError>;

    /// Lists records in a single state.
    async fn list(&self, state: ContentState) -> Result<Vec<ContentItem>, StoreError> {
        self.list_by_state(&[state]).await
    }
}

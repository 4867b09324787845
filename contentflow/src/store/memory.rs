//! In-memory content store.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::ContentStore;
use crate::core::{
    ContentId, ContentItem, ContentPatch, ContentState, ErrorLogEntry, NewContentItem, NewErrorLog,
};
use crate::errors::StoreError;

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<ContentId, ContentItem>,
    logs: Vec<ErrorLogEntry>,
    next_item_id: u64,
    next_log_id: u64,
}

/// Serializable dump of the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// All records in id order.
    pub items: Vec<ContentItem>,
    /// All error logs in insertion order.
    pub error_logs: Vec<ErrorLogEntry>,
}

/// A process-local store backed by a mutex-guarded map.
///
/// Ids start at 1 and are never reused.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryContentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with drafts.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = NewContentItem>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for item in items {
                Self::insert_locked(&mut inner, item);
            }
        }
        store
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Returns a copy of every record and log.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock();
        StoreSnapshot {
            items: inner.items.values().cloned().collect(),
            error_logs: inner.logs.clone(),
        }
    }

    fn insert_locked(inner: &mut Inner, item: NewContentItem) -> ContentItem {
        inner.next_item_id += 1;
        let id = ContentId(inner.next_item_id);
        let record = item.into_item(id, Utc::now());
        inner.items.insert(id, record.clone());
        record
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn insert(&self, item: NewContentItem) -> Result<ContentItem, StoreError> {
        if item.title.trim().is_empty() {
            return Err(StoreError::Rejected("title must not be empty".to_string()));
        }
        Ok(Self::insert_locked(&mut self.inner.lock(), item))
    }

    async fn get(&self, id: ContentId) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.inner.lock().items.get(&id).cloned())
    }

    async fn update(
        &self,
        id: ContentId,
        patch: ContentPatch,
    ) -> Result<Option<ContentItem>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(item) = inner.items.get_mut(&id) else {
            return Ok(None);
        };
        if let (Some(expected), Some(actual)) = (patch.expected_state, patch.conflict(item)) {
            return Err(StoreError::StateConflict {
                id,
                expected,
                actual,
            });
        }
        patch.apply(item, Utc::now());
        Ok(Some(item.clone()))
    }

    async fn list_by_state(&self, states: &[ContentState]) -> Result<Vec<ContentItem>, StoreError> {
        Ok(self
            .inner
            .lock()
            .items
            .values()
            .filter(|item| states.contains(&item.state))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: ContentId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        if inner.items.remove(&id).is_none() {
            return Ok(false);
        }
        inner.logs.retain(|log| log.content_id != Some(id));
        Ok(true)
    }

    async fn append_error_log(&self, entry: NewErrorLog) -> Result<ErrorLogEntry, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_log_id += 1;
        let stored = entry.into_entry(inner.next_log_id, Utc::now());
        inner.logs.push(stored.clone());
        Ok(stored)
    }

    async fn error_logs(&self, id: Option<ContentId>) -> Result<Vec<ErrorLogEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .logs
            .iter()
            .filter(|log| id.is_none() || log.content_id == id)
            .cloned()
            .collect())
    }
}

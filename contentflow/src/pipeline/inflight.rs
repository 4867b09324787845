//! At-most-one in-flight pipeline per record.

use dashmap::DashSet;
use std::sync::Arc;

use crate::core::ContentId;

/// Records currently running a full pipeline.
///
/// Shared between the task runner and the batch driver.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    ids: Arc<DashSet<ContentId>>,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a record. Returns `None` if it is already claimed.
    ///
    /// The claim is released when the guard is dropped.
    #[must_use]
    pub fn try_acquire(&self, id: ContentId) -> Option<InFlightGuard> {
        if self.ids.insert(id) {
            Some(InFlightGuard {
                ids: Arc::clone(&self.ids),
                id,
            })
        } else {
            None
        }
    }

    /// Returns true if the record is claimed.
    #[must_use]
    pub fn contains(&self, id: ContentId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of claimed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Releases a claim on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<DashSet<ContentId>>,
    id: ContentId,
}

impl InFlightGuard {
    /// The claimed record.
    #[must_use]
    pub fn id(&self) -> ContentId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}

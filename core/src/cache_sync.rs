//! Write-through of the derived status to the item record.
//!
//! The item's `current_status` column exists so external consumers can
//! filter cheaply. The ledger stays authoritative: a failed write here is
//! logged and counted, never surfaced to the caller, and never rolls back
//! the event that triggered it.

use crate::family::ItemFamily;
use crate::ids::ItemId;
use crate::status::Status;
use crate::store::ItemStore;
use std::sync::Arc;

/// What happened to a cache write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheSyncOutcome {
    /// The cached status now matches.
    Synced,
    /// Nothing to write; the event was an observation.
    Skipped,
    /// The write failed and the cache may be stale.
    Failed,
}

/// Pushes derived statuses into an [`ItemStore`].
pub struct ItemCacheSync<F: ItemFamily> {
    items: Arc<dyn ItemStore<F>>,
}

impl<F: ItemFamily> Clone for ItemCacheSync<F> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<F: ItemFamily> ItemCacheSync<F> {
    /// Create a sync over an item store.
    #[must_use]
    pub fn new(items: Arc<dyn ItemStore<F>>) -> Self {
        Self { items }
    }

    /// Write `status` to the item's cached column.
    ///
    /// Observation labels are never written.
    pub async fn sync(&self, item_id: ItemId, status: &Status) -> CacheSyncOutcome {
        if status.is_observation() {
            return CacheSyncOutcome::Skipped;
        }

        match self.items.update_status(item_id, status.clone()).await {
            Ok(()) => {
                tracing::trace!(item = %item_id, %status, "Cached status updated");
                CacheSyncOutcome::Synced
            }
            Err(error) => {
                tracing::warn!(
                    item = %item_id,
                    %status,
                    %error,
                    kind = F::KIND.as_str(),
                    "Failed to update cached status; ledger remains authoritative"
                );
                metrics::counter!("status_ledger.cache_sync.failed", "kind" => F::KIND.as_str())
                    .increment(1);
                CacheSyncOutcome::Failed
            }
        }
    }
}

impl<F: ItemFamily> std::fmt::Debug for ItemCacheSync<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemCacheSync")
            .field("kind", &F::KIND)
            .finish_non_exhaustive()
    }
}

//! Persistence traits for items and their ledgers.
//!
//! The ledger is append-only: [`LedgerStore`] exposes `append` and reads, and
//! nothing else. Items live in a separate [`ItemStore`] whose only mutation
//! after creation is the advisory `update_status` write-through.
//!
//! # Implementations
//!
//! - `PostgresLedgerStore` (in `status-ledger-postgres`): production storage
//! - `InMemoryLedgerStore` (in `status-ledger-testing`): fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn`, so the
//! service can hold `Arc<dyn LedgerStore<F>>` and swap implementations.
//!
//! # Example
//!
//! ```no_run
//! use status_ledger_core::error::Result;
//! use status_ledger_core::event::EventDraft;
//! use status_ledger_core::family::Demand;
//! use status_ledger_core::store::LedgerStore;
//!
//! async fn append_then_list(
//!     store: &dyn LedgerStore<Demand>,
//!     draft: EventDraft<Demand>,
//! ) -> Result<usize> {
//!     let item_id = draft.item_id;
//!     let stored = store.append(draft).await?;
//!     let ledger = store.list_by_item(item_id).await?;
//!     assert_eq!(ledger.last(), Some(&stored));
//!     Ok(ledger.len())
//! }
//! ```

use crate::error::Result;
use crate::event::{EventDraft, StatusEvent};
use crate::family::ItemFamily;
use crate::ids::{InstitutionId, ItemId};
use crate::item::Item;
use crate::status::Status;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Events of several items, keyed by item, each list in ledger order.
pub type EventsByItem<F> = HashMap<ItemId, Vec<StatusEvent<F>>>;

/// Append-only event storage for one item family.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; appends from independent actors
/// may run concurrently and must each receive a distinct, increasing
/// sequence for their item.
pub trait LedgerStore<F: ItemFamily>: Send + Sync {
    /// Append an event to an item's ledger.
    ///
    /// The store assigns the event id, the next per-item sequence and the
    /// creation timestamp.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the item does not exist
    /// - `TransientStore`: the write failed; nothing was recorded
    fn append(
        &self,
        draft: EventDraft<F>,
    ) -> Pin<Box<dyn Future<Output = Result<StatusEvent<F>>> + Send + '_>>;

    /// Load an item's full ledger in ascending order.
    ///
    /// An item with no events yields an empty vector.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the read failed
    fn list_by_item(
        &self,
        item_id: ItemId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StatusEvent<F>>>> + Send + '_>>;

    /// Load the ledgers of several items in one call.
    ///
    /// Items without events may be absent from the returned map.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the read failed
    fn list_by_items(
        &self,
        item_ids: Vec<ItemId>,
    ) -> Pin<Box<dyn Future<Output = Result<EventsByItem<F>>> + Send + '_>>;
}

/// Item record storage for one item family.
pub trait ItemStore<F: ItemFamily>: Send + Sync {
    /// Persist a newly created item.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the write failed
    fn insert(&self, item: Item<F>) -> Pin<Box<dyn Future<Output = Result<Item<F>>> + Send + '_>>;

    /// Fetch one item.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no item with this id
    /// - `TransientStore`: the read failed
    fn get(&self, item_id: ItemId) -> Pin<Box<dyn Future<Output = Result<Item<F>>> + Send + '_>>;

    /// All items owned by an institution, newest first.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the read failed
    fn list(
        &self,
        institution_id: InstitutionId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item<F>>>> + Send + '_>>;

    /// Overwrite the denormalized status column.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no item with this id
    /// - `TransientStore`: the write failed
    fn update_status(
        &self,
        item_id: ItemId,
        status: Status,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

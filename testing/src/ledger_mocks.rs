//! In-memory ledger and item storage.
//!
//! [`InMemoryLedgerStore`] implements both [`LedgerStore`] and [`ItemStore`]
//! over one `HashMap`-backed state, the way a single database would back
//! both tables. Failure switches let tests exercise the error paths of the
//! service without a real database.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned locks panic

use status_ledger_core::environment::{Clock, SystemClock};
use status_ledger_core::error::{LedgerError, Result};
use status_ledger_core::event::{EventDraft, StatusEvent};
use status_ledger_core::family::ItemFamily;
use status_ledger_core::ids::{EventId, InstitutionId, ItemId, Sequence};
use status_ledger_core::item::Item;
use status_ledger_core::status::Status;
use status_ledger_core::store::{EventsByItem, ItemStore, LedgerStore};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

struct State<F: ItemFamily> {
    // Insertion order doubles as the tie-break for equal timestamps.
    items: Vec<Item<F>>,
    events: HashMap<ItemId, Vec<StatusEvent<F>>>,
}

impl<F: ItemFamily> Default for State<F> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            events: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct Switches {
    fail_appends: AtomicBool,
    fail_status_updates: AtomicBool,
    fail_reads: AtomicBool,
}

#[derive(Default)]
struct Calls {
    appends: AtomicUsize,
    status_updates: AtomicUsize,
    batch_reads: AtomicUsize,
    item_lists: AtomicUsize,
}

/// In-memory storage for items and their ledgers.
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```
/// use status_ledger_core::family::Demand;
/// use status_ledger_core::store::LedgerStore;
/// use status_ledger_testing::InMemoryLedgerStore;
///
/// # async fn example() -> status_ledger_core::error::Result<()> {
/// let store = InMemoryLedgerStore::<Demand>::new();
/// assert!(store.list_by_item(Default::default()).await?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct InMemoryLedgerStore<F: ItemFamily> {
    state: Arc<RwLock<State<F>>>,
    clock: Arc<dyn Clock>,
    switches: Arc<Switches>,
    calls: Arc<Calls>,
}

impl<F: ItemFamily> Clone for InMemoryLedgerStore<F> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            switches: Arc::clone(&self.switches),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<F: ItemFamily> Default for InMemoryLedgerStore<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ItemFamily> std::fmt::Debug for InMemoryLedgerStore<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().unwrap();
        f.debug_struct("InMemoryLedgerStore")
            .field("kind", &F::KIND)
            .field("items", &state.items.len())
            .field("events", &state.events.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl<F: ItemFamily> InMemoryLedgerStore<F> {
    /// Create an empty store stamping events with wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping events with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            clock,
            switches: Arc::new(Switches::default()),
            calls: Arc::new(Calls::default()),
        }
    }

    /// Make every subsequent append fail with a transient error.
    pub fn set_fail_appends(&self, fail: bool) {
        self.switches.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent cached-status write fail with a transient error.
    pub fn set_fail_status_updates(&self, fail: bool) {
        self.switches.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent ledger read fail with a transient error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.switches.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Cached status column of an item, if it exists.
    #[must_use]
    pub fn cached_status(&self, item_id: ItemId) -> Option<Status> {
        self.state
            .read()
            .unwrap()
            .items
            .iter()
            .find(|item| item.id == item_id)
            .map(|item| item.current_status.clone())
    }

    /// Overwrite the cached status without going through the service.
    ///
    /// Useful to simulate a stale cache.
    pub fn force_cached_status(&self, item_id: ItemId, status: impl Into<Status>) {
        if let Some(item) = self
            .state
            .write()
            .unwrap()
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
        {
            item.current_status = status.into();
        }
    }

    /// Number of events stored for an item.
    #[must_use]
    pub fn event_count(&self, item_id: ItemId) -> usize {
        self.state
            .read()
            .unwrap()
            .events
            .get(&item_id)
            .map_or(0, Vec::len)
    }

    /// Number of stored items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.state.read().unwrap().items.len()
    }

    /// Append attempts, failed ones included.
    #[must_use]
    pub fn append_calls(&self) -> usize {
        self.calls.appends.load(Ordering::SeqCst)
    }

    /// Cached-status write attempts, failed ones included.
    #[must_use]
    pub fn status_update_calls(&self) -> usize {
        self.calls.status_updates.load(Ordering::SeqCst)
    }

    /// Batched ledger reads.
    #[must_use]
    pub fn batch_read_calls(&self) -> usize {
        self.calls.batch_reads.load(Ordering::SeqCst)
    }

    /// Item list reads.
    #[must_use]
    pub fn item_list_calls(&self) -> usize {
        self.calls.item_lists.load(Ordering::SeqCst)
    }

    fn append_now(&self, draft: EventDraft<F>) -> Result<StatusEvent<F>> {
        self.calls.appends.fetch_add(1, Ordering::SeqCst);
        if self.switches.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::store("injected append failure"));
        }

        let mut state = self.state.write().unwrap();
        if !state.items.iter().any(|item| item.id == draft.item_id) {
            return Err(LedgerError::NotFound {
                kind: F::KIND,
                id: draft.item_id,
            });
        }

        let ledger = state.events.entry(draft.item_id).or_default();
        let sequence = ledger
            .last()
            .map_or(Sequence::FIRST, |event| event.sequence.next());
        let event = StatusEvent::from_draft(draft, EventId::new(), sequence, self.clock.now());
        ledger.push(event.clone());
        Ok(event)
    }

    fn check_reads(&self) -> Result<()> {
        if self.switches.fail_reads.load(Ordering::SeqCst) {
            Err(LedgerError::store("injected read failure"))
        } else {
            Ok(())
        }
    }
}

impl<F: ItemFamily> LedgerStore<F> for InMemoryLedgerStore<F> {
    fn append(
        &self,
        draft: EventDraft<F>,
    ) -> Pin<Box<dyn Future<Output = Result<StatusEvent<F>>> + Send + '_>> {
        let result = self.append_now(draft);
        Box::pin(async move { result })
    }

    fn list_by_item(
        &self,
        item_id: ItemId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StatusEvent<F>>>> + Send + '_>> {
        let result = self.check_reads().map(|()| {
            self.state
                .read()
                .unwrap()
                .events
                .get(&item_id)
                .cloned()
                .unwrap_or_default()
        });
        Box::pin(async move { result })
    }

    fn list_by_items(
        &self,
        item_ids: Vec<ItemId>,
    ) -> Pin<Box<dyn Future<Output = Result<EventsByItem<F>>> + Send + '_>> {
        self.calls.batch_reads.fetch_add(1, Ordering::SeqCst);
        let result = self.check_reads().map(|()| {
            let state = self.state.read().unwrap();
            item_ids
                .into_iter()
                .filter_map(|id| state.events.get(&id).map(|events| (id, events.clone())))
                .collect()
        });
        Box::pin(async move { result })
    }
}

impl<F: ItemFamily> ItemStore<F> for InMemoryLedgerStore<F> {
    fn insert(&self, item: Item<F>) -> Pin<Box<dyn Future<Output = Result<Item<F>>> + Send + '_>> {
        self.state.write().unwrap().items.push(item.clone());
        Box::pin(async move { Ok(item) })
    }

    fn get(&self, item_id: ItemId) -> Pin<Box<dyn Future<Output = Result<Item<F>>> + Send + '_>> {
        let result = self
            .state
            .read()
            .unwrap()
            .items
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
            .ok_or(LedgerError::NotFound {
                kind: F::KIND,
                id: item_id,
            });
        Box::pin(async move { result })
    }

    fn list(
        &self,
        institution_id: InstitutionId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item<F>>>> + Send + '_>> {
        self.calls.item_lists.fetch_add(1, Ordering::SeqCst);
        let mut items: Vec<Item<F>> = self
            .state
            .read()
            .unwrap()
            .items
            .iter()
            .rev()
            .filter(|item| item.institution_id == institution_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Box::pin(async move { Ok(items) })
    }

    fn update_status(
        &self,
        item_id: ItemId,
        status: Status,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.calls.status_updates.fetch_add(1, Ordering::SeqCst);
        let result = if self.switches.fail_status_updates.load(Ordering::SeqCst) {
            Err(LedgerError::store("injected status update failure"))
        } else {
            self.state
                .write()
                .unwrap()
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .map(|item| item.current_status = status)
                .ok_or(LedgerError::NotFound {
                    kind: F::KIND,
                    id: item_id,
                })
        };
        Box::pin(async move { result })
    }
}

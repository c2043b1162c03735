//! Derived-state reconstruction.
//!
//! Everything callers see about an item's lifecycle is computed here from
//! its ledger: the current status, the latched side-channel metadata and the
//! presentation timeline. These are pure functions over event slices: no
//! I/O, no clocks, no shared state. Replaying the same ledger always yields
//! the same result.
//!
//! Input slices are expected in ledger order (as returned by
//! [`LedgerStore::list_by_item`](crate::store::LedgerStore::list_by_item));
//! [`DerivedView::derive`] sorts defensively before folding.

use crate::event::{StatusEvent, is_ledger_ordered, sort_ledger};
use crate::family::{EventDetails, ItemFamily};
use crate::identity::Identities;
use crate::status::Status;
use serde::Serialize;

/// Latched metadata type of a family.
pub type Latched<F> = <<F as ItemFamily>::Details as EventDetails>::Latched;

/// One fold step: the status after applying `event` to `previous`.
///
/// Observations leave the status untouched.
#[must_use]
pub fn next_status<F: ItemFamily>(previous: &Status, event: &StatusEvent<F>) -> Status {
    if event.is_observation() {
        previous.clone()
    } else {
        event.status.clone()
    }
}

/// Current status: the last non-observation status, or `default`.
#[must_use]
pub fn compute_current_status<F: ItemFamily>(
    events: &[StatusEvent<F>],
    default: &Status,
) -> Status {
    events
        .iter()
        .fold(default.clone(), |status, event| next_status(&status, event))
}

/// Latched metadata: per field, the last value any event supplied.
#[must_use]
pub fn compute_latched<F: ItemFamily>(events: &[StatusEvent<F>]) -> Latched<F> {
    let mut latched = Latched::<F>::default();
    for event in events {
        event.details.latch_into(&mut latched);
    }
    latched
}

/// Latch a single field: the last non-null value `accessor` yields.
///
/// # Examples
///
/// ```
/// use status_ledger_core::event::StatusEvent;
/// use status_ledger_core::family::Indication;
/// use status_ledger_core::reconstruct::latest_value;
///
/// let events: Vec<StatusEvent<Indication>> = Vec::new();
/// let protocol = latest_value(&events, |d| d.protocol_number.clone());
/// assert_eq!(protocol, None);
/// ```
pub fn latest_value<F, T, A>(events: &[StatusEvent<F>], accessor: A) -> Option<T>
where
    F: ItemFamily,
    A: Fn(&F::Details) -> Option<T>,
{
    events.iter().filter_map(|event| accessor(&event.details)).last()
}

/// A ledger event with its actor resolved for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(bound = "")]
pub struct HistoryEntry<F: ItemFamily> {
    /// The stored event.
    pub event: StatusEvent<F>,
    /// Display name of the actor who recorded it.
    pub actor_name: String,
}

impl<F: ItemFamily> HistoryEntry<F> {
    /// Whether the entry is an annotation.
    #[must_use]
    pub fn is_observation(&self) -> bool {
        self.event.is_observation()
    }
}

/// Presentation timeline: every event, ascending, with actor names.
#[must_use]
pub fn build_history<F: ItemFamily>(
    events: &[StatusEvent<F>],
    identities: &Identities,
) -> Vec<HistoryEntry<F>> {
    events
        .iter()
        .map(|event| HistoryEntry {
            actor_name: identities.name_of(event.actor_id).to_string(),
            event: event.clone(),
        })
        .collect()
}

/// Status-change entries of a timeline.
pub fn status_changes<F: ItemFamily>(
    history: &[HistoryEntry<F>],
) -> impl Iterator<Item = &HistoryEntry<F>> {
    history.iter().filter(|entry| !entry.is_observation())
}

/// Observation entries of a timeline.
pub fn observations<F: ItemFamily>(
    history: &[HistoryEntry<F>],
) -> impl Iterator<Item = &HistoryEntry<F>> {
    history.iter().filter(|entry| entry.is_observation())
}

/// Everything derived from one item's ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(bound = "")]
pub struct DerivedView<F: ItemFamily> {
    /// Ledger-derived status.
    pub current_status: Status,
    /// Latched metadata.
    pub latched: Latched<F>,
    /// The ledger in ascending order.
    pub ordered_history: Vec<StatusEvent<F>>,
}

impl<F: ItemFamily> DerivedView<F> {
    /// View of an item with an empty ledger.
    #[must_use]
    pub fn initial(default: Status) -> Self {
        Self {
            current_status: default,
            latched: Latched::<F>::default(),
            ordered_history: Vec::new(),
        }
    }

    /// Replay a ledger from scratch.
    #[must_use]
    pub fn derive(default: &Status, mut events: Vec<StatusEvent<F>>) -> Self {
        if !is_ledger_ordered(&events) {
            sort_ledger(&mut events);
        }
        Self {
            current_status: compute_current_status(&events, default),
            latched: compute_latched(&events),
            ordered_history: events,
        }
    }

    /// Fold one more event into the view.
    ///
    /// Equivalent to re-deriving with the event appended, provided the event
    /// follows every event already in the view.
    pub fn apply(&mut self, event: StatusEvent<F>) {
        self.current_status = next_status(&self.current_status, &event);
        event.details.latch_into(&mut self.latched);
        self.ordered_history.push(event);
    }

    /// Number of events in the ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered_history.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered_history.is_empty()
    }
}

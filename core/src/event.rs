//! Ledger events.
//!
//! A [`StatusEvent`] is an immutable fact about one item: either a status
//! change or, with the reserved `observation` label, a free-text annotation.
//! Events are produced from an [`EventDraft`] by the ledger store, which
//! assigns the id, the per-item [`Sequence`] and the timestamp.
//!
//! # Ordering
//!
//! Events for one item are totally ordered by `(sequence, created_at, id)`.
//! The sequence alone is sufficient for events written through a store; the
//! timestamp and id only break ties for hand-assembled ledgers.

use crate::family::{EventDetails, ItemFamily};
use crate::ids::{ActorId, EventId, ItemId, Sequence};
use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A validated event ready to be appended.
///
/// Drafts are normally produced by
/// [`TransitionValidator`](crate::validator::TransitionValidator); stores
/// trust them as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EventDraft<F: ItemFamily> {
    /// Item the event belongs to.
    pub item_id: ItemId,
    /// New status, or `observation`.
    pub status: Status,
    /// Who recorded the event.
    pub actor_id: ActorId,
    /// Free text; always present for observations.
    pub notes: Option<String>,
    /// Family metadata.
    pub details: F::Details,
}

impl<F: ItemFamily> EventDraft<F> {
    /// Whether this draft is an annotation rather than a status change.
    #[must_use]
    pub fn is_observation(&self) -> bool {
        self.status.is_observation()
    }
}

/// An immutable, stored ledger event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StatusEvent<F: ItemFamily> {
    /// Server-assigned id.
    pub id: EventId,
    /// Item the event belongs to.
    pub item_id: ItemId,
    /// Position in the item's ledger.
    pub sequence: Sequence,
    /// New status, or `observation`.
    pub status: Status,
    /// Who recorded the event.
    pub actor_id: ActorId,
    /// Free text attached to the event.
    pub notes: Option<String>,
    /// When the store accepted the event.
    pub created_at: DateTime<Utc>,
    /// Family metadata.
    pub details: F::Details,
}

impl<F: ItemFamily> StatusEvent<F> {
    /// Materialize a draft with its store-assigned identity.
    #[must_use]
    pub fn from_draft(
        draft: EventDraft<F>,
        id: EventId,
        sequence: Sequence,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            item_id: draft.item_id,
            sequence,
            status: draft.status,
            actor_id: draft.actor_id,
            notes: draft.notes,
            created_at,
            details: draft.details,
        }
    }

    /// Whether this event is an annotation rather than a status change.
    #[must_use]
    pub fn is_observation(&self) -> bool {
        self.status.is_observation()
    }

    /// Whether the event carries any family metadata.
    #[must_use]
    pub fn has_details(&self) -> bool {
        !self.details.is_empty()
    }

    /// Compare two events by ledger order.
    #[must_use]
    pub fn ledger_cmp(&self, other: &Self) -> Ordering {
        self.sequence
            .cmp(&other.sequence)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort events into ledger order in place.
pub fn sort_ledger<F: ItemFamily>(events: &mut [StatusEvent<F>]) {
    events.sort_by(StatusEvent::ledger_cmp);
}

/// Whether events are already in strictly ascending ledger order.
#[must_use]
pub fn is_ledger_ordered<F: ItemFamily>(events: &[StatusEvent<F>]) -> bool {
    events
        .windows(2)
        .all(|pair| pair[0].ledger_cmp(&pair[1]) == Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{Demand, Indication, IndicationDetails};
    use chrono::TimeZone;

    #[allow(clippy::unwrap_used)] // Panics: hardcoded timestamps are valid
    fn event(sequence: u64, status: &str, second: u32) -> StatusEvent<Demand> {
        StatusEvent {
            id: EventId::new(),
            item_id: ItemId::new(),
            sequence: Sequence::new(sequence),
            status: Status::new(status),
            actor_id: ActorId::new(),
            notes: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap(),
            details: Default::default(),
        }
    }

    #[test]
    fn sequence_dominates_timestamp() {
        // Clock went backwards between appends; sequence still wins.
        let mut events = vec![event(2, "resolved", 0), event(1, "in_progress", 30)];
        sort_ledger(&mut events);
        assert_eq!(events[0].status, "in_progress");
        assert_eq!(events[1].status, "resolved");
        assert!(is_ledger_ordered(&events));
    }

    #[test]
    fn timestamp_breaks_sequence_ties() {
        let mut events = vec![event(1, "b", 10), event(1, "a", 5)];
        sort_ledger(&mut events);
        assert_eq!(events[0].status, "a");
    }

    #[test]
    #[allow(clippy::unwrap_used)] // Panics: hardcoded timestamps are valid
    fn from_draft_copies_fields() {
        let draft = EventDraft::<Indication> {
            item_id: ItemId::new(),
            status: Status::new(Status::FILED),
            actor_id: ActorId::new(),
            notes: Some("Filed with the chamber".to_string()),
            details: IndicationDetails::with_protocol("2024-001"),
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let stored = StatusEvent::from_draft(draft.clone(), EventId::new(), Sequence::FIRST, at);

        assert_eq!(stored.item_id, draft.item_id);
        assert_eq!(stored.status, draft.status);
        assert_eq!(stored.created_at, at);
        assert!(stored.has_details());
        assert!(!stored.is_observation());
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn serializes_details_inline() {
        let stored = event(1, "pending", 0);
        let json = serde_json::to_value(&stored).expect("serializes");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["details"], serde_json::json!({}));
    }
}

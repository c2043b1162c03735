//! Read-side assembly.
//!
//! Joins items with their derived ledger views and the display labels of
//! everything they reference. Assembly is pure and infallible: a dangling or
//! missing reference degrades to a placeholder label instead of an error.

use crate::config::FamilyConfig;
use crate::event::StatusEvent;
use crate::family::ItemFamily;
use crate::identity::Identities;
use crate::ids::{CategoryId, ConstituentId};
use crate::item::Item;
use crate::reconstruct::DerivedView;
use crate::store::EventsByItem;
use serde::Serialize;
use std::collections::HashMap;

/// Requester label when the item names nobody or the reference is dangling.
pub const NOT_INFORMED: &str = "Not informed";

/// Category label when the item has none or the reference is dangling.
pub const UNCATEGORIZED: &str = "General";

/// Labels of constituents and categories referenced by a batch of items.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelatedLabels {
    /// Constituent names.
    pub constituents: HashMap<ConstituentId, String>,
    /// Category labels.
    pub categories: HashMap<CategoryId, String>,
}

impl RelatedLabels {
    /// Requester label, or [`NOT_INFORMED`].
    #[must_use]
    pub fn requester(&self, id: Option<ConstituentId>) -> &str {
        id.and_then(|id| self.constituents.get(&id))
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(NOT_INFORMED)
    }

    /// Category label, or [`UNCATEGORIZED`].
    #[must_use]
    pub fn category(&self, id: Option<CategoryId>) -> &str {
        id.and_then(|id| self.categories.get(&id))
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .unwrap_or(UNCATEGORIZED)
    }
}

/// One item as shown to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(bound = "")]
pub struct ReadModel<F: ItemFamily> {
    /// The stored item; its `current_status` is advisory only.
    pub item: Item<F>,
    /// Ledger-derived state.
    pub derived: DerivedView<F>,
    /// Display name of the author.
    pub author_name: String,
    /// Display name of the requesting constituent.
    pub requester_name: String,
    /// Category label.
    pub category_label: String,
    /// Whether the derived status is terminal under the family policy.
    pub terminal: bool,
}

/// Derive an item's view, falling back to its initial status.
#[must_use]
pub fn derive<F: ItemFamily>(item: &Item<F>, events: Vec<StatusEvent<F>>) -> DerivedView<F> {
    DerivedView::derive(&item.initial_status, events)
}

/// Build read models for a batch of items.
///
/// Items keep their input order. Items missing from `events_by_item` are
/// treated as having an empty ledger.
#[must_use]
pub fn assemble<F: ItemFamily>(
    items: Vec<Item<F>>,
    mut events_by_item: EventsByItem<F>,
    identities: &Identities,
    related: &RelatedLabels,
    policy: &FamilyConfig,
) -> Vec<ReadModel<F>> {
    items
        .into_iter()
        .map(|item| {
            let events = events_by_item.remove(&item.id).unwrap_or_default();
            let derived = derive(&item, events);
            ReadModel {
                author_name: identities.name_of(item.author_id).to_string(),
                requester_name: related.requester(item.requester_id).to_string(),
                category_label: related.category(item.category_id).to_string(),
                terminal: policy.is_terminal(&derived.current_status),
                derived,
                item,
            }
        })
        .collect()
}

//! Tracked items and the inputs used to create and query them.

use crate::family::ItemFamily;
use crate::ids::{ActorId, CategoryId, ConstituentId, InstitutionId, ItemId};
use crate::status::Status;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// A demand or indication record.
///
/// `current_status` is a denormalized cache of the ledger-derived status. It
/// may lag behind the ledger; readers always derive the status from events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Item<F: ItemFamily> {
    /// Item id.
    pub id: ItemId,
    /// Owning institution.
    pub institution_id: InstitutionId,
    /// Staff member who created the item.
    pub author_id: ActorId,
    /// Constituent the item was raised for.
    pub requester_id: Option<ConstituentId>,
    /// Category or tag.
    pub category_id: Option<CategoryId>,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    /// Status the item was created with; the fallback when the ledger is empty.
    pub initial_status: Status,
    /// Advisory copy of the derived status.
    pub current_status: Status,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Deadline set at creation.
    pub deadline: Option<NaiveDate>,
    #[serde(skip)]
    family: PhantomData<F>,
}

impl<F: ItemFamily> Item<F> {
    /// Build an item from a creation request.
    #[must_use]
    pub fn from_new(
        new_item: NewItem<F>,
        id: ItemId,
        institution_id: InstitutionId,
        author_id: ActorId,
        created_at: DateTime<Utc>,
    ) -> Self {
        let initial_status = new_item
            .initial_status
            .filter(|status| !status.is_blank() && !status.is_observation())
            .unwrap_or_else(F::default_status);

        Self {
            id,
            institution_id,
            author_id,
            requester_id: new_item.requester_id,
            category_id: new_item.category_id,
            title: new_item.title.trim().to_string(),
            description: new_item
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            current_status: initial_status.clone(),
            initial_status,
            created_at,
            deadline: new_item.deadline,
            family: PhantomData,
        }
    }

    /// UTC date the item was created, used to validate deadline revisions.
    #[must_use]
    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// Request to create an item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct NewItem<F: ItemFamily> {
    /// Short title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Constituent the item is raised for.
    #[serde(default)]
    pub requester_id: Option<ConstituentId>,
    /// Category or tag.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Explicit initial status; the family default when absent.
    #[serde(default)]
    pub initial_status: Option<Status>,
    /// Deadline.
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(skip)]
    family: PhantomData<F>,
}

impl<F: ItemFamily> NewItem<F> {
    /// Creation request with only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            requester_id: None,
            category_id: None,
            initial_status: None,
            deadline: None,
            family: PhantomData,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the requesting constituent.
    #[must_use]
    pub const fn requester(mut self, requester_id: ConstituentId) -> Self {
        self.requester_id = Some(requester_id);
        self
    }

    /// Set the category.
    #[must_use]
    pub const fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Start in an explicit status instead of the family default.
    #[must_use]
    pub fn initial_status(mut self, status: impl Into<Status>) -> Self {
        self.initial_status = Some(status.into());
        self
    }

    /// Set the deadline.
    #[must_use]
    pub const fn deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Criteria for listing items.
///
/// The institution is always the actor's own; every other criterion is
/// optional. `status` matches the ledger-derived status, not the cached one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Derived status to match.
    pub status: Option<Status>,
    /// Requesting constituent to match.
    pub requester_id: Option<ConstituentId>,
    /// Category to match.
    pub category_id: Option<CategoryId>,
    /// Author to match.
    pub author_id: Option<ActorId>,
    /// Keep items whose derived status is terminal. Ignored when `status`
    /// is set, so a terminal status can be asked for by name.
    pub include_terminal: bool,
}

impl ListFilter {
    /// Match every item, terminal ones included.
    #[must_use]
    pub fn all() -> Self {
        Self {
            include_terminal: true,
            ..Self::default()
        }
    }

    /// Only items currently in `status`.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<Status>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Only items raised for `requester_id`.
    #[must_use]
    pub const fn with_requester(mut self, requester_id: ConstituentId) -> Self {
        self.requester_id = Some(requester_id);
        self
    }

    /// Only items in `category_id`.
    #[must_use]
    pub const fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Only items authored by `author_id`.
    #[must_use]
    pub const fn with_author(mut self, author_id: ActorId) -> Self {
        self.author_id = Some(author_id);
        self
    }

    /// Whether an item's stored references pass the filter.
    ///
    /// Status and terminal criteria are applied after derivation.
    #[must_use]
    pub fn matches_references<F: ItemFamily>(&self, item: &Item<F>) -> bool {
        self.requester_id.is_none_or(|id| item.requester_id == Some(id))
            && self.category_id.is_none_or(|id| item.category_id == Some(id))
            && self.author_id.is_none_or(|id| item.author_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{Demand, Indication};

    fn item<F: ItemFamily>(new_item: NewItem<F>) -> Item<F> {
        Item::from_new(
            new_item,
            ItemId::new(),
            InstitutionId::new(),
            ActorId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn family_default_applies_without_explicit_status() {
        let demand = item(NewItem::<Demand>::titled("Streetlight out"));
        assert_eq!(demand.current_status, "pending");
        assert_eq!(demand.initial_status, demand.current_status);

        let indication = item(NewItem::<Indication>::titled("Speed bump"));
        assert_eq!(indication.current_status, "created");
    }

    #[test]
    fn explicit_initial_status_wins() {
        let demand = item(NewItem::<Demand>::titled("Pothole").initial_status("in_progress"));
        assert_eq!(demand.current_status, "in_progress");
    }

    #[test]
    fn observation_is_not_an_initial_status() {
        let demand = item(NewItem::<Demand>::titled("Pothole").initial_status("observation"));
        assert_eq!(demand.current_status, "pending");
    }

    #[test]
    fn blank_description_is_dropped() {
        let demand = item(NewItem::<Demand>::titled("  Pothole ").description("   "));
        assert_eq!(demand.title, "Pothole");
        assert_eq!(demand.description, None);
    }

    #[test]
    fn reference_filters() {
        let requester = ConstituentId::new();
        let demand = item(NewItem::<Demand>::titled("Pothole").requester(requester));

        assert!(ListFilter::all().matches_references(&demand));
        assert!(ListFilter::all().with_requester(requester).matches_references(&demand));
        assert!(!ListFilter::all()
            .with_requester(ConstituentId::new())
            .matches_references(&demand));
        assert!(!ListFilter::all()
            .with_category(CategoryId::new())
            .matches_references(&demand));
    }
}

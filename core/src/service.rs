//! Caller-facing ledger operations.
//!
//! [`LedgerService`] wires the pure pieces (validation, reconstruction, read
//! assembly) to the injected collaborators of a [`LedgerEnvironment`]. Every
//! operation runs the permission check first and validates before writing;
//! once an event is appended, nothing that follows can undo it.
//!
//! # Example
//!
//! ```no_run
//! use status_ledger_core::environment::Actor;
//! use status_ledger_core::error::Result;
//! use status_ledger_core::family::{Demand, DemandDetails};
//! use status_ledger_core::item::NewItem;
//! use status_ledger_core::service::LedgerService;
//!
//! async fn open_and_start(service: &LedgerService<Demand>, actor: &Actor) -> Result<()> {
//!     let item = service.create_item(actor, NewItem::titled("Broken streetlight")).await?;
//!     service
//!         .advance_status(actor, item.id, "in_progress", Some("Crew dispatched"), DemandDetails::default())
//!         .await?;
//!     let history = service.get_history(actor, item.id).await?;
//!     assert_eq!(history.len(), 1);
//!     Ok(())
//! }
//! ```

use crate::cache_sync::ItemCacheSync;
use crate::config::{FamilyConfig, LedgerConfig};
use crate::environment::{
    Actor, Capability, Clock, IdentityDirectory, PermissionChecker, RelatedDirectory,
};
use crate::error::{LedgerError, Result};
use crate::event::{EventDraft, StatusEvent, is_ledger_ordered, sort_ledger};
use crate::family::ItemFamily;
use crate::identity::IdentityResolver;
use crate::ids::{CategoryId, ConstituentId, ItemId};
use crate::item::{Item, ListFilter, NewItem};
use crate::read_model::{self, ReadModel, RelatedLabels};
use crate::reconstruct::{HistoryEntry, build_history, next_status};
use crate::status::Status;
use crate::store::{ItemStore, LedgerStore};
use crate::validator::TransitionValidator;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Collaborators a [`LedgerService`] depends on.
pub struct LedgerEnvironment<F: ItemFamily> {
    /// Event storage.
    pub ledger: Arc<dyn LedgerStore<F>>,
    /// Item storage.
    pub items: Arc<dyn ItemStore<F>>,
    /// Capability checks.
    pub permissions: Arc<dyn PermissionChecker>,
    /// Actor names.
    pub directory: Arc<dyn IdentityDirectory>,
    /// Constituent and category labels.
    pub related: Arc<dyn RelatedDirectory>,
    /// Time source for item creation.
    pub clock: Arc<dyn Clock>,
}

impl<F: ItemFamily> Clone for LedgerEnvironment<F> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            items: Arc::clone(&self.items),
            permissions: Arc::clone(&self.permissions),
            directory: Arc::clone(&self.directory),
            related: Arc::clone(&self.related),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Status ledger operations for one item family.
pub struct LedgerService<F: ItemFamily> {
    ledger: Arc<dyn LedgerStore<F>>,
    items: Arc<dyn ItemStore<F>>,
    related: Arc<dyn RelatedDirectory>,
    clock: Arc<dyn Clock>,
    validator: TransitionValidator,
    identities: IdentityResolver,
    cache: ItemCacheSync<F>,
}

impl<F: ItemFamily> LedgerService<F> {
    /// Assemble a service from its collaborators and the family's policy.
    #[must_use]
    pub fn new(environment: LedgerEnvironment<F>, config: &LedgerConfig) -> Self {
        let policy = config.family::<F>().clone();
        Self {
            validator: TransitionValidator::new(environment.permissions, policy),
            identities: IdentityResolver::new(environment.directory),
            cache: ItemCacheSync::new(Arc::clone(&environment.items)),
            ledger: environment.ledger,
            items: environment.items,
            related: environment.related,
            clock: environment.clock,
        }
    }

    /// The family policy in force.
    #[must_use]
    pub const fn policy(&self) -> &FamilyConfig {
        self.validator.policy()
    }

    /// Create an item in the actor's institution.
    ///
    /// The initial status is the explicit one from `new_item`, or the family
    /// default. When the family policy asks for it, a creation event carrying
    /// the initial status is appended; if that append fails the item still
    /// exists and the failure is only logged.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: the actor lacks `write` on the family module
    /// - `TransientStore`: the item could not be stored
    #[tracing::instrument(skip(self, new_item), fields(kind = F::KIND.as_str(), actor = %actor.user_id))]
    pub async fn create_item(&self, actor: &Actor, new_item: NewItem<F>) -> Result<Item<F>> {
        self.validator
            .authorize::<F>(actor, actor.institution_id, Capability::Write)
            .await
            .map_err(rejected::<F>)?;

        let item = Item::from_new(
            new_item,
            ItemId::new(),
            actor.institution_id,
            actor.user_id,
            self.clock.now(),
        );
        let item = self.items.insert(item).await?;
        tracing::info!(item = %item.id, status = %item.initial_status, "Item created");

        let policy = self.policy();
        if policy.record_creation_event {
            let draft = EventDraft {
                item_id: item.id,
                status: item.initial_status.clone(),
                actor_id: actor.user_id,
                notes: Some(policy.creation_notes.clone()),
                details: F::Details::default(),
            };
            match self.ledger.append(draft).await {
                Ok(event) => record_append::<F>(&event),
                Err(error) => {
                    tracing::warn!(item = %item.id, %error, "Failed to record creation event");
                }
            }
        }

        Ok(item)
    }

    /// Append a status change.
    ///
    /// On success the item's cached status is updated from the new event;
    /// a failed cache write is logged and does not affect the result.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such item
    /// - `PermissionDenied`: the actor lacks `write` on the item's institution
    /// - `Validation`: blank or reserved status, missing notes, bad metadata
    /// - `TransientStore`: the append failed; nothing was recorded
    #[tracing::instrument(
        skip(self, status, notes, details),
        fields(kind = F::KIND.as_str(), actor = %actor.user_id, item = %item_id)
    )]
    pub async fn advance_status(
        &self,
        actor: &Actor,
        item_id: ItemId,
        status: impl Into<Status>,
        notes: Option<&str>,
        details: F::Details,
    ) -> Result<StatusEvent<F>> {
        let item = self.items.get(item_id).await?;
        let draft = self
            .validator
            .validate_transition(actor, &item, status.into(), notes, details)
            .await
            .map_err(rejected::<F>)?;

        let event = self.ledger.append(draft).await?;
        record_append::<F>(&event);

        // Non-observation events replace the status outright, so the cached
        // value is enough as the fold's starting point.
        let status = next_status(&item.current_status, &event);
        self.cache.sync(item_id, &status).await;

        Ok(event)
    }

    /// Append an observation. The status and the cached status are untouched.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such item
    /// - `PermissionDenied`: the actor lacks `write` on the item's institution
    /// - `Validation`: blank notes
    /// - `TransientStore`: the append failed; nothing was recorded
    #[tracing::instrument(
        skip(self, notes),
        fields(kind = F::KIND.as_str(), actor = %actor.user_id, item = %item_id)
    )]
    pub async fn add_observation(
        &self,
        actor: &Actor,
        item_id: ItemId,
        notes: &str,
    ) -> Result<StatusEvent<F>> {
        let item = self.items.get(item_id).await?;
        let draft = self
            .validator
            .validate_observation(actor, &item, notes)
            .await
            .map_err(rejected::<F>)?;

        let event = self.ledger.append(draft).await?;
        record_append::<F>(&event);
        Ok(event)
    }

    /// List the actor's institution's items with derived state, newest first.
    ///
    /// Loads items, their events, actor names and related labels in batches.
    /// Failing label lookups degrade to placeholders.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: the actor lacks `read` on the family module
    /// - `TransientStore`: items or events could not be loaded
    #[tracing::instrument(skip(self, filter), fields(kind = F::KIND.as_str(), actor = %actor.user_id))]
    pub async fn list_items(&self, actor: &Actor, filter: &ListFilter) -> Result<Vec<ReadModel<F>>> {
        self.validator
            .authorize::<F>(actor, actor.institution_id, Capability::Read)
            .await?;

        let items: Vec<Item<F>> = self
            .items
            .list(actor.institution_id)
            .await?
            .into_iter()
            .filter(|item| filter.matches_references(item))
            .collect();
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let events = self
            .ledger
            .list_by_items(items.iter().map(|item| item.id).collect())
            .await?;

        let identities = self
            .identities
            .resolve_batch(items.iter().map(|item| item.author_id), actor.institution_id)
            .await;

        let related = self.related_labels(&items).await;

        let policy = self.policy();
        let models = read_model::assemble(items, events, &identities, &related, policy)
            .into_iter()
            .filter(|model| match &filter.status {
                Some(status) => model.derived.current_status == *status,
                None => filter.include_terminal || !model.terminal,
            })
            .collect::<Vec<_>>();

        tracing::debug!(count = models.len(), "Items listed");
        Ok(models)
    }

    /// An item's full timeline, ascending, with actor names.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such item
    /// - `PermissionDenied`: the actor lacks `read` on the item's institution
    /// - `TransientStore`: the ledger could not be loaded
    #[tracing::instrument(skip(self), fields(kind = F::KIND.as_str(), actor = %actor.user_id, item = %item_id))]
    pub async fn get_history(&self, actor: &Actor, item_id: ItemId) -> Result<Vec<HistoryEntry<F>>> {
        let item = self.items.get(item_id).await?;
        self.validator
            .authorize::<F>(actor, item.institution_id, Capability::Read)
            .await?;

        let mut events = self.ledger.list_by_item(item_id).await?;
        if !is_ledger_ordered(&events) {
            sort_ledger(&mut events);
        }

        let identities = self
            .identities
            .resolve_batch(events.iter().map(|event| event.actor_id), item.institution_id)
            .await;

        Ok(build_history(&events, &identities))
    }

    /// Replay an item's ledger and force its cached status to match.
    ///
    /// Returns the derived status. A failed cache write is logged, not
    /// returned.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such item
    /// - `PermissionDenied`: the actor lacks `write` on the item's institution
    /// - `TransientStore`: the ledger could not be loaded
    #[tracing::instrument(skip(self), fields(kind = F::KIND.as_str(), actor = %actor.user_id, item = %item_id))]
    pub async fn reconcile(&self, actor: &Actor, item_id: ItemId) -> Result<Status> {
        let item = self.items.get(item_id).await?;
        self.validator
            .authorize::<F>(actor, item.institution_id, Capability::Write)
            .await?;

        let events = self.ledger.list_by_item(item_id).await?;
        let view = read_model::derive(&item, events);

        if view.current_status != item.current_status {
            tracing::info!(
                cached = %item.current_status,
                derived = %view.current_status,
                "Cached status was stale"
            );
        }
        self.cache.sync(item_id, &view.current_status).await;

        Ok(view.current_status)
    }

    async fn related_labels(&self, items: &[Item<F>]) -> RelatedLabels {
        let constituents: BTreeSet<ConstituentId> =
            items.iter().filter_map(|item| item.requester_id).collect();
        let categories: BTreeSet<CategoryId> =
            items.iter().filter_map(|item| item.category_id).collect();

        let mut labels = RelatedLabels::default();
        if !constituents.is_empty() {
            match self
                .related
                .constituent_names(constituents.into_iter().collect())
                .await
            {
                Ok(names) => labels.constituents = names,
                Err(error) => tracing::warn!(%error, "Constituent lookup failed"),
            }
        }
        if !categories.is_empty() {
            match self
                .related
                .category_labels(categories.into_iter().collect())
                .await
            {
                Ok(names) => labels.categories = names,
                Err(error) => tracing::warn!(%error, "Category lookup failed"),
            }
        }
        labels
    }
}

impl<F: ItemFamily> std::fmt::Debug for LedgerService<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("kind", &F::KIND)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

fn record_append<F: ItemFamily>(event: &StatusEvent<F>) {
    tracing::debug!(
        item = %event.item_id,
        sequence = %event.sequence,
        status = %event.status,
        "Event appended"
    );
    metrics::counter!(
        "status_ledger.append.total",
        "kind" => F::KIND.as_str(),
        "observation" => if event.is_observation() { "true" } else { "false" }
    )
    .increment(1);
}

fn rejected<F: ItemFamily>(error: LedgerError) -> LedgerError {
    let reason = match &error {
        LedgerError::PermissionDenied { .. } => "permission",
        LedgerError::Validation(_) => "validation",
        LedgerError::NotFound { .. } | LedgerError::TransientStore(_) => return error,
    };
    metrics::counter!("status_ledger.append.rejected", "kind" => F::KIND.as_str(), "reason" => reason)
        .increment(1);
    error
}

//! Gatekeeping in front of the ledger.
//!
//! A transition or observation becomes an [`EventDraft`] only after two
//! checks: the actor holds the `write` capability on the family's module for
//! the institution that owns the item, and the request passes the family's
//! policy. Nothing here writes; a rejected request leaves no trace.
//!
//! There is no transition graph. Any status may follow any other.

use crate::config::FamilyConfig;
use crate::environment::{Actor, Capability, PermissionChecker};
use crate::error::{LedgerError, Result, ValidationError};
use crate::event::EventDraft;
use crate::family::{EventDetails, ItemFamily};
use crate::ids::InstitutionId;
use crate::item::Item;
use crate::status::Status;
use std::sync::Arc;

/// Pure policy check for a status change.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the status is blank or reserved, when
/// the policy demands notes and none were given, or when the metadata is
/// malformed.
pub fn check_transition<F: ItemFamily>(
    policy: &FamilyConfig,
    actor: &Actor,
    item: &Item<F>,
    status: Status,
    notes: Option<&str>,
    details: F::Details,
) -> std::result::Result<EventDraft<F>, ValidationError> {
    if status.is_blank() {
        return Err(ValidationError::MissingStatus);
    }
    if status.is_observation() {
        return Err(ValidationError::ReservedStatus);
    }

    let notes = trimmed(notes);
    if notes.is_none() && policy.requires_notes(&status) {
        return Err(ValidationError::NotesRequired { status });
    }

    let details = details.normalized();
    details.check(item.created_on())?;

    Ok(EventDraft {
        item_id: item.id,
        status,
        actor_id: actor.user_id,
        notes,
        details,
    })
}

/// Pure policy check for an observation.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyObservation`] when `notes` is blank.
pub fn check_observation<F: ItemFamily>(
    actor: &Actor,
    item: &Item<F>,
    notes: &str,
) -> std::result::Result<EventDraft<F>, ValidationError> {
    let notes = trimmed(Some(notes)).ok_or(ValidationError::EmptyObservation)?;
    Ok(EventDraft {
        item_id: item.id,
        status: Status::observation(),
        actor_id: actor.user_id,
        notes: Some(notes),
        details: F::Details::default(),
    })
}

fn trimmed(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Permission and policy gate producing ready-to-append drafts.
#[derive(Clone)]
pub struct TransitionValidator {
    permissions: Arc<dyn PermissionChecker>,
    policy: FamilyConfig,
}

impl TransitionValidator {
    /// Create a validator for one family's policy.
    #[must_use]
    pub fn new(permissions: Arc<dyn PermissionChecker>, policy: FamilyConfig) -> Self {
        Self {
            permissions,
            policy,
        }
    }

    /// The policy this validator enforces.
    #[must_use]
    pub const fn policy(&self) -> &FamilyConfig {
        &self.policy
    }

    /// Require `capability` on `F`'s module within `institution_id`.
    ///
    /// Actors acting for another institution are always denied.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: the capability is missing
    /// - `TransientStore`: the permission source failed
    pub async fn authorize<F: ItemFamily>(
        &self,
        actor: &Actor,
        institution_id: InstitutionId,
        capability: Capability,
    ) -> Result<()> {
        let module = F::KIND.module();
        let allowed = actor.institution_id == institution_id
            && self
                .permissions
                .has_capability(actor.user_id, institution_id, module, capability)
                .await?;

        if allowed {
            Ok(())
        } else {
            tracing::info!(
                actor = %actor.user_id,
                institution = %institution_id,
                module,
                action = %capability,
                "Permission denied"
            );
            Err(LedgerError::PermissionDenied {
                actor: actor.user_id,
                institution: institution_id,
                module,
                action: capability.as_str(),
            })
        }
    }

    /// Validate a status change.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: the actor may not write to this item
    /// - `Validation`: see [`check_transition`]
    /// - `TransientStore`: the permission source failed
    pub async fn validate_transition<F: ItemFamily>(
        &self,
        actor: &Actor,
        item: &Item<F>,
        status: Status,
        notes: Option<&str>,
        details: F::Details,
    ) -> Result<EventDraft<F>> {
        self.authorize::<F>(actor, item.institution_id, Capability::Write)
            .await?;
        Ok(check_transition(
            &self.policy,
            actor,
            item,
            status,
            notes,
            details,
        )?)
    }

    /// Validate an observation.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: the actor may not write to this item
    /// - `Validation`: the notes are blank
    /// - `TransientStore`: the permission source failed
    pub async fn validate_observation<F: ItemFamily>(
        &self,
        actor: &Actor,
        item: &Item<F>,
        notes: &str,
    ) -> Result<EventDraft<F>> {
        self.authorize::<F>(actor, item.institution_id, Capability::Write)
            .await?;
        Ok(check_observation(actor, item, notes)?)
    }
}

impl std::fmt::Debug for TransitionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionValidator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::family::{Demand, DemandDetails, Indication, IndicationDetails};
    use crate::ids::{ActorId, ItemId};
    use crate::item::NewItem;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[allow(clippy::unwrap_used)] // Panics: hardcoded timestamps are valid
    fn item<F: ItemFamily>(actor: &Actor) -> Item<F> {
        Item::from_new(
            NewItem::titled("Broken streetlight"),
            ItemId::new(),
            actor.institution_id,
            actor.user_id,
            Utc.with_ymd_and_hms(2024, 2, 10, 8, 0, 0).unwrap(),
        )
    }

    fn actor() -> Actor {
        Actor::new(ActorId::new(), InstitutionId::new())
    }

    #[test]
    fn notes_required_status_rejects_blank_notes() {
        let config = LedgerConfig::default();
        let actor = actor();
        let demand = item::<Demand>(&actor);

        for notes in [None, Some(""), Some("   \t")] {
            let result = check_transition(
                config.family::<Demand>(),
                &actor,
                &demand,
                Status::new("in_progress"),
                notes,
                DemandDetails::default(),
            );
            assert_eq!(
                result,
                Err(ValidationError::NotesRequired {
                    status: Status::new("in_progress")
                })
            );
        }
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if validation rejects
    fn notes_are_trimmed() {
        let config = LedgerConfig::default();
        let actor = actor();
        let demand = item::<Demand>(&actor);

        let draft = check_transition(
            config.family::<Demand>(),
            &actor,
            &demand,
            Status::new("in_progress"),
            Some("  investigating "),
            DemandDetails::default(),
        )
        .expect("valid transition");

        assert_eq!(draft.notes.as_deref(), Some("investigating"));
        assert_eq!(draft.actor_id, actor.user_id);
        assert_eq!(draft.item_id, demand.id);
    }

    #[test]
    fn other_statuses_accept_empty_notes() {
        let config = LedgerConfig::default();
        let actor = actor();
        let demand = item::<Demand>(&actor);

        let result = check_transition(
            config.family::<Demand>(),
            &actor,
            &demand,
            Status::new("resolved"),
            Some(""),
            DemandDetails::default(),
        );
        assert!(result.is_ok_and(|draft| draft.notes.is_none()));
    }

    #[test]
    fn observation_label_is_reserved() {
        let config = LedgerConfig::default();
        let actor = actor();
        let demand = item::<Demand>(&actor);

        let result = check_transition(
            config.family::<Demand>(),
            &actor,
            &demand,
            Status::observation(),
            Some("note"),
            DemandDetails::default(),
        );
        assert_eq!(result, Err(ValidationError::ReservedStatus));
    }

    #[test]
    fn blank_status_is_rejected() {
        let config = LedgerConfig::default();
        let actor = actor();
        let indication = item::<Indication>(&actor);

        let result = check_transition(
            config.family::<Indication>(),
            &actor,
            &indication,
            Status::new("  "),
            None,
            IndicationDetails::default(),
        );
        assert_eq!(result, Err(ValidationError::MissingStatus));
    }

    #[test]
    #[allow(clippy::unwrap_used)] // Panics: hardcoded dates are valid
    fn malformed_metadata_is_rejected() {
        let config = LedgerConfig::default();
        let actor = actor();
        let demand = item::<Demand>(&actor);

        let result = check_transition(
            config.family::<Demand>(),
            &actor,
            &demand,
            Status::new("resolved"),
            None,
            DemandDetails::with_deadline(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        );
        assert!(matches!(result, Err(ValidationError::Metadata { .. })));
    }

    #[test]
    fn blank_protocol_is_dropped_not_rejected() {
        let config = LedgerConfig::default();
        let actor = actor();
        let indication = item::<Indication>(&actor);

        let result = check_transition(
            config.family::<Indication>(),
            &actor,
            &indication,
            Status::new("filed"),
            None,
            IndicationDetails::with_protocol("   "),
        );
        assert!(result.is_ok_and(|draft| draft.details.protocol_number.is_none()));
    }

    #[test]
    fn observation_requires_text() {
        let actor = actor();
        let demand = item::<Demand>(&actor);

        assert_eq!(
            check_observation(&actor, &demand, "  \n "),
            Err(ValidationError::EmptyObservation)
        );

        let draft = check_observation(&actor, &demand, " called voter, no answer ");
        assert!(draft.is_ok_and(|d| d.is_observation()
            && d.notes.as_deref() == Some("called voter, no answer")));
    }
}

//! End-to-end ledger scenarios against in-memory collaborators.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use status_ledger_core::environment::Capability;
use status_ledger_core::error::{LedgerError, ValidationError};
use status_ledger_core::family::{Demand, DemandDetails, Indication, IndicationDetails};
use status_ledger_core::identity::UNIDENTIFIED_USER;
use status_ledger_core::item::{ListFilter, NewItem};
use status_ledger_core::store::LedgerStore;
use status_ledger_core::Status;
use status_ledger_testing::{LedgerHarness, init_test_tracing};

#[tokio::test]
async fn scenario_a_observation_keeps_pending_status() {
    init_test_tracing();
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Broken streetlight"))
        .await
        .unwrap();
    assert_eq!(item.current_status, "pending");

    harness
        .service
        .add_observation(&harness.actor, item.id, "called voter, no answer")
        .await
        .unwrap();

    let history = harness
        .service
        .get_history(&harness.actor, item.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_observation());

    let listed = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();
    assert_eq!(listed[0].derived.current_status, "pending");
}

#[tokio::test]
async fn scenario_b_protocol_number_latches_through_resolution() {
    init_test_tracing();
    let harness = LedgerHarness::<Indication>::new();
    let item = harness
        .service
        .create_item(
            &harness.actor,
            NewItem::titled("Speed bump on Rua Sete").initial_status("pending"),
        )
        .await
        .unwrap();

    harness
        .service
        .advance_status(
            &harness.actor,
            item.id,
            "in_progress",
            Some("investigating"),
            IndicationDetails::default(),
        )
        .await
        .unwrap();
    let listed = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();
    assert_eq!(listed[0].derived.current_status, "in_progress");

    harness
        .service
        .advance_status(
            &harness.actor,
            item.id,
            "resolved",
            Some(""),
            IndicationDetails::with_protocol("2024-001"),
        )
        .await
        .unwrap();

    let listed = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();
    let derived = &listed[0].derived;
    assert_eq!(derived.current_status, "resolved");
    assert_eq!(derived.latched.protocol_number.as_deref(), Some("2024-001"));
    assert_eq!(harness.store.cached_status(item.id), Some(Status::new("resolved")));
}

#[tokio::test]
async fn scenario_c_actor_without_write_is_denied() {
    init_test_tracing();
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();
    let reader = harness.staff("Igor Fontes");
    harness.grant(reader.user_id, Capability::Read);

    let before = harness.store.list_by_item(item.id).await.unwrap().len();
    let result = harness
        .service
        .advance_status(
            &reader,
            item.id,
            "resolved",
            None,
            DemandDetails::default(),
        )
        .await;

    assert!(matches!(result, Err(LedgerError::PermissionDenied { .. })));
    assert_eq!(harness.store.list_by_item(item.id).await.unwrap().len(), before);
    assert_eq!(harness.store.cached_status(item.id), Some(Status::new("pending")));
}

#[tokio::test]
async fn scenario_d_names_fall_back_to_profiles_then_sentinel() {
    init_test_tracing();
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();

    let former = harness.writer("Helena Duarte Vieira");
    harness
        .service
        .add_observation(&former, item.id, "handed over")
        .await
        .unwrap();
    harness.directory.remove_member(harness.institution, former.user_id);
    harness
        .directory
        .add_profile(former.user_id, "Helena Duarte Vieira");

    let ghost = harness.writer("Nobody Known");
    harness
        .service
        .add_observation(&ghost, item.id, "left a note")
        .await
        .unwrap();
    harness.directory.remove_member(harness.institution, ghost.user_id);

    let history = harness
        .service
        .get_history(&harness.actor, item.id)
        .await
        .unwrap();

    assert_eq!(history[0].actor_name, "Helena Duarte");
    assert_eq!(history[1].actor_name, UNIDENTIFIED_USER);
    assert_eq!(harness.directory.roster_calls(), 1);
    assert_eq!(harness.directory.profile_calls(), 1);
}

#[tokio::test]
async fn identity_failures_degrade_to_sentinel() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();
    harness
        .service
        .add_observation(&harness.actor, item.id, "visited")
        .await
        .unwrap();
    harness.directory.set_fail_roster(true);
    harness.directory.set_fail_profiles(true);

    let history = harness
        .service
        .get_history(&harness.actor, item.id)
        .await
        .unwrap();

    assert_eq!(history[0].actor_name, UNIDENTIFIED_USER);
}

#[tokio::test]
async fn blank_observation_appends_nothing() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();

    for notes in ["", "   ", "\n\t"] {
        let result = harness
            .service
            .add_observation(&harness.actor, item.id, notes)
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::EmptyObservation))
        ));
    }
    assert_eq!(harness.store.event_count(item.id), 0);
    assert_eq!(harness.store.append_calls(), 0);
}

#[tokio::test]
async fn notes_required_status_appends_only_with_notes() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();

    let rejected = harness
        .service
        .advance_status(
            &harness.actor,
            item.id,
            "in_progress",
            Some("  "),
            DemandDetails::default(),
        )
        .await;
    assert!(matches!(
        rejected,
        Err(LedgerError::Validation(ValidationError::NotesRequired { .. }))
    ));
    assert_eq!(harness.store.event_count(item.id), 0);

    let event = harness
        .service
        .advance_status(
            &harness.actor,
            item.id,
            "in_progress",
            Some("crew dispatched"),
            DemandDetails::default(),
        )
        .await
        .unwrap();
    assert_eq!(event.notes.as_deref(), Some("crew dispatched"));
    assert_eq!(harness.store.event_count(item.id), 1);
    assert_eq!(
        harness.store.cached_status(item.id),
        Some(Status::new("in_progress"))
    );
}

#[tokio::test]
async fn failed_cache_write_still_succeeds() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();
    harness.store.set_fail_status_updates(true);

    let event = harness
        .service
        .advance_status(
            &harness.actor,
            item.id,
            "resolved",
            None,
            DemandDetails::default(),
        )
        .await
        .expect("append succeeds despite the cache");

    let ledger = harness.store.list_by_item(item.id).await.unwrap();
    assert_eq!(ledger, vec![event]);
    assert_eq!(harness.store.status_update_calls(), 1);
    assert_eq!(harness.store.cached_status(item.id), Some(Status::new("pending")));

    // The ledger wins on read regardless of the stale cache.
    let listed = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();
    assert_eq!(listed[0].derived.current_status, "resolved");
}

#[tokio::test]
async fn observation_skips_cache_write() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();

    harness
        .service
        .add_observation(&harness.actor, item.id, "still waiting")
        .await
        .unwrap();

    assert_eq!(harness.store.status_update_calls(), 0);
}

#[tokio::test]
async fn failed_append_surfaces_and_records_nothing() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();
    harness.store.set_fail_appends(true);

    let error = harness
        .service
        .advance_status(
            &harness.actor,
            item.id,
            "resolved",
            None,
            DemandDetails::default(),
        )
        .await
        .unwrap_err();

    assert!(error.is_retryable());
    assert_eq!(
        error.user_message(),
        "Something went wrong while saving. Please try again."
    );
    assert_eq!(harness.store.event_count(item.id), 0);
    assert_eq!(harness.store.status_update_calls(), 0);
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let harness = LedgerHarness::<Demand>::new();

    let result = harness
        .service
        .add_observation(&harness.actor, Default::default(), "hello")
        .await;

    assert!(matches!(result, Err(LedgerError::NotFound { .. })));
}

#[tokio::test]
async fn history_of_unknown_item_is_not_found() {
    let harness = LedgerHarness::<Demand>::new();

    let result = harness
        .service
        .get_history(&harness.actor, Default::default())
        .await;

    assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    assert_eq!(harness.directory.total_calls(), 0);
}

#[tokio::test]
async fn other_institution_cannot_read_or_write() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();

    let outsider = LedgerHarness::<Demand>::new().actor;

    let history = harness.service.get_history(&outsider, item.id).await;
    assert!(matches!(history, Err(LedgerError::PermissionDenied { .. })));
    let message = history.err().map(|error| error.user_message()).unwrap_or_default();
    assert!(message.contains("to view demands"));

    let write = harness
        .service
        .add_observation(&outsider, item.id, "not mine")
        .await;
    assert!(matches!(write, Err(LedgerError::PermissionDenied { .. })));
    assert_eq!(harness.store.event_count(item.id), 0);
}

#[tokio::test]
async fn creation_event_is_recorded_for_indications() {
    let harness = LedgerHarness::<Indication>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("New crosswalk"))
        .await
        .unwrap();

    let history = harness
        .service
        .get_history(&harness.actor, item.id)
        .await
        .unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event.status, "created");
    assert_eq!(history[0].actor_name, "Test Actor");
    assert_eq!(
        history[0].event.notes.as_deref(),
        Some("Indication created and saved")
    );
}

#[tokio::test]
async fn failed_creation_event_does_not_fail_creation() {
    let harness = LedgerHarness::<Indication>::new();
    harness.store.set_fail_appends(true);

    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("New crosswalk"))
        .await
        .expect("item is created even without its creation event");

    assert_eq!(harness.store.item_count(), 1);
    assert_eq!(harness.store.event_count(item.id), 0);
    assert_eq!(harness.store.append_calls(), 1);
}

#[tokio::test]
async fn list_items_is_batched_filtered_and_newest_first() {
    let harness = LedgerHarness::<Demand>::new();
    let first = harness
        .service
        .create_item(&harness.actor, NewItem::titled("First"))
        .await
        .unwrap();
    let second = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Second"))
        .await
        .unwrap();
    let third = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Third"))
        .await
        .unwrap();
    harness
        .service
        .advance_status(&harness.actor, second.id, "resolved", None, DemandDetails::default())
        .await
        .unwrap();
    harness
        .service
        .advance_status(
            &harness.actor,
            third.id,
            "in_progress",
            Some("on it"),
            DemandDetails::default(),
        )
        .await
        .unwrap();

    let all = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().map(|model| model.item.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
    assert!(all[1].terminal);
    assert_eq!(all[0].author_name, "Test Actor");

    let open = harness
        .service
        .list_items(&harness.actor, &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(open.len(), 2);

    let in_progress = harness
        .service
        .list_items(&harness.actor, &ListFilter::all().with_status("in_progress"))
        .await
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].item.id, third.id);

    // Three listings: one item read, one event read and one roster lookup each.
    assert_eq!(harness.store.item_list_calls(), 3);
    assert_eq!(harness.store.batch_read_calls(), 3);
    assert_eq!(harness.directory.total_calls(), 3);
}

#[tokio::test]
async fn terminal_status_can_be_listed_by_name() {
    let harness = LedgerHarness::<Demand>::new();
    let done = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Fixed pothole"))
        .await
        .unwrap();
    harness
        .service
        .create_item(&harness.actor, NewItem::titled("Open pothole"))
        .await
        .unwrap();
    harness
        .service
        .advance_status(&harness.actor, done.id, "resolved", None, DemandDetails::default())
        .await
        .unwrap();

    let resolved = harness
        .service
        .list_items(&harness.actor, &ListFilter::default().with_status("resolved"))
        .await
        .unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].item.id, done.id);
    assert!(resolved[0].terminal);

    let open = harness
        .service
        .list_items(&harness.actor, &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_ne!(open[0].item.id, done.id);
}

#[tokio::test]
async fn list_items_resolves_related_labels() {
    use status_ledger_core::ids::{CategoryId, ConstituentId};

    let harness = LedgerHarness::<Demand>::new();
    let requester = ConstituentId::new();
    let category = CategoryId::new();
    harness.related.add_constituent(requester, "José Almeida");
    harness.related.add_category(category, "Lighting");

    harness
        .service
        .create_item(
            &harness.actor,
            NewItem::titled("Streetlight")
                .requester(requester)
                .category(category),
        )
        .await
        .unwrap();
    harness
        .service
        .create_item(
            &harness.actor,
            NewItem::titled("Unknown requester").requester(ConstituentId::new()),
        )
        .await
        .unwrap();

    let listed = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();

    assert_eq!(listed[0].requester_name, "Not informed");
    assert_eq!(listed[0].category_label, "General");
    assert_eq!(listed[1].requester_name, "José Almeida");
    assert_eq!(listed[1].category_label, "Lighting");
    assert_eq!(harness.related.calls(), 2);

    let by_requester = harness
        .service
        .list_items(&harness.actor, &ListFilter::all().with_requester(requester))
        .await
        .unwrap();
    assert_eq!(by_requester.len(), 1);
}

#[tokio::test]
async fn failing_label_lookup_degrades_to_placeholders() {
    use status_ledger_core::ids::ConstituentId;

    let harness = LedgerHarness::<Demand>::new();
    let requester = ConstituentId::new();
    harness.related.add_constituent(requester, "José Almeida");
    harness.related.set_fail(true);
    harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole").requester(requester))
        .await
        .unwrap();

    let listed = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();

    assert_eq!(listed[0].requester_name, "Not informed");
}

#[tokio::test]
async fn reconcile_repairs_a_stale_cache() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();
    harness
        .service
        .advance_status(&harness.actor, item.id, "cancelled", None, DemandDetails::default())
        .await
        .unwrap();
    harness.store.force_cached_status(item.id, "pending");

    let status = harness
        .service
        .reconcile(&harness.actor, item.id)
        .await
        .unwrap();

    assert_eq!(status, "cancelled");
    assert_eq!(
        harness.store.cached_status(item.id),
        Some(Status::new("cancelled"))
    );
}

#[tokio::test]
async fn revised_deadline_latches_on_demands() {
    let harness = LedgerHarness::<Demand>::new();
    let item = harness
        .service
        .create_item(&harness.actor, NewItem::titled("Pothole"))
        .await
        .unwrap();
    let deadline = item.created_on() + chrono::Duration::days(30);

    harness
        .service
        .advance_status(
            &harness.actor,
            item.id,
            "in_progress",
            Some("waiting on asphalt"),
            DemandDetails::with_deadline(deadline),
        )
        .await
        .unwrap();
    harness
        .service
        .add_observation(&harness.actor, item.id, "supplier called")
        .await
        .unwrap();

    let listed = harness
        .service
        .list_items(&harness.actor, &ListFilter::all())
        .await
        .unwrap();
    assert_eq!(listed[0].derived.latched.revised_deadline, Some(deadline));
    assert_eq!(listed[0].derived.current_status, "in_progress");
}

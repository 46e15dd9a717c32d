use super::*;
use shared::{
    domain::{Category, PatronId, Status},
    lifecycle::TransitionKind,
};

fn patron(name: &str) -> PatronId {
    PatronId::new(name).expect("patron")
}

fn book(title: &str, category: Category, branch: &str) -> Item {
    Item::new(ItemId::random(), title, category, Some(branch.into())).expect("item")
}

/// Four books whose statuses are `[AVAILABLE, ON_HOLD, CHECKED_OUT, AVAILABLE]`.
fn seeded_store() -> (CatalogueStore, Vec<ItemId>) {
    let items = vec![
        book("Codebase Onboarding", Category::Circulating, "Main Library"),
        book("Migrations", Category::Restricted, "Tech Branch").with_state(ItemState::OnHold {
            patron: patron("John Doe"),
            until: None,
        }),
        book("Unit Testing", Category::Circulating, "Downtown Branch").with_state(
            ItemState::CheckedOut {
                patron: patron("Jane Smith"),
            },
        ),
        book("Documentation", Category::Circulating, "Main Library"),
    ];
    let ids = items.iter().map(Item::id).collect();
    let store = CatalogueStore::from_items(items).expect("store");
    (store, ids)
}

fn ids_of(items: &[Item]) -> Vec<ItemId> {
    items.iter().map(Item::id).collect()
}

#[test]
fn empty_filter_returns_everything_in_insertion_order() {
    let (store, ids) = seeded_store();
    assert_eq!(ids_of(&store.query(&ItemFilter::default())), ids);
    assert_eq!(ids_of(&store.snapshot()), ids);
}

#[test]
fn status_filter_keeps_relative_order() {
    let (store, ids) = seeded_store();
    let available = store.query(&ItemFilter::new().with_status(Status::Available));
    assert_eq!(ids_of(&available), vec![ids[0], ids[3]]);
}

#[test]
fn text_filter_is_case_insensitive_substring() {
    let (store, ids) = seeded_store();
    let hits = store.query(&ItemFilter::new().with_text("TEST"));
    assert_eq!(ids_of(&hits), vec![ids[2]]);

    let blank = store.query(&ItemFilter::new().with_text("   "));
    assert_eq!(blank.len(), 4);
}

#[test]
fn text_filter_keeps_surrounding_whitespace() {
    let (store, ids) = seeded_store();
    let community = store
        .insert(book("Community Outreach", Category::Circulating, "Main Library"))
        .expect("insert");

    let word = store.query(&ItemFilter::new().with_text("unit "));
    assert_eq!(ids_of(&word), vec![ids[2]]);

    let fragment = store.query(&ItemFilter::new().with_text("unit"));
    assert_eq!(ids_of(&fragment), vec![ids[2], community]);
}

#[test]
fn predicates_are_combined_with_and() {
    let (store, ids) = seeded_store();
    let filter = ItemFilter::new()
        .with_category(Category::Circulating)
        .with_branch("Main Library")
        .with_text("o");
    assert_eq!(ids_of(&store.query(&filter)), vec![ids[0], ids[3]]);

    let none = store.query(
        &ItemFilter::new()
            .with_status(Status::OnHold)
            .with_category(Category::Circulating),
    );
    assert!(none.is_empty());
}

#[test]
fn query_results_are_independent_copies() {
    let (store, ids) = seeded_store();
    let before = store.query(&ItemFilter::default());

    store
        .apply_transition(ids[0], &Transition::hold(patron("Jane")))
        .expect("hold");

    assert_eq!(before[0].status(), Status::Available);
    assert_eq!(store.get(ids[0]).expect("item").status(), Status::OnHold);
}

#[test]
fn hold_then_conflicting_checkout_leaves_item_untouched() {
    let (store, ids) = seeded_store();
    let id = ids[0];

    let held = store
        .apply_transition(id, &Transition::hold(patron("Jane")))
        .expect("hold");
    assert_eq!(held.status(), Status::OnHold);
    assert_eq!(held.current_patron(), Some(&patron("Jane")));

    let err = store
        .apply_transition(id, &Transition::checkout(patron("John")))
        .expect_err("conflict");
    assert!(matches!(err, CatalogueError::Conflict { .. }));

    assert_eq!(store.get(id).expect("item"), held);
}

#[test]
fn failed_transition_changes_nothing() {
    let (store, ids) = seeded_store();
    let before = store.snapshot();

    let err = store
        .apply_transition(ids[3], &Transition::checkout(patron("Jane")))
        .expect_err("no hold");
    assert_eq!(
        err,
        CatalogueError::InvalidTransition {
            item: ids[3],
            from: Status::Available,
            kind: TransitionKind::Checkout,
        }
    );
    assert_eq!(store.snapshot(), before);
}

#[test]
fn unknown_item_is_not_found() {
    let (store, _) = seeded_store();
    let missing = ItemId::random();
    let err = store
        .apply_transition(missing, &Transition::CancelHold)
        .expect_err("missing");
    assert_eq!(err, CatalogueError::NotFound(missing));
}

#[test]
fn transition_touches_only_the_target_item() {
    let (store, ids) = seeded_store();
    let before = store.snapshot();

    store
        .apply_transition(ids[1], &Transition::CancelHold)
        .expect("cancel");

    let after = store.snapshot();
    for (index, (old, new)) in before.iter().zip(&after).enumerate() {
        if index == 1 {
            assert_eq!(new.status(), Status::Available);
            assert_eq!(new.version(), old.version() + 1);
        } else {
            assert_eq!(old, new);
        }
    }
}

#[test]
fn patron_invariant_holds_after_every_transition() {
    let (store, ids) = seeded_store();
    let script = [
        (ids[0], Transition::hold(patron("Jane"))),
        (ids[0], Transition::checkout(patron("Jane"))),
        (ids[1], Transition::checkout(patron("John Doe"))),
        (ids[2], Transition::return_to("Main Library")),
        (ids[3], Transition::Return { branch: None }),
        (ids[0], Transition::Return { branch: None }),
        (ids[2], Transition::hold(patron("Ann"))),
        (
            ids[2],
            Transition::ExpireHold {
                now: "2026-10-19T12:00:00Z".parse().expect("now"),
            },
        ),
    ];

    for (id, transition) in script {
        let _ = store.apply_transition(id, &transition);
        for item in store.snapshot() {
            let expects_patron = matches!(item.status(), Status::OnHold | Status::CheckedOut);
            assert_eq!(item.current_patron().is_some(), expects_patron, "{item:?}");
        }
    }
}

#[test]
fn rejects_duplicate_ids() {
    let item = book("Codebase Onboarding", Category::Circulating, "Main Library");
    let err = CatalogueStore::from_items([item.clone(), item]).expect_err("duplicate");
    assert!(matches!(err, CatalogueError::Validation(_)));

    let (store, ids) = seeded_store();
    let existing = store.get(ids[0]).expect("item");
    assert!(store.insert(existing).is_err());
    assert_eq!(store.len(), 4);
}

#[test]
fn expire_holds_releases_only_overdue_holds() {
    let now: DateTime<Utc> = "2026-10-19T12:00:00Z".parse().expect("now");
    let overdue = book("Migrations", Category::Restricted, "Tech Branch").with_state(
        ItemState::OnHold {
            patron: patron("John Doe"),
            until: Some(now - chrono::Duration::hours(1)),
        },
    );
    let current = book("Refactoring", Category::Circulating, "Main Library").with_state(
        ItemState::OnHold {
            patron: patron("Jane"),
            until: Some(now + chrono::Duration::hours(1)),
        },
    );
    let open_ended = book("Patterns", Category::Circulating, "Main Library").with_state(
        ItemState::OnHold {
            patron: patron("Ann"),
            until: None,
        },
    );
    let overdue_id = overdue.id();
    let store = CatalogueStore::from_items([overdue, current, open_ended]).expect("store");

    assert_eq!(store.expire_holds(now), vec![overdue_id]);
    assert_eq!(store.get(overdue_id).expect("item").status(), Status::Available);
    assert_eq!(
        store.query(&ItemFilter::new().with_status(Status::OnHold)).len(),
        2
    );
    assert!(store.expire_holds(now).is_empty());
}

#[test]
fn direct_expire_of_a_hold_not_yet_due_is_rejected() {
    let now: DateTime<Utc> = "2026-10-19T12:00:00Z".parse().expect("now");
    let (store, ids) = seeded_store();
    store
        .apply_transition(
            ids[0],
            &Transition::hold_until(patron("Jane"), now + chrono::Duration::days(7)),
        )
        .expect("hold");
    let before = store.get(ids[0]).expect("item");

    let err = store
        .apply_transition(ids[0], &Transition::ExpireHold { now })
        .expect_err("due in a week");
    assert_eq!(
        err,
        CatalogueError::InvalidTransition {
            item: ids[0],
            from: Status::OnHold,
            kind: TransitionKind::ExpireHold,
        }
    );
    assert_eq!(store.get(ids[0]).expect("item"), before);
}

#[test]
fn fresh_hold_placed_after_cancel_is_not_expired() {
    let now: DateTime<Utc> = "2026-10-19T12:00:00Z".parse().expect("now");
    let overdue = book("Migrations", Category::Restricted, "Tech Branch").with_state(
        ItemState::OnHold {
            patron: patron("John Doe"),
            until: Some(now - chrono::Duration::hours(1)),
        },
    );
    let id = overdue.id();
    let store = CatalogueStore::from_items([overdue]).expect("store");

    // A sweep that saw the overdue hold must not release its replacement.
    store
        .apply_transition(id, &Transition::CancelHold)
        .expect("cancel");
    let fresh = store
        .apply_transition(
            id,
            &Transition::hold_until(patron("Ann"), now + chrono::Duration::days(7)),
        )
        .expect("fresh hold");
    assert!(store
        .apply_transition(id, &Transition::ExpireHold { now })
        .is_err());

    assert!(store.expire_holds(now).is_empty());
    assert_eq!(store.get(id).expect("item"), fresh);
    assert_eq!(fresh.current_patron(), Some(&patron("Ann")));
}

#[tokio::test]
async fn events_follow_version_order() {
    let (store, ids) = seeded_store();
    let mut events = store.subscribe();

    store
        .apply_transition(ids[0], &Transition::hold(patron("Jane")))
        .expect("hold");
    store
        .apply_transition(ids[0], &Transition::checkout(patron("Jane")))
        .expect("checkout");
    store
        .apply_transition(ids[0], &Transition::Return { branch: None })
        .expect("return");

    let mut versions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CatalogueEvent::TransitionApplied { item, .. } = event {
            versions.push(item.version());
        }
    }
    assert_eq!(versions, vec![1, 2, 3]);
}

#[tokio::test]
async fn publishes_applied_transitions() {
    let (store, ids) = seeded_store();
    let mut events = store.subscribe();

    store
        .apply_transition(ids[2], &Transition::return_to("Main Library"))
        .expect("return");

    match events.recv().await.expect("event") {
        CatalogueEvent::TransitionApplied {
            item, kind, from, ..
        } => {
            assert_eq!(item.id(), ids[2]);
            assert_eq!(item.current_branch(), Some("Main Library"));
            assert_eq!(kind, TransitionKind::Return);
            assert_eq!(from, Status::CheckedOut);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn publishes_duplicate_hold_from_another_patron() {
    let (store, ids) = seeded_store();
    let mut events = store.subscribe();

    let err = store
        .apply_transition(ids[1], &Transition::hold(patron("Jane")))
        .expect_err("already on hold");
    assert!(matches!(err, CatalogueError::InvalidTransition { .. }));

    match events.recv().await.expect("event") {
        CatalogueEvent::DuplicateHoldFound {
            item_id,
            held_by,
            requested_by,
            ..
        } => {
            assert_eq!(item_id, ids[1]);
            assert_eq!(held_by, patron("John Doe"));
            assert_eq!(requested_by, patron("Jane"));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // The same patron asking again is just rejected.
    store
        .apply_transition(ids[1], &Transition::hold(patron("John Doe")))
        .expect_err("already on hold");
    assert!(events.try_recv().is_err());
}

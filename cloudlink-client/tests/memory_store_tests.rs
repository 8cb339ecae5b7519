use cloudlink_client::{ClientError, EntityStore, InMemoryEntityStore, ManualClock};
use cloudlink_model::Entity;
use cloudlink_query::{CloudQuery, Filter, Order, Scope};
use cloudlink_types::Timestamp;
use std::sync::Arc;

fn store_at(millis: i64) -> (InMemoryEntityStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(millis)));
    (InMemoryEntityStore::with_clock(clock.clone()), clock)
}

fn guestbook(message: &str) -> Entity {
    Entity::new("Guestbook").unwrap().with("message", message)
}

// ── Writes ───────────────────────────────────────────────────────

#[tokio::test]
async fn insert_assigns_id_and_timestamps() {
    let (store, _) = store_at(1_000);
    let stored = store.insert(guestbook("hi"), None).await.unwrap();
    assert!(stored.is_persisted());
    assert_eq!(stored.created_at, Some(Timestamp::from_millis(1_000)));
    assert_eq!(stored.updated_at, stored.created_at);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn update_keeps_creation_time() {
    let (store, clock) = store_at(1_000);
    let mut stored = store.insert(guestbook("hi"), None).await.unwrap();
    clock.advance(500);
    stored.insert("message", "edited");
    let updated = store.update(stored, None).await.unwrap();
    assert_eq!(updated.created_at, Some(Timestamp::from_millis(1_000)));
    assert_eq!(updated.updated_at, Some(Timestamp::from_millis(1_500)));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn update_of_unknown_entity_is_not_found() {
    let (store, _) = store_at(0);
    let mut ghost = guestbook("boo");
    ghost.id = Some("ghost".into());
    let err = store.update(ghost, None).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn delete_all_skips_missing_ids() {
    let (store, _) = store_at(0);
    let a = store.insert(guestbook("a"), None).await.unwrap();
    store.insert(guestbook("b"), None).await.unwrap();
    store
        .delete_all("Guestbook", &[a.id.unwrap(), "missing".to_string()], None)
        .await
        .unwrap();
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn injected_failure_hits_only_next_call() {
    let (store, _) = store_at(0);
    store.fail_next("offline");
    let err = store.insert(guestbook("a"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "remote I/O error: offline");
    store.insert(guestbook("a"), None).await.unwrap();
}

// ── Queries ──────────────────────────────────────────────────────

#[tokio::test]
async fn sort_puts_missing_property_last() {
    let (store, _) = store_at(0);
    store.insert(guestbook("no stars"), None).await.unwrap();
    store
        .insert(guestbook("two").with("stars", 2i64), None)
        .await
        .unwrap();
    store
        .insert(guestbook("five").with("stars", 5i64), None)
        .await
        .unwrap();

    for order in [Order::Asc, Order::Desc] {
        let query = CloudQuery::new("Guestbook")
            .unwrap()
            .with_sort("stars", order);
        let results = store.list(&query, None).await.unwrap();
        let messages: Vec<_> = results.iter().filter_map(|e| e.get_str("message")).collect();
        match order {
            Order::Asc => assert_eq!(messages, vec!["two", "five", "no stars"]),
            Order::Desc => assert_eq!(messages, vec!["five", "two", "no stars"]),
        }
    }
}

#[tokio::test]
async fn filter_and_limit_apply() {
    let (store, clock) = store_at(0);
    for n in 0..5i64 {
        clock.advance(10);
        store
            .insert(guestbook("m").with("n", n).with("public", n % 2 == 0), None)
            .await
            .unwrap();
    }
    let query = CloudQuery::new("Guestbook")
        .unwrap()
        .with_filter(Filter::eq("public", true))
        .unwrap()
        .with_sort("_createdAt", Order::Desc)
        .with_limit(2);
    let results = store.list(&query, None).await.unwrap();
    let ns: Vec<_> = results.iter().filter_map(|e| e.get_i64("n")).collect();
    assert_eq!(ns, vec![4, 2]);
}

#[tokio::test]
async fn future_scope_returns_nothing_but_registers() {
    let (store, _) = store_at(0);
    store.insert(guestbook("old"), None).await.unwrap();
    let query = CloudQuery::new("Guestbook")
        .unwrap()
        .with_scope(Scope::Future);
    assert!(store.list(&query, None).await.unwrap().is_empty());
    assert_eq!(store.subscription_ids(), vec![query.query_id()]);
    assert_eq!(store.received_queries(), vec![query]);
}

// ── Notifications ────────────────────────────────────────────────

#[tokio::test]
async fn matching_write_raises_notification() {
    let (store, _) = store_at(0);
    let query = CloudQuery::new("Guestbook")
        .unwrap()
        .with_filter(Filter::eq("public", true))
        .unwrap()
        .with_scope(Scope::FutureAndPast);
    store.list(&query, None).await.unwrap();

    store.insert(guestbook("private").with("public", false), None).await.unwrap();
    assert!(store.take_notifications().is_empty());

    store.insert(guestbook("public").with("public", true), None).await.unwrap();
    let notes = store.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].query_id, query.query_id());
    assert!(store.take_notifications().is_empty());
}

#[tokio::test]
async fn subscription_expires_after_duration() {
    let (store, clock) = store_at(0);
    let query = CloudQuery::new("Guestbook")
        .unwrap()
        .with_scope(Scope::Future)
        .with_subscription_duration(60);
    store.list(&query, None).await.unwrap();

    clock.advance(59_000);
    store.insert(guestbook("in time"), None).await.unwrap();
    assert_eq!(store.take_notifications().len(), 1);

    clock.advance(1_000);
    store.insert(guestbook("too late"), None).await.unwrap();
    assert!(store.take_notifications().is_empty());
}

#[tokio::test]
async fn huge_duration_never_expires() {
    let (store, clock) = store_at(1_000);
    let query = CloudQuery::new("Guestbook")
        .unwrap()
        .with_scope(Scope::Future)
        .with_subscription_duration(u64::MAX);
    store.list(&query, None).await.unwrap();

    clock.advance(365 * 24 * 3_600 * 1_000);
    store.insert(guestbook("next year"), None).await.unwrap();
    assert_eq!(store.take_notifications().len(), 1);
}

#[tokio::test]
async fn notification_stream_receives_live_notifications() {
    let (store, _) = store_at(0);
    let mut rx = store.notification_stream();
    let query = CloudQuery::new("Guestbook")
        .unwrap()
        .with_scope(Scope::Future);
    store.list(&query, None).await.unwrap();
    store.insert(guestbook("hi"), None).await.unwrap();

    let note = rx.recv().await.unwrap();
    assert_eq!(note.query_id, query.query_id());
    assert_eq!(store.take_notifications().len(), 1);
}

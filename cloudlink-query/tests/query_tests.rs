use cloudlink_query::{CloudQuery, Filter, Order, QueryDto, QueryError, Scope};
use cloudlink_types::QueryId;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn base() -> CloudQuery {
    CloudQuery::new("Guestbook")
        .unwrap()
        .with_filter(Filter::and([Filter::eq("public", true), Filter::ge("stars", 4)]).unwrap())
        .unwrap()
        .with_sort("_createdAt", Order::Desc)
        .with_limit(50)
        .with_scope(Scope::FutureAndPast)
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_validates_kind() {
    assert!(matches!(CloudQuery::new("bad kind"), Err(QueryError::Model(_))));
    assert!(matches!(CloudQuery::new(""), Err(QueryError::Model(_))));
}

#[test]
fn with_filter_validates() {
    let query = CloudQuery::new("Guestbook").unwrap();
    assert!(matches!(
        query.with_filter(Filter::is_in("stars", Vec::<i64>::new())),
        Err(QueryError::InvalidArgument(_))
    ));
}

#[test]
fn defaults() {
    let query = CloudQuery::new("Guestbook").unwrap();
    assert_eq!(query.scope(), Scope::Past);
    assert_eq!(query.subscription_duration_secs(), 0);
    assert!(query.filter().is_none());
    assert!(query.sort().is_none());
    assert!(query.limit().is_none());
    assert!(query.registration_id().is_none());
    assert!(!query.has_explicit_query_id());
}

// ── Scope ────────────────────────────────────────────────────────

#[test]
fn continuous_iff_not_past() {
    let q = CloudQuery::new("K").unwrap();
    assert!(!q.clone().with_scope(Scope::Past).is_continuous());
    assert!(q.clone().with_scope(Scope::Future).is_continuous());
    assert!(q.with_scope(Scope::FutureAndPast).is_continuous());
}

#[test]
fn scope_wire_names() {
    assert_eq!(serde_json::to_string(&Scope::Past).unwrap(), "\"PAST\"");
    assert_eq!(serde_json::to_string(&Scope::Future).unwrap(), "\"FUTURE\"");
    assert_eq!(
        serde_json::to_string(&Scope::FutureAndPast).unwrap(),
        "\"FUTURE_AND_PAST\""
    );
}

// ── Identity ─────────────────────────────────────────────────────

#[test]
fn identical_queries_share_identity() {
    assert_eq!(base().query_id(), base().query_id());
}

#[test]
fn derived_id_is_sixteen_url_safe_chars() {
    let id = base().query_id();
    assert_eq!(id.as_str().len(), 16);
    assert!(
        id.as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
}

#[test]
fn each_field_changes_identity() {
    let id = base().query_id();
    let variants = [
        base().with_limit(51),
        base().with_scope(Scope::Future),
        base().with_sort("_createdAt", Order::Asc),
        base().with_sort("stars", Order::Desc),
        base().with_subscription_duration(60),
        base()
            .with_filter(Filter::and([Filter::eq("public", true), Filter::ge("stars", 5)]).unwrap())
            .unwrap(),
    ];
    for variant in variants {
        assert_ne!(variant.query_id(), id, "{variant} collided");
    }
}

#[test]
fn operand_order_matters() {
    let a = CloudQuery::new("K")
        .unwrap()
        .with_filter(Filter::and([Filter::eq("x", 1), Filter::eq("y", 2)]).unwrap())
        .unwrap();
    let b = CloudQuery::new("K")
        .unwrap()
        .with_filter(Filter::and([Filter::eq("y", 2), Filter::eq("x", 1)]).unwrap())
        .unwrap();
    assert_ne!(a.query_id(), b.query_id());
}

#[test]
fn registration_id_does_not_affect_identity() {
    assert_eq!(base().with_registration_id("device-1").query_id(), base().query_id());
}

#[test]
fn explicit_id_overrides_derivation() {
    let explicit = QueryId::parse("room-42").unwrap();
    let query = base().with_query_id(explicit.clone()).with_limit(7);
    assert!(query.has_explicit_query_id());
    assert_eq!(query.query_id(), explicit);
}

// ── Shadow ───────────────────────────────────────────────────────

#[test]
fn shadow_is_past_and_keeps_identity() {
    let original = base().with_registration_id("device-1");
    let shadow = original.shadow();
    assert_eq!(shadow.scope(), Scope::Past);
    assert!(!shadow.is_continuous());
    assert_eq!(shadow.query_id(), original.query_id());
    assert_eq!(shadow.filter(), original.filter());
    assert_eq!(shadow.sort(), original.sort());
    assert_eq!(shadow.limit(), original.limit());
    assert!(shadow.registration_id().is_none());
}

#[test]
fn shadow_of_shadow_is_stable() {
    let shadow = base().shadow();
    assert_eq!(shadow.shadow(), shadow);
}

// ── Wire form ────────────────────────────────────────────────────

#[test]
fn dto_field_names() {
    let json = serde_json::to_value(base().with_registration_id("reg").to_dto()).unwrap();
    assert_eq!(json["kindName"], "Guestbook");
    assert_eq!(json["sortedPropertyName"], "_createdAt");
    assert_eq!(json["sortAscending"], false);
    assert_eq!(json["limit"], 50);
    assert_eq!(json["scope"], "FUTURE_AND_PAST");
    assert_eq!(json["subscriptionDurationSec"], 0);
    assert_eq!(json["queryId"], base().query_id().as_str());
    assert_eq!(json["regId"], "reg");
    assert_eq!(json["filterDto"]["operator"], "AND");
}

#[test]
fn dto_round_trip_preserves_identity() {
    let query = base();
    let dto: QueryDto = serde_json::from_str(&serde_json::to_string(&query.to_dto()).unwrap()).unwrap();
    let decoded = CloudQuery::try_from(dto).unwrap();
    assert_eq!(decoded.query_id(), query.query_id());
    assert_eq!(decoded.filter(), query.filter());
    assert_eq!(decoded.sort(), query.sort());
    assert_eq!(decoded.scope(), query.scope());
}

#[test]
fn dto_rejects_invalid_query_id() {
    let mut dto = base().to_dto();
    dto.query_id = "a:b".to_string();
    assert!(matches!(CloudQuery::try_from(dto), Err(QueryError::Types(_))));
}

#[test]
fn display_summarizes() {
    let text = base().to_string();
    assert!(text.starts_with("Guestbook [FutureAndPast] where "));
    assert!(text.ends_with("order by _createdAt Desc limit 50"));
}

// ── Properties ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn identity_is_a_function_of_content(
        kind in "[A-Za-z_][A-Za-z0-9_]{0,12}",
        prop in "[a-z]{1,8}",
        value in any::<i64>(),
        limit in proptest::option::of(1u32..500),
    ) {
        let build = || {
            let mut q = CloudQuery::new(kind.clone())
                .unwrap()
                .with_filter(Filter::eq(prop.clone(), value))
                .unwrap()
                .with_scope(Scope::Future);
            if let Some(limit) = limit {
                q = q.with_limit(limit);
            }
            q
        };
        prop_assert_eq!(build().query_id(), build().query_id());
        prop_assert_eq!(build().shadow().query_id(), build().query_id());
    }

    #[test]
    fn different_values_give_different_ids(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let q = |v: i64| CloudQuery::new("K").unwrap().with_filter(Filter::eq("p", v)).unwrap();
        prop_assert_ne!(q(a).query_id(), q(b).query_id());
    }
}

use cloudlink_model::{Entity, Value};
use cloudlink_query::{Filter, FilterDto, FilterOp, FilterValue, QueryError};
use cloudlink_types::Timestamp;
use pretty_assertions::assert_eq;

fn guestbook() -> Entity {
    let mut entity = Entity::new("Guestbook")
        .unwrap()
        .with("message", "hello")
        .with("stars", 4)
        .with("rating", 3.5)
        .with("public", true);
    entity.created_at = Some(Timestamp::from_millis(1_000));
    entity.owner = Some("alice".to_string());
    entity
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn and_rejects_empty_list() {
    let err = Filter::and(Vec::new()).unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));
}

#[test]
fn or_rejects_empty_list() {
    assert!(matches!(
        Filter::or(std::iter::empty()),
        Err(QueryError::InvalidArgument(_))
    ));
}

#[test]
fn compare_rejects_non_comparison_operator() {
    for op in [FilterOp::In, FilterOp::And, FilterOp::Or] {
        assert!(Filter::compare(op, "stars", 1).is_err(), "{op} accepted");
    }
    assert_eq!(
        Filter::compare(FilterOp::Gt, "stars", 1).unwrap(),
        Filter::gt("stars", 1)
    );
}

#[test]
fn validate_rejects_empty_property_and_empty_in() {
    assert!(Filter::eq("", 1).validate().is_err());
    assert!(Filter::is_in("stars", Vec::<i64>::new()).validate().is_err());
    assert!(Filter::is_in("stars", [1, 2]).validate().is_ok());
}

#[test]
fn validate_descends_into_composites() {
    let nested = Filter::and([Filter::eq("a", 1), Filter::or([Filter::eq("", 2)]).unwrap()]).unwrap();
    assert!(nested.validate().is_err());
}

#[test]
fn operator_names_round_trip_through_from_str() {
    for op in [
        FilterOp::Eq,
        FilterOp::Lt,
        FilterOp::Le,
        FilterOp::Gt,
        FilterOp::Ge,
        FilterOp::Ne,
        FilterOp::In,
        FilterOp::And,
        FilterOp::Or,
    ] {
        assert_eq!(op.as_str().parse::<FilterOp>().unwrap(), op);
    }
    assert!("LIKE".parse::<FilterOp>().is_err());
}

// ── Local evaluation ─────────────────────────────────────────────

#[test]
fn comparison_operators() {
    let e = guestbook();
    assert!(Filter::eq("stars", 4).matches(&e));
    assert!(Filter::ne("stars", 5).matches(&e));
    assert!(Filter::lt("stars", 5).matches(&e));
    assert!(Filter::le("stars", 4).matches(&e));
    assert!(Filter::gt("stars", 3).matches(&e));
    assert!(Filter::ge("stars", 4).matches(&e));
    assert!(!Filter::gt("stars", 4).matches(&e));
}

#[test]
fn integers_and_floats_compare_numerically() {
    let e = guestbook();
    assert!(Filter::eq("stars", 4.0).matches(&e));
    assert!(Filter::gt("rating", 3).matches(&e));
}

#[test]
fn missing_property_matches_only_ne() {
    let e = guestbook();
    assert!(Filter::ne("absent", 1).matches(&e));
    assert!(!Filter::eq("absent", 1).matches(&e));
    assert!(!Filter::lt("absent", 1).matches(&e));
    assert!(!Filter::is_in("absent", [1]).matches(&e));
}

#[test]
fn mismatched_families_never_order() {
    let e = guestbook();
    assert!(!Filter::gt("message", 1).matches(&e));
    assert!(!Filter::lt("message", 1).matches(&e));
    assert!(Filter::ne("message", 1).matches(&e));
}

#[test]
fn in_matches_any_candidate() {
    let e = guestbook();
    assert!(Filter::is_in("stars", [1, 4, 9]).matches(&e));
    assert!(!Filter::is_in("stars", [1, 2]).matches(&e));
}

#[test]
fn reserved_properties_are_filterable() {
    let e = guestbook();
    assert!(Filter::gt("_createdAt", Timestamp::from_millis(999)).matches(&e));
    assert!(!Filter::gt("_createdAt", Timestamp::from_millis(1_000)).matches(&e));
    assert!(Filter::eq("_owner", "alice").matches(&e));
}

#[test]
fn composites() {
    let e = guestbook();
    let both = Filter::and([Filter::eq("public", true), Filter::ge("stars", 4)]).unwrap();
    let neither = Filter::and([Filter::eq("public", false), Filter::ge("stars", 4)]).unwrap();
    let either = Filter::or([Filter::eq("public", false), Filter::ge("stars", 4)]).unwrap();
    assert!(both.matches(&e));
    assert!(!neither.matches(&e));
    assert!(either.matches(&e));
}

// ── Wire encoding ────────────────────────────────────────────────

#[test]
fn leaf_dto_puts_property_name_first() {
    let dto = Filter::eq("stars", 4).to_dto();
    assert_eq!(dto.operator, FilterOp::Eq);
    assert_eq!(
        dto.values,
        Some(vec![
            FilterValue::Property("stars".to_string()),
            FilterValue::Value(Value::Integer(4)),
        ])
    );
    assert!(dto.subfilters.is_none());

    let json = serde_json::to_value(&dto).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "operator": "EQ",
            "values": ["stars", {"type": "integer", "value": 4}]
        })
    );
}

#[test]
fn in_dto_lists_all_candidates() {
    let dto = FilterDto::from(&Filter::is_in("tag", ["a", "b"]));
    let json = serde_json::to_value(&dto).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "operator": "IN",
            "values": [
                "tag",
                {"type": "string", "value": "a"},
                {"type": "string", "value": "b"}
            ]
        })
    );
}

#[test]
fn composite_dto_uses_subfilters() {
    let filter = Filter::or([Filter::eq("a", 1), Filter::lt("b", 2)]).unwrap();
    let dto = filter.to_dto();
    assert_eq!(dto.operator, FilterOp::Or);
    assert!(dto.values.is_none());
    assert_eq!(dto.subfilters.as_ref().map(Vec::len), Some(2));
    assert_eq!(Filter::try_from(dto).unwrap(), filter);
}

#[test]
fn dto_decodes_from_json() {
    let json = r#"{
        "operator": "AND",
        "subfilters": [
            {"operator": "EQ", "values": ["public", {"type": "bool", "value": true}]},
            {"operator": "IN", "values": ["stars", {"type": "integer", "value": 4}, {"type": "integer", "value": 5}]}
        ]
    }"#;
    let dto: FilterDto = serde_json::from_str(json).unwrap();
    let filter = Filter::try_from(dto).unwrap();
    assert_eq!(
        filter,
        Filter::and([Filter::eq("public", true), Filter::is_in("stars", [4, 5])]).unwrap()
    );
}

#[test]
fn dto_rejects_bad_arity() {
    let missing_value = FilterDto {
        operator: FilterOp::Eq,
        values: Some(vec![FilterValue::Property("stars".into())]),
        subfilters: None,
    };
    assert!(Filter::try_from(missing_value).is_err());

    let empty_composite = FilterDto {
        operator: FilterOp::And,
        values: None,
        subfilters: Some(Vec::new()),
    };
    assert!(Filter::try_from(empty_composite).is_err());

    let no_property = FilterDto {
        operator: FilterOp::Eq,
        values: Some(vec![FilterValue::Value(Value::Integer(1))]),
        subfilters: None,
    };
    assert!(Filter::try_from(no_property).is_err());
}

#[test]
fn dto_rejects_unknown_operator() {
    let json = r#"{"operator": "LIKE", "values": ["a", {"type": "string", "value": "x"}]}"#;
    assert!(serde_json::from_str::<FilterDto>(json).is_err());
}

// ── Display ──────────────────────────────────────────────────────

#[test]
fn display_is_readable() {
    let filter = Filter::and([Filter::eq("public", true), Filter::is_in("stars", [4, 5])]).unwrap();
    assert_eq!(filter.to_string(), "(public == true AND stars IN [4, 5])");
}

use cloudlink_types::{Error, QueryId, TopicId};
use std::collections::HashSet;
use std::str::FromStr;

// ── QueryId ───────────────────────────────────────────────────────

#[test]
fn query_id_parse_accepts_plain_string() {
    let id = QueryId::parse("recent-posts").unwrap();
    assert_eq!(id.as_str(), "recent-posts");
    assert_eq!(id.to_string(), "recent-posts");
}

#[test]
fn query_id_parse_rejects_empty() {
    assert!(matches!(QueryId::parse(""), Err(Error::InvalidQueryId(_))));
}

#[test]
fn query_id_parse_rejects_colon() {
    assert!(QueryId::parse("abc:query").is_err());
}

#[test]
fn query_id_parse_rejects_whitespace() {
    assert!(QueryId::from_str("two words").is_err());
}

#[test]
fn query_id_from_digest_is_deterministic() {
    let digest = [7u8; 32];
    assert_eq!(QueryId::from_digest(&digest), QueryId::from_digest(&digest));
}

#[test]
fn query_id_from_digest_truncates_to_sixteen_chars() {
    let id = QueryId::from_digest(&[0xAB; 32]);
    // 12 bytes of base64 without padding
    assert_eq!(id.as_str().len(), 16);
    assert!(!id.as_str().contains(':'));
    assert!(!id.as_str().contains('='));
}

#[test]
fn query_id_from_digest_differs_for_different_digests() {
    let a = QueryId::from_digest(&[1u8; 32]);
    let b = QueryId::from_digest(&[2u8; 32]);
    assert_ne!(a, b);
}

#[test]
fn query_id_derived_can_be_reparsed() {
    let id = QueryId::from_digest(&[0xFF; 32]);
    assert_eq!(QueryId::parse(id.as_str()).unwrap(), id);
}

#[test]
fn query_id_hash_and_eq() {
    let mut set = HashSet::new();
    set.insert(QueryId::parse("a").unwrap());
    set.insert(QueryId::parse("a").unwrap());
    assert_eq!(set.len(), 1);
}

#[test]
fn query_id_serde_is_transparent() {
    let id = QueryId::parse("q1").unwrap();
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"q1\"");
}

// ── TopicId ───────────────────────────────────────────────────────

#[test]
fn topic_id_parse_valid() {
    let t = TopicId::parse("room-42").unwrap();
    assert_eq!(t.as_str(), "room-42");
}

#[test]
fn topic_id_rejects_spaces_and_colons() {
    assert!(matches!(TopicId::parse("room 42"), Err(Error::InvalidTopicId(_))));
    assert!(TopicId::parse("room:42").is_err());
    assert!(TopicId::parse("").is_err());
}

#[test]
fn topic_id_broadcast() {
    assert_eq!(TopicId::broadcast().as_str(), "_broadcast");
}

#[test]
fn topic_id_converts_to_query_id() {
    let t = TopicId::parse("room-42").unwrap();
    let q: QueryId = (&t).into();
    assert_eq!(q.as_str(), "room-42");
    assert_eq!(QueryId::from(t), q);
}

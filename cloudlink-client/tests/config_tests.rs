use cloudlink_client::{
    ClientConfig, ClientError, DEFAULT_MAX_CONCURRENT_CALLS, DEFAULT_MAX_MESSAGES,
    PushNotification, PushRegistrar, StaticRegistrar,
};
use cloudlink_types::QueryId;
use std::io::Write;

// ── ClientConfig ─────────────────────────────────────────────────

#[test]
fn defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.max_concurrent_calls, DEFAULT_MAX_CONCURRENT_CALLS);
    assert_eq!(config.default_max_messages, DEFAULT_MAX_MESSAGES);
    assert!(config.bookmark_path.is_none());
    config.validate().unwrap();
}

#[test]
fn json_fills_missing_fields() {
    let config = ClientConfig::from_json_str(r#"{"default_max_messages": 25}"#).unwrap();
    assert_eq!(config.default_max_messages, 25);
    assert_eq!(config.max_concurrent_calls, DEFAULT_MAX_CONCURRENT_CALLS);
}

#[test]
fn zero_limits_are_rejected() {
    let err = ClientConfig::from_json_str(r#"{"max_concurrent_calls": 0}"#).unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));
    let err = ClientConfig::from_json_str(r#"{"default_max_messages": 0}"#).unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));
}

#[test]
fn malformed_json_is_serialization_error() {
    let err = ClientConfig::from_json_str("{").unwrap_err();
    assert!(matches!(err, ClientError::Serialization(_)));
}

#[test]
fn load_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"bookmark_path": "/tmp/bookmarks.db"}}"#).unwrap();
    let config = ClientConfig::load(file.path()).unwrap();
    assert_eq!(
        config.bookmark_path.as_deref(),
        Some(std::path::Path::new("/tmp/bookmarks.db"))
    );
}

#[test]
fn load_missing_file_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClientConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ClientError::Storage(_)));
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn remote_errors_are_classified() {
    assert!(ClientError::RemoteIo("x".into()).is_remote());
    assert!(ClientError::NotFound("x".into()).is_remote());
    assert!(!ClientError::InvalidArgument("x".into()).is_remote());
    assert!(!ClientError::NoRuntime.is_remote());
}

// ── Push ─────────────────────────────────────────────────────────

#[test]
fn sub_id_round_trips() {
    let id = QueryId::parse("room-42").unwrap();
    let sub_id = PushNotification::sub_id("cloudlink", &id);
    assert_eq!(sub_id, "cloudlink:query:room-42");
    assert_eq!(
        PushNotification::from_sub_id(&sub_id),
        Some(PushNotification::new(id))
    );
}

#[test]
fn foreign_sub_ids_are_ignored() {
    assert_eq!(PushNotification::from_sub_id("cloudlink:device:abc"), None);
    assert_eq!(PushNotification::from_sub_id("cloudlink:query"), None);
    assert_eq!(PushNotification::from_sub_id("no-separators"), None);
}

#[test]
fn static_registrar_reports_its_id() {
    let registrar = StaticRegistrar("device-1".to_string());
    assert_eq!(registrar.registration_id().as_deref(), Some("device-1"));
}

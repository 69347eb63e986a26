//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to
//! disk, and loaded back with identical field values, including the JSON5
//! syntax accepted on load.

use courier_core::config::Config;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("courier.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    // Default instance id should survive the roundtrip
    assert_eq!(loaded.messenger.instance_id, config.messenger.instance_id);
    // Flag defaults should survive the roundtrip
    assert_eq!(loaded.messenger.flags, config.messenger.flags);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("courier.json5");

    let mut config = Config::default();
    config.messenger.instance_id = "work".to_string();
    config.messenger.flags.show_pending_threads = true;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.messenger.instance_id, "work");
    assert!(loaded.messenger.flags.show_pending_threads);
    // Untouched flags keep their defaults
    assert!(loaded.messenger.flags.proxy_links_by_facebook);
}

#[test]
fn test_config_accepts_json5_syntax() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("courier.json5");
    std::fs::write(
        &path,
        r#"{
            // Instance wired into the master configuration.
            messenger: {
                instance_id: "relay",
                flags: {
                    show_archived_threads: true,
                },
            },
        }"#,
    )
    .unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.messenger.instance_id, "relay");
    assert!(loaded.messenger.flags.show_archived_threads);
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/courier.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}

#[test]
fn test_config_rejects_unknown_flag() {
    let err = Config::parse(r#"{ messenger: { flags: { proxy_links: true } } }"#).unwrap_err();
    assert!(err.to_string().contains("proxy_links"));
}

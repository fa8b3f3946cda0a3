//! Integration tests for configuration parsing
//!
//! Covers the sample configurations shipped in documentation:
//! - Minimal config relying on defaults
//! - Full config with every option
//! - Invalid configuration handling

const MINIMAL_CONFIG: &str = r#"
[general]
log_level = "info"
"#;

const FULL_CONFIG: &str = r#"
[general]
log_level = "debug"

[scan]
poll_interval_ms = 250
dump_descriptors = true
skip_root_hubs = true
"#;

#[test]
fn test_parse_minimal_config() {
    let config: toml::Value = toml::from_str(MINIMAL_CONFIG).unwrap();

    let general = config.get("general").unwrap();
    assert_eq!(general.get("log_level").unwrap().as_str().unwrap(), "info");
    assert!(config.get("scan").is_none());
}

#[test]
fn test_parse_full_config() {
    let config: toml::Value = toml::from_str(FULL_CONFIG).unwrap();

    let general = config.get("general").unwrap();
    assert_eq!(general.get("log_level").unwrap().as_str().unwrap(), "debug");

    let scan = config.get("scan").unwrap();
    assert_eq!(
        scan.get("poll_interval_ms").unwrap().as_integer().unwrap(),
        250
    );
    assert!(scan.get("dump_descriptors").unwrap().as_bool().unwrap());
    assert!(scan.get("skip_root_hubs").unwrap().as_bool().unwrap());
}

#[test]
fn test_config_file_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usbtree.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let config: toml::Value = toml::from_str(&contents).unwrap();
    let scan = config.get("scan").unwrap();
    assert_eq!(
        scan.get("poll_interval_ms").unwrap().as_integer().unwrap(),
        250
    );
}

#[test]
fn test_invalid_config_rejected() {
    let unterminated = r#"
[general
log_level = "info"
"#;
    assert!(toml::from_str::<toml::Value>(unterminated).is_err());

    let duplicate_key = r#"
[scan]
poll_interval_ms = 100
poll_interval_ms = 200
"#;
    assert!(toml::from_str::<toml::Value>(duplicate_key).is_err());
}

#[test]
fn test_wrong_value_type_is_visible() {
    let config: toml::Value = toml::from_str(
        r#"
[scan]
poll_interval_ms = "fast"
"#,
    )
    .unwrap();

    let scan = config.get("scan").unwrap();
    assert!(scan.get("poll_interval_ms").unwrap().as_integer().is_none());
}

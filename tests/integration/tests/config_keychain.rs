//! Configuration file to store instance.

use std::sync::Arc;

use keysmith_core::config::LoggingConfig;
use keysmith_core::{logging, Availability, Config, Migration, Protection};
use keysmith_keychain::{GenericPassword, Keychain, KeychainSettings, MemoryBackend, Query};
use tempfile::TempDir;

const CONFIG: &str = r#"{
    // Shared with the share extension.
    store: {
        access_group: "ABCDE12345.com.example.shared",
        default_policy: {
            protection: { availability: "after-first-unlock", migration: "this-device-only" },
        },
    },
    logging: { level: "warn" },
}"#;

#[test]
fn test_config_file_builds_scoped_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keysmith.json5");
    std::fs::write(&path, CONFIG).unwrap();

    let config = Config::load(&path).unwrap();
    config.validate().unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let keychain = Keychain::from_config(backend.clone(), &config.store);
    assert_eq!(keychain.access_group(), Some("ABCDE12345.com.example.shared"));
    assert_eq!(
        keychain.settings().default_policy.protection,
        Protection::new(Availability::AfterFirstUnlock, Migration::ThisDeviceOnly)
    );

    let query = Query::<GenericPassword>::new().account("alice");
    keychain.store(&vec![1u8, 2], &query).unwrap();

    let other = Keychain::new(backend);
    assert!(!other.contains(&query).unwrap());
}

#[test]
fn test_settings_survive_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keysmith.json5");

    let config = Config::parse(CONFIG).unwrap();
    config.save(&path).unwrap();
    let reloaded = Config::load(&path).unwrap();

    let before = KeychainSettings::from(&config.store);
    let after = KeychainSettings::from(&reloaded.store);
    assert_eq!(before, after);

    let json = serde_json::to_value(&after).unwrap();
    assert_eq!(json["access_group"], "ABCDE12345.com.example.shared");
}

#[test]
fn test_logging_init_only_once() {
    let config = LoggingConfig::default();
    // The global subscriber can only be installed once per process.
    let _ = logging::init(&config);
    assert!(logging::init(&config).is_err());
}

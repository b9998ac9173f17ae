use nosql_core::config::{ENDPOINT_ENV, MASTER_KEY_ENV};
use nosql_core::{ConfigError, Endpoint, StoreConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[test]
fn loads_env_secrets_and_settings_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(
        dir.path(),
        r#"{"CosmosDataBaseId": "FamilyDatabase", "CosmosContainerId": "FamilyContainer"}"#,
    );

    let config = StoreConfig::from_sources(env(&[
        (ENDPOINT_ENV, "sqlite:///tmp/families.db"),
        (MASTER_KEY_ENV, "secret"),
    ]), &settings)
    .unwrap();

    assert_eq!(
        config.client.endpoint,
        Endpoint::File(PathBuf::from("/tmp/families.db"))
    );
    assert_eq!(config.client.master_key, "secret");
    assert_eq!(config.database_id, "FamilyDatabase");
    assert_eq!(config.container_id, "FamilyContainer");
}

#[test]
fn unknown_settings_keys_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(
        dir.path(),
        r#"{"CosmosDataBaseId": "db", "CosmosContainerId": "c", "PartitionKeyPath": "/address/state"}"#,
    );

    let config = StoreConfig::from_sources(
        env(&[(ENDPOINT_ENV, "memory:"), (MASTER_KEY_ENV, "secret")]),
        &settings,
    )
    .unwrap();
    assert_eq!(config.database_id, "db");
    assert_eq!(config.client.endpoint, Endpoint::Memory);
}

#[test]
fn missing_or_blank_env_values_fail_before_reading_settings() {
    let missing = StoreConfig::from_sources(
        env(&[(MASTER_KEY_ENV, "secret")]),
        "/nonexistent/appsettings.json",
    )
    .unwrap_err();
    assert!(matches!(missing, ConfigError::MissingEnv(name) if name == ENDPOINT_ENV));

    let blank = StoreConfig::from_sources(
        env(&[(ENDPOINT_ENV, "memory:"), (MASTER_KEY_ENV, "   ")]),
        "/nonexistent/appsettings.json",
    )
    .unwrap_err();
    assert!(matches!(blank, ConfigError::EmptyValue(name) if name == MASTER_KEY_ENV));
}

#[test]
fn settings_file_errors_are_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let secrets = [(ENDPOINT_ENV, "memory:"), (MASTER_KEY_ENV, "secret")];

    let missing_file = dir.path().join("absent.json");
    let err = StoreConfig::from_sources(env(&secrets), &missing_file).unwrap_err();
    assert!(matches!(err, ConfigError::SettingsIo { ref path, .. } if path == &missing_file));

    let broken = write_settings(dir.path(), "{ not json");
    let err = StoreConfig::from_sources(env(&secrets), &broken).unwrap_err();
    assert!(matches!(err, ConfigError::SettingsParse { .. }));

    let partial = write_settings(dir.path(), r#"{"CosmosDataBaseId": "db"}"#);
    let err = StoreConfig::from_sources(env(&secrets), &partial).unwrap_err();
    assert!(matches!(err, ConfigError::MissingSetting("CosmosContainerId")));
}

#[test]
fn remote_endpoint_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(
        dir.path(),
        r#"{"CosmosDataBaseId": "db", "CosmosContainerId": "c"}"#,
    );
    let err = StoreConfig::from_sources(
        env(&[
            (ENDPOINT_ENV, "https://account.documents.azure.com:443/"),
            (MASTER_KEY_ENV, "secret"),
        ]),
        &settings,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |name| values.get(name).cloned()
}

fn write_settings(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("appsettings.json");
    std::fs::write(&path, contents).unwrap();
    path
}

//! Tests for bootstrap config resolution and secret lookup
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate CADENCE_* variables are marked with #[serial].

use cadence_common::config::{
    is_valid_key, load_toml_config, resolve_config_path, resolve_secret, LoggingConfig,
    SecretSource, ServerConfig,
};
use cadence_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct SampleConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    logging: LoggingConfig,
    api_key: Option<String>,
}

#[test]
#[serial]
fn test_cli_path_overrides_env() {
    env::set_var("CADENCE_TEST_CONFIG", "/tmp/from-env.toml");

    let path = resolve_config_path(
        Some(Path::new("/tmp/from-cli.toml")),
        "CADENCE_TEST_CONFIG",
        "cadence.toml",
    );
    assert_eq!(path, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var("CADENCE_TEST_CONFIG");
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    env::set_var("CADENCE_TEST_CONFIG", "/tmp/from-env.toml");

    let path = resolve_config_path(None, "CADENCE_TEST_CONFIG", "cadence.toml");
    assert_eq!(path, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var("CADENCE_TEST_CONFIG");
}

#[test]
fn test_missing_path_yields_defaults() {
    let config: SampleConfig = load_toml_config(None).unwrap();
    assert_eq!(config.server.port, 5725);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.logging.level, "info");
    assert!(config.api_key.is_none());
}

#[test]
fn test_partial_toml_keeps_section_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadence.toml");
    std::fs::write(&path, "api_key = \"abc\"\n[server]\nport = 8080\n").unwrap();

    let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.api_key.as_deref(), Some("abc"));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");

    let result: Result<SampleConfig, Error> = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadence.toml");
    std::fs::write(&path, "[server\nport = ").unwrap();

    let result: Result<SampleConfig, Error> = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_secret_env_overrides_toml() {
    env::set_var("CADENCE_TEST_SECRET", "env-key");

    let secret = resolve_secret("Test key", "CADENCE_TEST_SECRET", Some("toml-key")).unwrap();
    assert_eq!(secret.value, "env-key");
    assert_eq!(secret.source, SecretSource::Environment);

    env::remove_var("CADENCE_TEST_SECRET");
}

#[test]
#[serial]
fn test_secret_falls_back_to_toml() {
    env::remove_var("CADENCE_TEST_SECRET");

    let secret = resolve_secret("Test key", "CADENCE_TEST_SECRET", Some("toml-key")).unwrap();
    assert_eq!(secret.value, "toml-key");
    assert_eq!(secret.source, SecretSource::Toml);
}

#[test]
#[serial]
fn test_whitespace_secrets_are_ignored() {
    env::set_var("CADENCE_TEST_SECRET", "   ");

    assert!(resolve_secret("Test key", "CADENCE_TEST_SECRET", Some("")).is_none());

    env::remove_var("CADENCE_TEST_SECRET");
}

#[test]
fn test_is_valid_key() {
    assert!(is_valid_key("abc"));
    assert!(!is_valid_key(""));
    assert!(!is_valid_key(" \t\n"));
}

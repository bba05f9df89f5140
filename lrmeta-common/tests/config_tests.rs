//! Configuration resolution tests
//!
//! Tests touching `LRMETA_*` variables are marked `#[serial]` so they never
//! run in parallel with each other.

use lrmeta_common::config::{load_toml_file, ConfigLoader, TomlConfig};
use lrmeta_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    for var in [
        "LRMETA_CONFIG",
        "LRMETA_METADATA_DIR",
        "LRMETA_STATIC_DIR",
        "LRMETA_PORT",
        "LRMETA_NO_CACHE",
        "LRMETA_SLACK_WEBHOOK",
    ] {
        env::remove_var(var);
    }
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let config = load_toml_file(&temp.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env_path() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let explicit = temp.path().join("explicit.toml");
    let from_env = temp.path().join("env.toml");
    std::fs::write(&explicit, "port = 7001\n").unwrap();
    std::fs::write(&from_env, "port = 7002\n").unwrap();
    env::set_var("LRMETA_CONFIG", &from_env);

    let config = ConfigLoader::new(Some(explicit)).load().unwrap();
    assert_eq!(config.port, 7001);

    let config = ConfigLoader::new(None).load().unwrap();
    assert_eq!(config.port, 7002);

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        "metadata_dir = \"/from/file\"\nno_cache = false\nslack_webhook = \"https://file\"\n",
    )
    .unwrap();

    env::set_var("LRMETA_METADATA_DIR", "/from/env");
    env::set_var("LRMETA_NO_CACHE", "true");
    env::set_var("LRMETA_SLACK_WEBHOOK", "");

    let config = ConfigLoader::new(Some(path)).load().unwrap();
    assert_eq!(config.metadata_dir, PathBuf::from("/from/env"));
    assert!(config.no_cache);
    assert!(config.slack_webhook.is_empty());

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_is_config_error() {
    clear_env();
    let temp = TempDir::new().unwrap();
    env::set_var("LRMETA_PORT", "eighty");

    let result = ConfigLoader::new(Some(temp.path().join("none.toml"))).load();
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

//! Configuration resolution tests
//!
//! Uses serial_test to prevent environment variable race conditions.
//! Tests that manipulate BRANDLENS_CONFIG_TEST are marked with #[serial].

use brandlens_common::config::{resolve_config_path, write_atomic, ConfigSource};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

const ENV_VAR: &str = "BRANDLENS_CONFIG_TEST";

#[test]
#[serial]
fn test_environment_variable_used_without_cli_argument() {
    env::set_var(ENV_VAR, "/tmp/brandlens-from-env.toml");

    let (path, source) = resolve_config_path(None, ENV_VAR, "brandlens-config-test");

    assert_eq!(path, Some(PathBuf::from("/tmp/brandlens-from-env.toml")));
    assert_eq!(source, ConfigSource::Environment);

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_cli_argument_overrides_environment() {
    env::set_var(ENV_VAR, "/tmp/brandlens-from-env.toml");

    let cli = PathBuf::from("/tmp/brandlens-cli.toml");
    let (path, source) = resolve_config_path(Some(&cli), ENV_VAR, "brandlens-config-test");

    assert_eq!(path, Some(cli));
    assert_eq!(source, ConfigSource::CommandLine);

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_blank_environment_variable_is_ignored() {
    env::set_var(ENV_VAR, "   ");

    // App name chosen so no platform file can exist
    let (path, source) =
        resolve_config_path(None, ENV_VAR, "brandlens-config-test-nonexistent-app");

    assert_eq!(path, None);
    assert_eq!(source, ConfigSource::Defaults);

    env::remove_var(ENV_VAR);
}

#[test]
fn test_write_atomic_replaces_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("artifact.json");

    write_atomic(&path, b"{\"v\":1}").unwrap();
    write_atomic(&path, b"{\"v\":2}").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"v\":2}");
}

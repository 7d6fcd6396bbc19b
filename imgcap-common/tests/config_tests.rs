//! Tests for bootstrap configuration loading and root folder resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate IMGCAP_ROOT_FOLDER are marked with #[serial].

use imgcap_common::config::{
    ensure_directory_exists, load_bootstrap_config, load_toml_config, resolve_root_folder,
    TomlConfig, ROOT_FOLDER_ENV,
};
use imgcap_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_full_toml_file_loads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("imgcap.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/imgcap"
concurrency = 8
force = true
scripts_dir = "/opt/scripts"
python = "python3"
openai_api_key = "sk-test"
openai_model = "gpt-4o"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/imgcap")));
    assert_eq!(config.concurrency, Some(8));
    assert_eq!(config.force, Some(true));
    assert_eq!(config.python.as_deref(), Some("python3"));
    assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.openai_model.as_deref(), Some("gpt-4o"));
    assert_eq!(config.openai_base_url, None);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("imgcap.toml");
    std::fs::write(&path, "concurrency = \"lots\"").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_missing_config_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.toml");

    let result = load_bootstrap_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_config_is_used() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    std::fs::write(&path, "concurrency = 2").unwrap();

    let config = load_bootstrap_config(Some(&path)).unwrap();
    assert_eq!(config.concurrency, Some(2));
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/imgcap-env");
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/imgcap-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some(Path::new("/tmp/imgcap-cli")), &toml_config);
    assert_eq!(root, PathBuf::from("/tmp/imgcap-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/imgcap-env");
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/imgcap-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, &toml_config);
    assert_eq!(root, PathBuf::from("/tmp/imgcap-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/imgcap-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, &toml_config);
    assert_eq!(root, PathBuf::from("/tmp/imgcap-toml"));
}

#[test]
#[serial]
fn test_falls_back_to_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = resolve_root_folder(None, &TomlConfig::default());
    assert_eq!(root, imgcap_common::config::default_root_folder());
}

#[test]
fn test_ensure_directory_creates_nested() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("a").join("b").join("images");

    ensure_directory_exists(&nested).unwrap();
    assert!(nested.is_dir());

    // Second call is a no-op
    ensure_directory_exists(&nested).unwrap();
}

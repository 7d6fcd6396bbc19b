//! Bootstrap configuration loading and root folder resolution
//!
//! Configuration sources, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file (`imgcap.toml`)
//! 4. OS-dependent compiled default
//!
//! Command-line and environment handling belong to the binaries; this module
//! covers the TOML file and the compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "IMGCAP_ROOT_FOLDER";

/// File name of the bootstrap configuration
pub const CONFIG_FILE_NAME: &str = "imgcap.toml";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; anything left out falls back to the
/// command-line/environment value or the compiled default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Root folder for cached assets and reports
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Number of rows processed concurrently
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Recompute every field even when already populated
    #[serde(default)]
    pub force: Option<bool>,

    /// Directory holding downloaded images (defaults to `<root_folder>/images`)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Directory holding the caption/OCR/OCR-QA scripts
    #[serde(default)]
    pub scripts_dir: Option<PathBuf>,

    /// Python interpreter used to run the provider scripts
    #[serde(default)]
    pub python: Option<String>,

    /// Credential for the arbitration model
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Arbitration model name
    #[serde(default)]
    pub openai_model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default)]
    pub openai_base_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log filter directive (trace, debug, info, warn, error or a full
    /// `EnvFilter` expression)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the bootstrap configuration
///
/// An explicit path must exist. Without one, the per-user config file is
/// used when present; a missing file yields defaults and a warning.
pub fn load_bootstrap_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        info!("Loading config from {}", path.display());
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        _ => {
            warn!("No {} found, using built-in defaults", CONFIG_FILE_NAME);
            Ok(TomlConfig::default())
        }
    }
}

/// Per-user config file location (`~/.config/imgcap/imgcap.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("imgcap").join(CONFIG_FILE_NAME))
}

/// Resolve the root folder: CLI → ENV → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    // ~/.local/share/imgcap, ~/Library/Application Support/imgcap, %LOCALAPPDATA%\imgcap
    dirs::data_local_dir()
        .map(|d| d.join("imgcap"))
        .unwrap_or_else(|| PathBuf::from("./imgcap_data"))
}

/// Create a directory (and parents) if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory {}", path.display());
    }
    Ok(())
}

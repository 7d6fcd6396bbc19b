//! Enrichment run configuration
//!
//! Resolves every setting from, highest priority first: command-line flag or
//! its environment variable (both handled by clap in `main`), the TOML
//! bootstrap file, then the compiled default. The resolved [`EnrichConfig`] is
//! passed into the orchestrator and batch runner constructors.

use crate::services::arbitration_client::{
    ArbitrationConfig, DEFAULT_ARBITRATION_TIMEOUT, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};
use crate::services::signal_providers::ProviderConfig;
use imgcap_common::config::TomlConfig;
use imgcap_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_PYTHON: &str = "python";

/// Environment variables consulted for the arbitration credential, in
/// priority order
pub const API_KEY_ENV_VARS: &[&str] = &["IMGCAP_OPENAI_API_KEY", "OPENAI_API_KEY"];

/// Values supplied on the command line (or their environment variables)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub force: bool,
    pub concurrency: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub scripts_dir: Option<PathBuf>,
    pub python: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Recompute every field even when already populated
    pub force: bool,
    /// Rows processed concurrently (at least 1)
    pub concurrency: usize,
    /// Shared image cache directory
    pub cache_dir: PathBuf,
    pub providers: ProviderConfig,
    /// `None` when no credential is configured
    pub arbitration: Option<ArbitrationConfig>,
}

impl EnrichConfig {
    /// Merge overrides, TOML and defaults
    pub fn resolve(
        overrides: &ConfigOverrides,
        toml_config: &TomlConfig,
        root_folder: &Path,
    ) -> Result<Self> {
        let concurrency = overrides
            .concurrency
            .or(toml_config.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(Error::InvalidInput(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let force = overrides.force || toml_config.force.unwrap_or(false);

        let cache_dir = overrides
            .cache_dir
            .clone()
            .or_else(|| toml_config.cache_dir.clone())
            .unwrap_or_else(|| root_folder.join("images"));

        let scripts_dir = overrides
            .scripts_dir
            .clone()
            .or_else(|| toml_config.scripts_dir.clone())
            .unwrap_or_else(|| root_folder.join("scripts"));

        let python = overrides
            .python
            .clone()
            .or_else(|| toml_config.python.clone())
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string());

        let arbitration = resolve_openai_api_key(toml_config).map(|api_key| ArbitrationConfig {
            api_key,
            base_url: overrides
                .openai_base_url
                .clone()
                .or_else(|| toml_config.openai_base_url.clone())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: overrides
                .openai_model
                .clone()
                .or_else(|| toml_config.openai_model.clone())
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            timeout: DEFAULT_ARBITRATION_TIMEOUT,
        });

        if arbitration.is_none() {
            info!("No OpenAI API key configured, arbitration disabled");
        }

        Ok(Self {
            force,
            concurrency,
            cache_dir,
            providers: ProviderConfig::from_scripts_dir(python, &scripts_dir),
            arbitration,
        })
    }
}

/// Resolve the arbitration credential: ENV → TOML
///
/// Warns when more than one source holds a valid key; the highest-priority
/// one wins.
pub fn resolve_openai_api_key(toml_config: &TomlConfig) -> Option<String> {
    let mut candidates: Vec<(&str, String)> = API_KEY_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok().map(|key| (*var, key)))
        .filter(|(_, key)| is_valid_key(key))
        .collect();

    if let Some(key) = toml_config.openai_api_key.as_ref() {
        if is_valid_key(key) {
            candidates.push(("TOML", key.clone()));
        }
    }

    if candidates.len() > 1 {
        let sources: Vec<&str> = candidates.iter().map(|(source, _)| *source).collect();
        warn!(
            "OpenAI API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let (source, key) = candidates.into_iter().next()?;
    info!("OpenAI API key loaded from {}", source);
    Some(key.trim().to_string())
}

/// Non-empty after trimming
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

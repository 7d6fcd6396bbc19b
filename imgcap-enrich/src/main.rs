//! imgcap-enrich - image caption enrichment CLI
//!
//! `run` enriches a CSV of image URLs and writes `<input>.out.<ext>`;
//! `fetch` only downloads the images into the cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imgcap_common::config::{
    ensure_directory_exists, load_bootstrap_config, resolve_root_folder, TomlConfig,
};
use imgcap_enrich::config::{ConfigOverrides, EnrichConfig};
use imgcap_enrich::services::{HttpAssetResolver, RowIngestor};
use imgcap_enrich::workflow::prefetch_assets;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for imgcap-enrich
#[derive(Parser, Debug)]
#[command(name = "imgcap-enrich")]
#[command(about = "Enrich a CSV of image URLs with captions, OCR and a final caption")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file (default: per-user imgcap.toml)
    #[arg(long, env = "IMGCAP_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the image cache and scripts
    #[arg(long, env = "IMGCAP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enrich every row and write the output CSV
    Run {
        /// Input CSV with at least a URL column
        csv: PathBuf,

        /// Recompute every field, including finalized rows
        #[arg(long, env = "IMGCAP_FORCE")]
        force: bool,

        /// Rows processed concurrently
        #[arg(long, env = "IMGCAP_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Image cache directory
        #[arg(long, env = "IMGCAP_CACHE_DIR")]
        cache_dir: Option<PathBuf>,

        /// Directory holding caption.py, ocr.py and ocr-qa.py
        #[arg(long, env = "IMGCAP_SCRIPTS_DIR")]
        scripts_dir: Option<PathBuf>,

        /// Python interpreter for the provider scripts
        #[arg(long, env = "IMGCAP_PYTHON")]
        python: Option<String>,

        /// Arbitration model
        #[arg(long, env = "IMGCAP_OPENAI_MODEL")]
        openai_model: Option<String>,

        /// OpenAI-compatible API base URL
        #[arg(long, env = "IMGCAP_OPENAI_BASE_URL")]
        openai_base_url: Option<String>,
    },

    /// Download every image into the cache without running any model
    Fetch {
        /// Input CSV with at least a URL column
        csv: PathBuf,

        /// Downloads in flight at once
        #[arg(long, env = "IMGCAP_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Image cache directory
        #[arg(long, env = "IMGCAP_CACHE_DIR")]
        cache_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_bootstrap_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&toml_config);

    info!("Starting imgcap-enrich v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    info!("Root folder: {}", root_folder.display());

    match args.command {
        Command::Run {
            csv,
            force,
            concurrency,
            cache_dir,
            scripts_dir,
            python,
            openai_model,
            openai_base_url,
        } => {
            let overrides = ConfigOverrides {
                force,
                concurrency,
                cache_dir,
                scripts_dir,
                python,
                openai_model,
                openai_base_url,
            };
            let config = EnrichConfig::resolve(&overrides, &toml_config, &root_folder)?;
            ensure_directory_exists(&config.cache_dir)?;
            info!("Image cache: {}", config.cache_dir.display());

            let runner = imgcap_enrich::build_runner(&config, None)?;
            let summary = runner.run_path(&csv).await?;

            println!(
                "{} rows: {} enriched, {} carried through, {} failed, {} unparseable -> {}",
                summary.total_rows,
                summary.enriched,
                summary.carried_through,
                summary.failed,
                summary.parse_failures,
                summary.output_path.display()
            );
        }
        Command::Fetch {
            csv,
            concurrency,
            cache_dir,
        } => {
            let overrides = ConfigOverrides {
                concurrency,
                cache_dir,
                ..Default::default()
            };
            let config = EnrichConfig::resolve(&overrides, &toml_config, &root_folder)?;
            ensure_directory_exists(&config.cache_dir)?;

            let ingested = RowIngestor::read_path(&csv)
                .with_context(|| format!("Failed to read input {}", csv.display()))?;
            let resolver = HttpAssetResolver::new(&config.cache_dir)
                .context("Failed to initialize asset resolver")?;

            let summary = prefetch_assets(Arc::new(resolver), &ingested, config.concurrency).await;

            println!(
                "{} rows: {} fetched, {} failed, {} unparseable -> {}",
                summary.total_rows,
                summary.fetched,
                summary.failed,
                summary.parse_failures,
                config.cache_dir.display()
            );
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the TOML `[logging] level`
fn init_tracing(toml_config: &TomlConfig) {
    let level = toml_config.logging.level.trim();
    let default_directive = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("imgcap_enrich={level},imgcap_common={level}")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

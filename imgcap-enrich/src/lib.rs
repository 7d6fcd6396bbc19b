//! imgcap-enrich library interface
//!
//! Enriches a CSV of image URLs with captions, OCR text, pixel dimensions and
//! a heuristic image type, and settles on one final caption per row.
//! Exposes the pipeline pieces for the binary and for integration tests.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::config::EnrichConfig;
pub use crate::error::RowError;

use crate::services::{
    Arbitrator, DisabledArbitrator, HttpAssetResolver, OpenAiArbitrator, ScriptSignalProvider,
};
use crate::workflow::{BatchRunner, EnrichmentOrchestrator, EnrichEvent};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Wire the production collaborators into an orchestrator
pub fn build_orchestrator(config: &EnrichConfig) -> anyhow::Result<EnrichmentOrchestrator> {
    let resolver = HttpAssetResolver::new(&config.cache_dir)
        .context("Failed to initialize asset resolver")?;

    let arbitrator: Arc<dyn Arbitrator> = match &config.arbitration {
        Some(arbitration) => Arc::new(
            OpenAiArbitrator::new(arbitration).context("Failed to initialize arbitration client")?,
        ),
        None => Arc::new(DisabledArbitrator),
    };

    Ok(EnrichmentOrchestrator::new(
        config.force,
        Arc::new(resolver),
        Arc::new(ScriptSignalProvider::new(config.providers.clone())),
        arbitrator,
    ))
}

/// Batch runner over the production collaborators
pub fn build_runner(
    config: &EnrichConfig,
    event_tx: Option<mpsc::Sender<EnrichEvent>>,
) -> anyhow::Result<BatchRunner> {
    let orchestrator = Arc::new(build_orchestrator(config)?);
    Ok(match event_tx {
        Some(tx) => BatchRunner::with_events(orchestrator, config.concurrency, tx),
        None => BatchRunner::new(orchestrator, config.concurrency),
    })
}

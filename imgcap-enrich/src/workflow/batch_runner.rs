//! Batch runner
//!
//! Runs the orchestrator over every valid row with a fixed concurrency
//! ceiling. Each terminal outcome triggers a full rewrite of the output file,
//! so a crash loses at most the rows still in flight. Rows are written in
//! input order regardless of completion order.

use crate::models::{Ingested, Row};
use crate::services::asset_resolver::AssetResolver;
use crate::services::result_writer::{derive_failure_report_path, derive_output_path, ResultWriter};
use crate::services::row_ingestor::RowIngestor;
use crate::workflow::{EnrichEvent, EnrichmentOrchestrator, RowFailure};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Files touched by one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    pub input: PathBuf,
    /// `<input>.out.<ext>`
    pub output: PathBuf,
    /// `<input>.failures.<ext>`, only written when parse failures exist
    pub failure_report: PathBuf,
}

impl RunPaths {
    pub fn for_input(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: derive_output_path(input),
            failure_report: derive_failure_report_path(input),
        }
    }
}

/// Outcome counts of an enrichment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Input records, valid or not
    pub total_rows: usize,
    /// Records rejected at ingestion
    pub parse_failures: usize,
    /// Already finalized rows written unchanged
    pub carried_through: usize,
    /// Rows that reached `Final` this run
    pub enriched: usize,
    /// Rows dropped after a row-level error
    pub failed: usize,
    pub output_path: PathBuf,
}

/// Outcome counts of a fetch-only run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSummary {
    pub total_rows: usize,
    pub parse_failures: usize,
    pub fetched: usize,
    pub failed: usize,
}

/// Bounded-concurrency executor
pub struct BatchRunner {
    orchestrator: Arc<EnrichmentOrchestrator>,
    concurrency: usize,
    event_tx: Option<mpsc::Sender<EnrichEvent>>,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<EnrichmentOrchestrator>, concurrency: usize) -> Self {
        Self {
            orchestrator,
            concurrency: concurrency.max(1),
            event_tx: None,
        }
    }

    /// Create runner with event channel for progress reporting
    pub fn with_events(
        orchestrator: Arc<EnrichmentOrchestrator>,
        concurrency: usize,
        event_tx: mpsc::Sender<EnrichEvent>,
    ) -> Self {
        Self {
            event_tx: Some(event_tx),
            ..Self::new(orchestrator, concurrency)
        }
    }

    /// Read `input`, enrich it and write `<input>.out.<ext>`
    pub async fn run_path(&self, input: &Path) -> anyhow::Result<RunSummary> {
        let ingested = RowIngestor::read_path(input)
            .with_context(|| format!("Failed to read input {}", input.display()))?;
        self.run(ingested, &RunPaths::for_input(input)).await
    }

    /// Enrich ingested rows
    ///
    /// Only the final output write is fatal; row errors and checkpoint write
    /// errors are logged and the run continues.
    pub async fn run(&self, ingested: Ingested, paths: &RunPaths) -> anyhow::Result<RunSummary> {
        let Ingested {
            rows,
            failures,
            extra_headers,
        } = ingested;

        let mut summary = RunSummary {
            total_rows: rows.len() + failures.len(),
            parse_failures: failures.len(),
            carried_through: 0,
            enriched: 0,
            failed: 0,
            output_path: paths.output.clone(),
        };

        info!(
            input = %paths.input.display(),
            rows = rows.len(),
            parse_failures = failures.len(),
            concurrency = self.concurrency,
            force = self.orchestrator.force(),
            "Starting enrichment run"
        );

        if !failures.is_empty() {
            if let Err(e) = ResultWriter::write_failure_report(&paths.failure_report, &failures).await
            {
                warn!(error = %e, "Could not write failure report");
            }
        }

        let (pending, finalized): (Vec<Row>, Vec<Row>) = rows
            .into_iter()
            .partition(|row| self.orchestrator.needs_processing(row));

        let mut results: Vec<Row> = Vec::with_capacity(pending.len() + finalized.len());

        for row in finalized {
            info!(
                row_index = row.index,
                url = %row.normalized_url,
                "Row already has a final caption, carrying through"
            );
            self.emit_event(EnrichEvent::RowCompleted {
                row_index: row.index,
                url: row.normalized_url.clone(),
                carried_through: true,
                final_caption: row.final_caption.clone(),
            })
            .await;
            summary.carried_through += 1;
            results.push(row);
        }
        if !results.is_empty() {
            self.checkpoint(paths, &results, &extra_headers).await;
        }

        let mut outcomes = stream::iter(pending)
            .map(|row| {
                let orchestrator = self.orchestrator.clone();
                let event_tx = self.event_tx.clone();
                async move {
                    info!(row_index = row.index, url = %row.normalized_url, "Processing row");
                    if let Some(tx) = &event_tx {
                        let _ = tx
                            .send(EnrichEvent::RowStarted {
                                row_index: row.index,
                                url: row.normalized_url.clone(),
                            })
                            .await;
                    }
                    orchestrator.process(row).await
                }
            })
            .buffer_unordered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(row) => {
                    self.emit_event(EnrichEvent::RowCompleted {
                        row_index: row.index,
                        url: row.normalized_url.clone(),
                        carried_through: false,
                        final_caption: row.final_caption.clone(),
                    })
                    .await;
                    summary.enriched += 1;
                    results.push(row);
                }
                Err(failure) => {
                    self.report_failure(&failure).await;
                    summary.failed += 1;
                }
            }
            self.checkpoint(paths, &results, &extra_headers).await;
        }

        ResultWriter::write_rows(&paths.output, &results, &extra_headers)
            .await
            .with_context(|| format!("Failed to write output {}", paths.output.display()))?;

        info!(
            output = %summary.output_path.display(),
            total_rows = summary.total_rows,
            parse_failures = summary.parse_failures,
            carried_through = summary.carried_through,
            enriched = summary.enriched,
            failed = summary.failed,
            "Enrichment run complete"
        );

        self.emit_event(EnrichEvent::RunCompleted {
            summary: summary.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

        Ok(summary)
    }

    async fn checkpoint(&self, paths: &RunPaths, results: &[Row], extra_headers: &[String]) {
        match ResultWriter::write_rows(&paths.output, results, extra_headers).await {
            Ok(()) => {
                self.emit_event(EnrichEvent::CheckpointWritten {
                    path: paths.output.display().to_string(),
                    rows_written: results.len(),
                })
                .await;
            }
            Err(e) => warn!(error = %e, "Checkpoint write failed, continuing"),
        }
    }

    async fn report_failure(&self, failure: &RowFailure) {
        error!(
            row_index = failure.index,
            url = %failure.url,
            state = %failure.state,
            error = %failure.error,
            "Processing row failed, excluded from this run"
        );
        self.emit_event(EnrichEvent::RowFailed {
            row_index: failure.index,
            url: failure.url.clone(),
            state: failure.state,
            message: failure.error.to_string(),
        })
        .await;
    }

    async fn emit_event(&self, event: EnrichEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Download every valid row's asset into the cache without running providers
pub async fn prefetch_assets(
    resolver: Arc<dyn AssetResolver>,
    ingested: &Ingested,
    concurrency: usize,
) -> FetchSummary {
    let mut summary = FetchSummary {
        total_rows: ingested.total_records(),
        parse_failures: ingested.failures.len(),
        fetched: 0,
        failed: 0,
    };

    let mut outcomes = stream::iter(ingested.rows.iter())
        .map(|row| {
            let resolver = resolver.clone();
            async move { (row, resolver.resolve(&row.normalized_url).await) }
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((row, outcome)) = outcomes.next().await {
        match outcome {
            Ok(path) => {
                summary.fetched += 1;
                info!(row_index = row.index, path = %path.display(), "Asset available");
            }
            Err(e) => {
                summary.failed += 1;
                error!(row_index = row.index, url = %row.normalized_url, error = %e, "Fetch failed");
            }
        }
    }

    info!(
        total_rows = summary.total_rows,
        fetched = summary.fetched,
        failed = summary.failed,
        "Fetch complete"
    );
    summary
}

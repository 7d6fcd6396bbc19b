//! Enrichment workflow
//!
//! - **Orchestrator**: per-row state machine from `Pending` to `Final`
//! - **Batch runner**: bounded-concurrency execution with a checkpoint write
//!   after every row outcome
//!
//! Rows are independent. A row that fails at any state is logged and left out
//! of this run's output; the next run starts it over from `Pending`.

pub mod batch_runner;
pub mod orchestrator;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use batch_runner::{prefetch_assets, BatchRunner, FetchSummary, RunPaths, RunSummary};
pub use orchestrator::{EnrichmentOrchestrator, RowFailure};

/// Per-row enrichment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowState {
    /// Ingested, nothing computed this run
    Pending,
    /// Local image file available
    AssetResolved,
    /// Width/height probed (possibly unknown)
    DimensionsKnown,
    /// Caption available
    Captioned,
    /// OCR run or skipped
    OcrDecided,
    /// OCR question-answer run or skipped
    OcrQaDecided,
    /// Heuristic type assigned
    Classified,
    /// Arbitration run, skipped or fallen back
    Arbitrated,
    /// Final caption set
    Final,
}

impl RowState {
    /// Next state in the fixed sequence
    pub fn next(self) -> Option<RowState> {
        use RowState::*;
        match self {
            Pending => Some(AssetResolved),
            AssetResolved => Some(DimensionsKnown),
            DimensionsKnown => Some(Captioned),
            Captioned => Some(OcrDecided),
            OcrDecided => Some(OcrQaDecided),
            OcrQaDecided => Some(Classified),
            Classified => Some(Arbitrated),
            Arbitrated => Some(Final),
            Final => None,
        }
    }
}

impl fmt::Display for RowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress events published by the batch runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EnrichEvent {
    /// Row handed to a worker
    RowStarted {
        row_index: usize,
        url: String,
    },

    /// Row reached `Final` (or was already finalized)
    RowCompleted {
        row_index: usize,
        url: String,
        /// Already finalized, carried through without processing
        carried_through: bool,
        final_caption: String,
    },

    /// Row dropped from this run's output
    RowFailed {
        row_index: usize,
        url: String,
        /// Last state reached before the failure
        state: RowState,
        message: String,
    },

    /// Output file rewritten
    CheckpointWritten {
        path: String,
        rows_written: usize,
    },

    /// Run finished
    RunCompleted {
        summary: RunSummary,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },
}

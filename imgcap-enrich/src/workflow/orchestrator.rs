//! Enrichment orchestrator
//!
//! Drives one row through the fixed state sequence:
//!
//! ```text
//! Pending → AssetResolved → DimensionsKnown → Captioned → OcrDecided
//!         → OcrQaDecided → Classified → Arbitrated → Final
//! ```
//!
//! A field that is already populated is never recomputed unless force mode
//! is on. OCR and OCR-QA only run for text-bearing images; arbitration only
//! runs for untrustworthy captions and never fails the row.

use crate::error::RowError;
use crate::models::Row;
use crate::services::arbitration_client::{ArbitrationPayload, Arbitrator};
use crate::services::asset_resolver::AssetResolver;
use crate::services::classifier::{self, Assessment};
use crate::services::dimension_probe::probe_dimensions;
use crate::services::signal_providers::SignalProvider;
use crate::workflow::RowState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// OCR output shorter than this triggers the OCR question-answer pass
pub const SHORT_OCR_CHARS: usize = 10;

/// A row that failed partway and is excluded from this run's output
#[derive(Debug)]
pub struct RowFailure {
    pub index: usize,
    pub url: String,
    /// Last state reached before the failure
    pub state: RowState,
    pub error: RowError,
}

/// Per-row enrichment state machine
pub struct EnrichmentOrchestrator {
    force: bool,
    resolver: Arc<dyn AssetResolver>,
    providers: Arc<dyn SignalProvider>,
    arbitrator: Arc<dyn Arbitrator>,
}

impl EnrichmentOrchestrator {
    pub fn new(
        force: bool,
        resolver: Arc<dyn AssetResolver>,
        providers: Arc<dyn SignalProvider>,
        arbitrator: Arc<dyn Arbitrator>,
    ) -> Self {
        Self {
            force,
            resolver,
            providers,
            arbitrator,
        }
    }

    pub fn force(&self) -> bool {
        self.force
    }

    /// Finalized rows are carried through unless forced
    pub fn needs_processing(&self, row: &Row) -> bool {
        self.force || !row.is_finalized()
    }

    /// Run a row from `Pending` to `Final`
    pub async fn process(&self, row: Row) -> Result<Row, RowFailure> {
        if !self.needs_processing(&row) {
            debug!(row_index = row.index, url = %row.normalized_url, "Row already finalized");
            return Ok(row);
        }

        let mut state = RowState::Pending;
        let index = row.index;
        let url = row.normalized_url.clone();

        self.advance(row, &mut state)
            .await
            .map_err(|error| RowFailure {
                index,
                url,
                state,
                error,
            })
    }

    async fn advance(&self, mut row: Row, state: &mut RowState) -> Result<Row, RowError> {
        let force = self.force;

        // Pending → AssetResolved
        let file = self.resolver.resolve(&row.normalized_url).await?;
        *state = RowState::AssetResolved;

        // AssetResolved → DimensionsKnown
        if force || !row.dimensions().is_known() {
            row.set_dimensions(probe_dimensions(&file).await);
        } else {
            debug!(row_index = row.index, "Dimensions already known");
        }
        *state = RowState::DimensionsKnown;

        // DimensionsKnown → Captioned
        if force || row.caption.is_empty() {
            row.caption = self.providers.caption(&file).await?;
            info!(row_index = row.index, caption = %row.caption, "Got caption");
        } else {
            debug!(row_index = row.index, "Caption already present");
        }
        *state = RowState::Captioned;

        // Caption and dimensions are settled from here on
        let Assessment {
            classification,
            trustworthy,
            text_bearing,
        } = classifier::assess(&row.caption, row.dimensions());

        // Captioned → OcrDecided
        if !force && !row.ocr_text.is_empty() {
            debug!(row_index = row.index, "OCR already present");
        } else if text_bearing {
            row.ocr_text = self.providers.ocr(&file).await?;
            info!(row_index = row.index, ocr = %row.ocr_text, "Got OCR");
        } else {
            row.ocr_text.clear();
        }
        *state = RowState::OcrDecided;

        // OcrDecided → OcrQaDecided
        if !force && !row.ocr_qa_answer.is_empty() {
            debug!(row_index = row.index, "OCR-QA already present");
        } else if text_bearing && row.ocr_text.trim().chars().count() < SHORT_OCR_CHARS {
            row.ocr_qa_answer = self.providers.ocr_qa(&file).await?;
            info!(row_index = row.index, ocr_qa = %row.ocr_qa_answer, "Got OCR-QA");
        } else {
            row.ocr_qa_answer.clear();
        }
        *state = RowState::OcrQaDecided;

        // OcrQaDecided → Classified
        row.classification = classification;
        *state = RowState::Classified;

        // Classified → Arbitrated
        let wants_arbitration = self.arbitrator.is_enabled() && !trustworthy;
        if wants_arbitration && (force || row.arbitrated_caption.is_empty()) {
            let payload = ArbitrationPayload {
                width: row.width,
                height: row.height,
                caption: (!text_bearing).then(|| row.caption.clone()),
                ocr: row.ocr_text.clone(),
                ocr_qa: row.ocr_qa_answer.clone(),
                classification: row.classification,
            };
            match self.arbitrator.arbitrate(&payload).await {
                Ok(answer) => row.arbitrated_caption = answer,
                Err(e) => {
                    warn!(
                        row_index = row.index,
                        url = %row.normalized_url,
                        error = %e,
                        "Arbitration failed, falling back to caption"
                    );
                    row.arbitrated_caption.clear();
                }
            }
        } else if force && !wants_arbitration {
            row.arbitrated_caption.clear();
        }
        *state = RowState::Arbitrated;

        // Arbitrated → Final
        row.final_caption = if row.arbitrated_caption.is_empty() {
            row.caption.clone()
        } else {
            row.arbitrated_caption.clone()
        };
        *state = RowState::Final;

        info!(
            row_index = row.index,
            classification = %row.classification,
            final_caption = %row.final_caption,
            "Row finalized"
        );
        Ok(row)
    }
}

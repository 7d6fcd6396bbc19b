//! Image row model
//!
//! A row is created by ingestion with whatever the input already knew, then
//! filled field by field by the orchestrator. Empty text means "not yet
//! computed"; a non-empty `final_caption` marks the row as finalized.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Heuristic image type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Small square graphic
    Icon,
    /// Square graphic, or small graphic-design artwork
    Logo,
    /// Wide strip or large graphic-design artwork
    Banner,
    /// Ordinary photograph
    Photograph,
    /// None of the rules matched
    #[default]
    Unknown,
}

impl Classification {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Icon => "icon",
            Classification::Logo => "logo",
            Classification::Banner => "banner",
            Classification::Photograph => "photograph",
            Classification::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions; `0` on either side means unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an unreadable image
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Both sides were measured
    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Exactly square, with known dimensions
    pub fn is_square(&self) -> bool {
        self.is_known() && self.width == self.height
    }

    /// Longer side in pixels
    pub fn max_side(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Width divided by height, `None` when unknown
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.is_known() {
            Some(self.width as f64 / self.height as f64)
        } else {
            None
        }
    }
}

/// One image record flowing through the pipeline
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// 0-based position of the record in the input file
    pub index: usize,
    /// URL exactly as given in the input
    pub raw_url: String,
    /// Cleaned and canonicalized URL (pure function of `raw_url`)
    pub normalized_url: String,
    /// Vision model caption
    pub caption: String,
    /// OCR-extracted text
    pub ocr_text: String,
    /// Answer from the OCR question-answer pass
    pub ocr_qa_answer: String,
    /// Pixel width, 0 if unknown
    pub width: u32,
    /// Pixel height, 0 if unknown
    pub height: u32,
    /// Heuristic type label (recomputable from caption + dimensions)
    pub classification: Classification,
    /// Arbitration model output, empty when arbitration did not run
    pub arbitrated_caption: String,
    /// Authoritative caption; non-empty means finalized
    pub final_caption: String,
    /// Input columns outside the fixed schema, keyed by original header
    pub extra: Vec<(String, String)>,
}

impl Row {
    /// Create an empty row for a normalized URL
    pub fn new(index: usize, raw_url: impl Into<String>, normalized_url: impl Into<String>) -> Self {
        Self {
            index,
            raw_url: raw_url.into(),
            normalized_url: normalized_url.into(),
            ..Default::default()
        }
    }

    /// Row already carries a final caption
    pub fn is_finalized(&self) -> bool {
        !self.final_caption.is_empty()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn set_dimensions(&mut self, dimensions: Dimensions) {
        self.width = dimensions.width;
        self.height = dimensions.height;
    }

    /// Look up a passthrough column by its original header
    pub fn extra_value(&self, header: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(key, _)| key == header)
            .map(|(_, value)| value.as_str())
    }
}

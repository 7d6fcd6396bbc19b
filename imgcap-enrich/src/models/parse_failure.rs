//! Records the ingestor could not turn into rows

use super::Row;
use thiserror::Error;

/// Reasons an input record is rejected
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    /// No URL column, or the URL cell is empty
    #[error("Missing URL field")]
    MissingUrl,

    /// URL could not be normalized
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The CSV record itself could not be read
    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Input record excluded from processing but kept for reporting
#[derive(Debug, Clone)]
pub struct ParseFailure {
    /// 0-based position of the record in the input file
    pub index: usize,
    /// Raw record as (header, value) pairs, empty if unreadable
    pub record: Vec<(String, String)>,
    /// Offending URL string, when one was present
    pub url: Option<String>,
    pub error: ParseError,
}

/// Ingestion output
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    /// Valid rows in input order
    pub rows: Vec<Row>,
    /// Rejected records in input order
    pub failures: Vec<ParseFailure>,
    /// Headers outside the fixed schema, in first-seen order
    pub extra_headers: Vec<String>,
}

impl Ingested {
    /// Number of records read, valid or not
    pub fn total_records(&self) -> usize {
        self.rows.len() + self.failures.len()
    }
}

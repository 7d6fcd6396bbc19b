//! Result writer
//!
//! Serializes the row set back to CSV. Every data field is quoted and any
//! embedded `"` becomes `'`, which keeps the output compatible with earlier
//! consumers of this format. Files are written to a temporary sibling and
//! renamed, so a crash mid-write never leaves a truncated checkpoint.

use crate::models::{ParseFailure, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed output columns, extras follow in first-seen order
pub const OUTPUT_COLUMNS: &[&str] = &[
    "URL",
    "NORMALIZED_URL",
    "WIDTH",
    "HEIGHT",
    "CAPTION",
    "OCR",
    "OCR_QA",
    "GPT",
    "FINAL",
];

pub const FAILURE_REPORT_COLUMNS: &[&str] = &["ROW", "URL", "ERROR"];

/// Output errors
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// `photos.csv` → `photos.out.csv`, `photos` → `photos.out`
pub fn derive_output_path(input: &Path) -> PathBuf {
    with_suffix(input, "out")
}

/// `photos.csv` → `photos.failures.csv`
pub fn derive_failure_report_path(input: &Path) -> PathBuf {
    with_suffix(input, "failures")
}

fn with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}.{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}.{}", stem, suffix),
    };
    input.with_file_name(name)
}

/// Lossy quote substitution applied to every output value
pub fn escape_field(value: &str) -> String {
    value.replace('"', "'")
}

/// Result writer service
pub struct ResultWriter;

impl ResultWriter {
    /// Encode rows (sorted by input index) as CSV bytes
    pub fn encode_rows(rows: &[Row], extra_headers: &[String]) -> Result<Vec<u8>, WriteError> {
        let mut header: Vec<&str> = OUTPUT_COLUMNS.to_vec();
        header.extend(extra_headers.iter().map(String::as_str));

        let mut sorted: Vec<&Row> = rows.iter().collect();
        sorted.sort_by_key(|row| row.index);

        let records = sorted.into_iter().map(|row| {
            let mut record = vec![
                row.raw_url.clone(),
                row.normalized_url.clone(),
                row.width.to_string(),
                row.height.to_string(),
                row.caption.clone(),
                row.ocr_text.clone(),
                row.ocr_qa_answer.clone(),
                row.arbitrated_caption.clone(),
                row.final_caption.clone(),
            ];
            record.extend(
                extra_headers
                    .iter()
                    .map(|h| row.extra_value(h).unwrap_or("").to_string()),
            );
            record
        });

        encode(&header, records)
    }

    /// Full rewrite of the output file
    pub async fn write_rows(
        path: &Path,
        rows: &[Row],
        extra_headers: &[String],
    ) -> Result<(), WriteError> {
        let bytes = Self::encode_rows(rows, extra_headers)?;
        write_atomic(path, &bytes).await?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "Output written");
        Ok(())
    }

    /// Report of input records that never became rows
    pub async fn write_failure_report(
        path: &Path,
        failures: &[ParseFailure],
    ) -> Result<(), WriteError> {
        let records = failures.iter().map(|failure| {
            vec![
                failure.index.to_string(),
                failure.url.clone().unwrap_or_default(),
                failure.error.to_string(),
            ]
        });
        let bytes = encode(FAILURE_REPORT_COLUMNS, records)?;
        write_atomic(path, &bytes).await?;
        tracing::info!(path = %path.display(), failures = failures.len(), "Failure report written");
        Ok(())
    }
}

fn encode<H, I>(header: &[H], records: I) -> Result<Vec<u8>, WriteError>
where
    H: AsRef<str>,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut header_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    header_writer.write_record(header.iter().map(AsRef::<str>::as_ref))?;
    let buffer = header_writer
        .into_inner()
        .map_err(|e| WriteError::Csv(e.into_error().into()))?;

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(buffer);
    for record in records {
        writer.write_record(record.iter().map(|value| escape_field(value)))?;
    }
    writer
        .into_inner()
        .map_err(|e| WriteError::Csv(e.into_error().into()))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let io_error = |source| WriteError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(io_error)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(io_error)
}

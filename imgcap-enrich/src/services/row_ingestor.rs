//! Row ingestion
//!
//! Parses the input CSV into typed rows. Headers match case-insensitively;
//! columns outside the fixed schema are kept verbatim for passthrough.
//! Malformed records become [`ParseFailure`]s and never abort the read.

use crate::models::{Ingested, ParseError, ParseFailure, Row};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Fatal ingestion errors (the input as a whole is unreadable)
#[derive(Debug, Error)]
pub enum IngestError {
    /// Input file could not be opened
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Header row could not be read
    #[error("Failed to read CSV headers: {0}")]
    Headers(#[from] csv::Error),
}

/// Lower-cased headers with a dedicated row field
const KNOWN_COLUMNS: &[&str] = &[
    "url",
    "normalized_url",
    "width",
    "height",
    "caption",
    "ocr",
    "ocr_qa",
    "gpt",
    "final",
];

/// Row ingestor service
pub struct RowIngestor;

impl RowIngestor {
    /// Read and validate every record of a CSV file
    pub fn read_path(path: &Path) -> Result<Ingested, IngestError> {
        let file = std::fs::File::open(path).map_err(|source| IngestError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::read_from(file)
    }

    /// Read and validate every record from any reader
    pub fn read_from<R: Read>(reader: R) -> Result<Ingested, IngestError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut ingested = Ingested {
            extra_headers: extra_headers(&headers),
            ..Default::default()
        };

        for (index, record) in csv_reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(row_index = index, error = %e, "Unreadable CSV record");
                    ingested.failures.push(ParseFailure {
                        index,
                        record: Vec::new(),
                        url: None,
                        error: ParseError::Malformed(e.to_string()),
                    });
                    continue;
                }
            };

            let fields: Vec<(String, String)> = headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
                .collect();

            match parse_record(index, &fields, &ingested.extra_headers) {
                Ok(row) => ingested.rows.push(row),
                Err(failure) => {
                    tracing::warn!(
                        row_index = index,
                        url = failure.url.as_deref().unwrap_or(""),
                        error = %failure.error,
                        "Rejected input record"
                    );
                    ingested.failures.push(failure);
                }
            }
        }

        tracing::info!(
            rows = ingested.rows.len(),
            failures = ingested.failures.len(),
            "Input parsed"
        );

        Ok(ingested)
    }
}

/// Headers outside the fixed schema, first occurrence wins
fn extra_headers(headers: &[String]) -> Vec<String> {
    let mut extras: Vec<String> = Vec::new();
    for header in headers {
        let lower = header.to_lowercase();
        if KNOWN_COLUMNS.contains(&lower.as_str()) || header.is_empty() {
            continue;
        }
        if !extras.iter().any(|h| h.to_lowercase() == lower) {
            extras.push(header.clone());
        }
    }
    extras
}

/// First non-empty value for a case-insensitive column name
fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
        .find(|value| !value.is_empty())
}

fn parse_record(
    index: usize,
    fields: &[(String, String)],
    extra_headers: &[String],
) -> Result<Row, ParseFailure> {
    let fail = |url: Option<String>, error: ParseError| ParseFailure {
        index,
        record: fields.to_vec(),
        url,
        error,
    };

    let raw_url = match field(fields, "url") {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => return Err(fail(None, ParseError::MissingUrl)),
    };

    let normalized_url = normalize_url(&raw_url).map_err(|e| fail(Some(raw_url.clone()), e))?;

    let text = |name: &str| field(fields, name).unwrap_or("").to_string();

    let mut row = Row::new(index, raw_url, normalized_url);
    row.caption = text("caption");
    row.ocr_text = text("ocr");
    row.ocr_qa_answer = text("ocr_qa");
    row.arbitrated_caption = text("gpt");
    row.final_caption = text("final");
    row.width = parse_dimension(field(fields, "width").unwrap_or(""));
    row.height = parse_dimension(field(fields, "height").unwrap_or(""));
    row.extra = extra_headers
        .iter()
        .map(|h| (h.clone(), field(fields, h).unwrap_or("").to_string()))
        .collect();

    Ok(row)
}

/// Strip markup and quoting debris commonly pasted around image URLs
pub fn clean_url(raw: &str) -> String {
    let mut url = raw.trim().to_string();
    if url.starts_with("//") {
        url = format!("https:{}", url);
    }

    // Trailing quote run, optionally followed by " anything"
    let quote_cut = url.char_indices().find_map(|(pos, c)| {
        if !is_quote(c) {
            return None;
        }
        let after_quotes = url[pos..].trim_start_matches(is_quote);
        (after_quotes.is_empty() || after_quotes.starts_with(' ')).then_some(pos)
    });
    if let Some(pos) = quote_cut {
        url.truncate(pos);
    }

    // "…jpg>" or "…jpg><br>" from pasted HTML
    let tag_cut = url.match_indices('>').find_map(|(pos, _)| {
        let after = &url[pos + 1..];
        (after.is_empty() || after.starts_with('<') || after.starts_with(char::is_whitespace))
            .then_some(pos)
    });
    if let Some(pos) = tag_cut {
        url.truncate(pos);
    }

    url.replace("[/img]", "").replace("[/url]", "").trim().to_string()
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{2019}' | '\u{201d}')
}

/// Clean and canonicalize a URL
///
/// Pure and idempotent: normalizing an already-normalized URL returns it
/// unchanged.
pub fn normalize_url(raw: &str) -> Result<String, ParseError> {
    let cleaned = clean_url(raw);
    Url::parse(&cleaned)
        .map(|url| url.to_string())
        .map_err(|e| ParseError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a WIDTH/HEIGHT cell; anything unusable reads as 0 (unknown)
pub fn parse_dimension(value: &str) -> u32 {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return n;
    }
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 && n <= u32::MAX as f64 => n.trunc() as u32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_relative_url_gets_https() {
        assert_eq!(clean_url("//cdn.x.com/a.png"), "https://cdn.x.com/a.png");
    }

    #[test]
    fn test_trailing_quotes_and_text_removed() {
        assert_eq!(
            clean_url("https://x.com/a.jpg\" alt=\"logo\""),
            "https://x.com/a.jpg"
        );
        assert_eq!(clean_url("https://x.com/a.jpg\u{201d}"), "https://x.com/a.jpg");
        assert_eq!(
            clean_url("https://x.com/o'neil.jpg'"),
            "https://x.com/o'neil.jpg"
        );
    }

    #[test]
    fn test_forum_markup_removed() {
        assert_eq!(clean_url("https://x.com/a.jpg[/img]"), "https://x.com/a.jpg");
        assert_eq!(clean_url("https://x.com/a.jpg[/url]"), "https://x.com/a.jpg");
    }

    #[test]
    fn test_html_tail_removed() {
        assert_eq!(clean_url("https://x.com/a.jpg><br>"), "https://x.com/a.jpg");
        assert_eq!(clean_url("https://x.com/a.jpg>"), "https://x.com/a.jpg");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_url("  HTTPS://X.com/a b.jpg ").unwrap();
        let twice = normalize_url(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, "https://x.com/a%20b.jpg");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = normalize_url("not a url").unwrap_err();
        assert!(matches!(err, ParseError::InvalidUrl { .. }));
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("640"), 640);
        assert_eq!(parse_dimension("60.0"), 60);
        assert_eq!(parse_dimension(" 300.7 "), 300);
        assert_eq!(parse_dimension(""), 0);
        assert_eq!(parse_dimension("-5"), 0);
        assert_eq!(parse_dimension("wide"), 0);
    }
}

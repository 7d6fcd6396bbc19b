//! Data models for imgcap-enrich
//!
//! - Row: one image record and its computed signals
//! - ParseFailure: an input record that never became a row

pub mod parse_failure;
pub mod row;

pub use parse_failure::{Ingested, ParseError, ParseFailure};
pub use row::{Classification, Dimensions, Row};

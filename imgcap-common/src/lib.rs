//! # imgcap Common Library
//!
//! Shared code for the imgcap enrichment tools:
//! - Common error type
//! - Bootstrap configuration (TOML file discovery and loading)
//! - Root folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};

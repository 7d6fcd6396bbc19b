//! Error types for imgcap-enrich
//!
//! Row-level errors never abort a run; they are caught at the orchestrator
//! boundary and the row is dropped for this run. Run-level failures (input
//! unreadable, final output unwritable) surface as `anyhow::Error`.

use thiserror::Error;

pub use crate::models::ParseError;
pub use crate::services::arbitration_client::ArbitrationError;
pub use crate::services::asset_resolver::FetchError;
pub use crate::services::result_writer::WriteError;
pub use crate::services::row_ingestor::IngestError;
pub use crate::services::signal_providers::ProviderError;

/// Errors that exclude a row from the output
#[derive(Debug, Error)]
pub enum RowError {
    /// Asset could not be resolved to a local file
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A signal provider failed or returned unparseable output
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

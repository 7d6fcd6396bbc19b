//! Services for the enrichment pipeline
//!
//! External collaborators (asset resolver, signal providers, arbitration) sit
//! behind traits; the classifier, ingestor and writer are plain functions.

pub mod arbitration_client;
pub mod asset_resolver;
pub mod classifier;
pub mod dimension_probe;
pub mod result_writer;
pub mod row_ingestor;
pub mod signal_providers;

pub use arbitration_client::{
    ArbitrationConfig, ArbitrationError, ArbitrationPayload, Arbitrator, DisabledArbitrator,
    OpenAiArbitrator,
};
pub use asset_resolver::{AssetResolver, FetchError, HttpAssetResolver};
pub use classifier::{assess, classify, is_likely_text_bearing, is_trustworthy, Assessment};
pub use dimension_probe::probe_dimensions;
pub use result_writer::{derive_failure_report_path, derive_output_path, ResultWriter, WriteError};
pub use row_ingestor::{normalize_url, IngestError, RowIngestor};
pub use signal_providers::{ProviderConfig, ProviderError, ScriptSignalProvider, SignalProvider};

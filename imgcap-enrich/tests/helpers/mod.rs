//! Test Helper Utilities
//!
//! Counting doubles for the resolver, provider and arbitrator traits.

#![allow(dead_code)]

use async_trait::async_trait;
use image::ImageFormat;
use imgcap_enrich::models::Row;
use imgcap_enrich::services::arbitration_client::{
    ArbitrationError, ArbitrationPayload, Arbitrator,
};
use imgcap_enrich::services::asset_resolver::{cache_filename, AssetResolver, FetchError};
use imgcap_enrich::services::signal_providers::{ProviderError, SignalProvider};
use imgcap_enrich::workflow::{BatchRunner, EnrichmentOrchestrator};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Writes a real PNG per URL under the production cache filename, so the
/// extension may not match the content (`.jpg` for extensionless URLs)
pub struct FakeResolver {
    dir: PathBuf,
    dims: HashMap<String, (u32, u32)>,
    failing: HashSet<String>,
    latency: Option<Duration>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeResolver {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            dims: HashMap::new(),
            failing: HashSet::new(),
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_dims(mut self, url: &str, width: u32, height: u32) -> Self {
        self.dims.insert(url.to_string(), (width, height));
        self
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Hold every resolve open for `latency` so overlapping rows are visible
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most resolves observed in progress at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn write_asset(&self, url: &str) -> Result<PathBuf, FetchError> {
        if self.failing.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        }

        let path = self.dir.join(cache_filename(url));
        if !path.exists() {
            let (width, height) = self.dims.get(url).copied().unwrap_or((400, 300));
            image::RgbImage::new(width, height)
                .save_with_format(&path, ImageFormat::Png)
                .unwrap();
        }
        Ok(path)
    }
}

#[async_trait]
impl AssetResolver for FakeResolver {
    async fn resolve(&self, url: &str) -> Result<PathBuf, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.write_asset(url);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Fixed answers for every image, with per-signal call counters
pub struct FakeProviders {
    pub caption: String,
    pub ocr: String,
    pub ocr_qa: String,
    pub fail_caption: bool,
    pub caption_calls: AtomicUsize,
    pub ocr_calls: AtomicUsize,
    pub ocr_qa_calls: AtomicUsize,
}

impl FakeProviders {
    pub fn new(caption: &str, ocr: &str, ocr_qa: &str) -> Self {
        Self {
            caption: caption.to_string(),
            ocr: ocr.to_string(),
            ocr_qa: ocr_qa.to_string(),
            fail_caption: false,
            caption_calls: AtomicUsize::new(0),
            ocr_calls: AtomicUsize::new(0),
            ocr_qa_calls: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.caption_calls.load(Ordering::SeqCst)
            + self.ocr_calls.load(Ordering::SeqCst)
            + self.ocr_qa_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalProvider for FakeProviders {
    async fn caption(&self, _file: &Path) -> Result<String, ProviderError> {
        self.caption_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_caption {
            return Err(ProviderError::Parse {
                script: "caption.py".to_string(),
                message: "Failed to parse JSON: Traceback".to_string(),
            });
        }
        Ok(self.caption.clone())
    }

    async fn ocr(&self, _file: &Path) -> Result<String, ProviderError> {
        self.ocr_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ocr.clone())
    }

    async fn ocr_qa(&self, _file: &Path) -> Result<String, ProviderError> {
        self.ocr_qa_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ocr_qa.clone())
    }
}

/// Arbitrator that records payloads; `answer: None` simulates an API failure
pub struct FakeArbitrator {
    pub enabled: bool,
    pub answer: Option<String>,
    pub calls: AtomicUsize,
    pub payloads: Mutex<Vec<ArbitrationPayload>>,
}

impl FakeArbitrator {
    pub fn disabled() -> Self {
        Self::with_answer(false, None)
    }

    pub fn answering(answer: &str) -> Self {
        Self::with_answer(true, Some(answer.to_string()))
    }

    pub fn failing() -> Self {
        Self::with_answer(true, None)
    }

    fn with_answer(enabled: bool, answer: Option<String>) -> Self {
        Self {
            enabled,
            answer,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Arbitrator for FakeArbitrator {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn arbitrate(&self, payload: &ArbitrationPayload) -> Result<String, ArbitrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        self.answer.clone().ok_or(ArbitrationError::Api {
            status: 500,
            body: "upstream unavailable".to_string(),
        })
    }
}

/// Doubles wired into an orchestrator
pub struct Harness {
    pub resolver: Arc<FakeResolver>,
    pub providers: Arc<FakeProviders>,
    pub arbitrator: Arc<FakeArbitrator>,
    pub orchestrator: Arc<EnrichmentOrchestrator>,
}

impl Harness {
    pub fn new(
        force: bool,
        resolver: FakeResolver,
        providers: FakeProviders,
        arbitrator: FakeArbitrator,
    ) -> Self {
        let resolver = Arc::new(resolver);
        let providers = Arc::new(providers);
        let arbitrator = Arc::new(arbitrator);
        let orchestrator = Arc::new(EnrichmentOrchestrator::new(
            force,
            resolver.clone(),
            providers.clone(),
            arbitrator.clone(),
        ));
        Self {
            resolver,
            providers,
            arbitrator,
            orchestrator,
        }
    }

    pub fn runner(&self, concurrency: usize) -> BatchRunner {
        BatchRunner::new(self.orchestrator.clone(), concurrency)
    }
}

/// Row with a normalized URL and nothing computed
pub fn pending_row(index: usize, url: &str) -> Row {
    Row::new(index, url, url)
}

// core/src/metrics.rs
//! Prosess-globale Prometheus-tellere for pipelinen.
//!
//! Kjøringene er batch-jobber, så tellerne dumpes som tekst på slutten av
//! `run` i stedet for å eksponeres over HTTP.
use log::warn;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct PipelineMetrics {
    registry: Registry,
    /// HTTP-forsøk per datasett (inkl. retries).
    pub fetch_attempts: IntCounterVec,
    /// Chunks der alle kilder feilet.
    pub fetch_failures: IntCounterVec,
    pub chunks_downloaded: IntCounterVec,
    pub chunks_skipped_existing: IntCounter,
    pub timestamps_scored: IntCounter,
}

impl PipelineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let fetch_attempts = IntCounterVec::new(
            Opts::new("blueglow_fetch_attempts_total", "HTTP attempts per dataset"),
            &["dataset"],
        )?;
        let fetch_failures = IntCounterVec::new(
            Opts::new("blueglow_fetch_failures_total", "Chunks where every source failed"),
            &["dataset"],
        )?;
        let chunks_downloaded = IntCounterVec::new(
            Opts::new("blueglow_chunks_downloaded_total", "Chunks written to disk"),
            &["dataset"],
        )?;
        let chunks_skipped_existing = IntCounter::new(
            "blueglow_chunks_skipped_existing_total",
            "Chunks skipped because the file already existed",
        )?;
        let timestamps_scored = IntCounter::new(
            "blueglow_timestamps_scored_total",
            "Timestamps scored by the model",
        )?;

        registry.register(Box::new(fetch_attempts.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(chunks_downloaded.clone()))?;
        registry.register(Box::new(chunks_skipped_existing.clone()))?;
        registry.register(Box::new(timestamps_scored.clone()))?;

        Ok(Self {
            registry,
            fetch_attempts,
            fetch_failures,
            chunks_downloaded,
            chunks_skipped_existing,
            timestamps_scored,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus tekstformat.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            warn!("⚠️ Kunne ikke serialisere metrikker: {e}");
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

static METRICS: Lazy<Option<PipelineMetrics>> = Lazy::new(|| {
    PipelineMetrics::new()
        .map_err(|e| warn!("⚠️ Metrikker deaktivert: {e}"))
        .ok()
});

/// None bare hvis registreringen feilet ved oppstart.
pub fn global() -> Option<&'static PipelineMetrics> {
    METRICS.as_ref()
}

pub fn record_fetch_attempt(dataset: &str) {
    if let Some(m) = global() {
        m.fetch_attempts.with_label_values(&[dataset]).inc();
    }
}

pub fn record_fetch_failure(dataset: &str) {
    if let Some(m) = global() {
        m.fetch_failures.with_label_values(&[dataset]).inc();
    }
}

pub fn record_chunk_downloaded(dataset: &str) {
    if let Some(m) = global() {
        m.chunks_downloaded.with_label_values(&[dataset]).inc();
    }
}

pub fn record_chunk_skipped() {
    if let Some(m) = global() {
        m.chunks_skipped_existing.inc();
    }
}

pub fn record_scored(n: u64) {
    if let Some(m) = global() {
        m.timestamps_scored.inc_by(n);
    }
}

pub fn render() -> String {
    global().map(PipelineMetrics::render).unwrap_or_default()
}

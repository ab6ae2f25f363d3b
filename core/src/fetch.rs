// core/src/fetch.rs
//! Nedlasting av historiske data: ERDDAP griddap (SST, Chl-a) i månedschunks
//! og NDBC stdmet-år for bøyestasjonen.
//!
//! Nettverksfeil er ikke fatale; en chunk der alle kilder feiler logges og
//! telles, og kjøringen fortsetter.
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, Months, NaiveDate};
use log::{info, warn};
use ureq::Agent;

use crate::buoy::{parse_stdmet_text, STD_COLS};
use crate::config::{FetchConfig, SourceSpec};
use crate::error::{BlueGlowError, Result};
use crate::metrics;

/// Svar under denne størrelsen regnes som feil (ERDDAP sender korte feilsider).
pub const MIN_BODY_BYTES: usize = 200;
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Blocking GET. `Err` er transportfeil; HTTP-statuser kommer som `Ok`.
pub trait HttpGet {
    fn get(&self, url: &str) -> std::result::Result<HttpResponse, String>;
}

/// ureq-agent med fast timeout.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl HttpGet for UreqTransport {
    fn get(&self, url: &str) -> std::result::Result<HttpResponse, String> {
        match self.agent.get(url).call() {
            Ok(resp) => {
                let status = resp.status();
                let mut body = Vec::new();
                resp.into_reader()
                    .take(MAX_BODY_BYTES)
                    .read_to_end(&mut body)
                    .map_err(|e| e.to_string())?;
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Status(status, _)) => Ok(HttpResponse {
                status,
                body: Vec::new(),
            }),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Antall forsøk per kilde og lineær backoff (ventetid = backoff × forsøk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self {
            attempts: cfg.retry_times.max(1),
            backoff: Duration::from_secs(cfg.retry_backoff_secs),
        }
    }

    /// Ventetid etter mislykket forsøk nr. `attempt` (1-basert).
    pub fn wait_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Downloaded,
    SkippedExisting,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

impl FetchReport {
    pub fn record(&mut self, outcome: ChunkOutcome) {
        match outcome {
            ChunkOutcome::Downloaded => self.downloaded += 1,
            ChunkOutcome::SkippedExisting => self.skipped_existing += 1,
            ChunkOutcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: FetchReport) {
        self.downloaded += other.downloaded;
        self.skipped_existing += other.skipped_existing;
        self.failed += other.failed;
    }
}

/// Én tidsbit i griddap-serien. `label` er første dag i måneden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthChunk {
    pub label: NaiveDate,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Chunks à `step` måneder over [start, end]. Første chunk starter på månedens
/// første dag, siste slutter på `end`.
pub fn month_chunks(start: NaiveDate, end: NaiveDate, step: u32) -> Vec<MonthChunk> {
    let step = step.max(1);
    let mut out = Vec::new();
    let Some(mut cur) = start.with_day(1) else {
        return out;
    };
    while cur <= end {
        let Some(next) = cur.checked_add_months(Months::new(step)) else {
            break;
        };
        let chunk_end = next.pred_opt().unwrap_or(next).min(end);
        out.push(MonthChunk {
            label: cur,
            start: cur,
            end: chunk_end,
        });
        cur = next;
    }
    out
}

/// ERDDAP griddap NetCDF-URL: variabel[tid][lat][lon] med stride 1.
pub fn griddap_url(
    source: &SourceSpec,
    cfg: &FetchConfig,
    t0: NaiveDate,
    t1: NaiveDate,
) -> String {
    format!(
        "{server}/griddap/{dataset}.nc?{var}[({t0}T00:00:00Z):1:({t1}T23:59:59Z)][({lat0}):1:({lat1})][({lon0}):1:({lon1})]",
        server = source.server.trim_end_matches('/'),
        dataset = source.dataset,
        var = source.variable,
        t0 = t0.format("%Y-%m-%d"),
        t1 = t1.format("%Y-%m-%d"),
        lat0 = cfg.lat_min,
        lat1 = cfg.lat_max,
        lon0 = cfg.lon_min,
        lon1 = cfg.lon_max,
    )
}

/// NDBC stdmet-år som ren tekst (serveren pakker ut .gz for oss).
pub fn ndbc_year_url(base: &str, station: &str, year: i32) -> String {
    format!(
        "{}/view_text_file.php?filename={}h{}.txt.gz&dir=data/historical/stdmet/",
        base.trim_end_matches('/'),
        station,
        year
    )
}

pub struct Fetcher<'a> {
    http: &'a dyn HttpGet,
    policy: RetryPolicy,
    sleep: Box<dyn Fn(Duration) + 'a>,
    cfg: &'a FetchConfig,
    raw_dir: PathBuf,
}

impl<'a> Fetcher<'a> {
    pub fn new(http: &'a dyn HttpGet, cfg: &'a FetchConfig, raw_dir: &Path) -> Self {
        Self {
            http,
            policy: RetryPolicy::from_config(cfg),
            sleep: Box::new(std::thread::sleep),
            cfg,
            raw_dir: raw_dir.to_path_buf(),
        }
    }

    /// Bytter ut sove-funksjonen (tester registrerer ventetidene i stedet).
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET med retries. Suksess = HTTP 200 og mer enn `min_bytes` i body.
    pub fn get_with_retry(&self, url: &str, dataset: &str, min_bytes: usize) -> Result<Vec<u8>> {
        let attempts = self.policy.attempts;
        let mut last_err = String::from("no attempts made");
        for attempt in 1..=attempts {
            metrics::record_fetch_attempt(dataset);
            match self.http.get(url) {
                Ok(resp) if resp.status == 200 && resp.body.len() > min_bytes => {
                    return Ok(resp.body)
                }
                Ok(resp) if resp.status == 200 => {
                    last_err = format!("HTTP 200 with only {} bytes", resp.body.len())
                }
                Ok(resp) => last_err = format!("HTTP {}", resp.status),
                Err(e) => last_err = e,
            }
            if attempt < attempts {
                let wait = self.policy.wait_after(attempt);
                warn!(
                    "⚠️ [{dataset}] forsøk {attempt}/{attempts} feilet ({last_err}), prøver igjen om {}s",
                    wait.as_secs()
                );
                (self.sleep)(wait);
            }
        }
        Err(BlueGlowError::Fetch {
            url: url.to_string(),
            reason: last_err,
        })
    }

    /// Hopper over eksisterende fil; ellers primærkilde, så fallbacks i rekkefølge.
    pub fn fetch_with_fallback(
        &self,
        out_path: &Path,
        primary: &SourceSpec,
        fallbacks: &[SourceSpec],
        chunk: MonthChunk,
        tag: &str,
    ) -> Result<ChunkOutcome> {
        if out_path.exists() {
            info!("✓ Hopper over {}", out_path.display());
            metrics::record_chunk_skipped();
            return Ok(ChunkOutcome::SkippedExisting);
        }
        let sources: Vec<&SourceSpec> = std::iter::once(primary).chain(fallbacks).collect();
        for (i, source) in sources.iter().enumerate() {
            let label = if i == 0 {
                "primær".to_string()
            } else {
                format!("fallback {i}")
            };
            info!(
                "📥 [{tag}] {} → {} | {label} ({}/{}) {}/{}",
                chunk.start,
                chunk.end,
                i + 1,
                sources.len(),
                source.dataset,
                source.variable
            );
            let url = griddap_url(source, self.cfg, chunk.start, chunk.end);
            match self.get_with_retry(&url, tag, MIN_BODY_BYTES) {
                Ok(body) => {
                    if let Some(parent) = out_path.parent() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| BlueGlowError::io(parent, e))?;
                    }
                    std::fs::write(out_path, &body).map_err(|e| BlueGlowError::io(out_path, e))?;
                    info!(
                        "✅ Lagret {} ({:.2} MB)",
                        out_path.display(),
                        body.len() as f64 / 1024.0 / 1024.0
                    );
                    metrics::record_chunk_downloaded(tag);
                    return Ok(ChunkOutcome::Downloaded);
                }
                Err(e) => warn!("❌ {label} feilet: {e}"),
            }
        }
        warn!(
            "⚠️ Alle {} kilder feilet for {} → {}, hopper over",
            sources.len(),
            chunk.start,
            chunk.end
        );
        metrics::record_fetch_failure(tag);
        Ok(ChunkOutcome::Failed)
    }

    /// Hele griddap-serien for én variabel, fil per chunk: `{prefix}_{YYYYMM}.nc`.
    pub fn fetch_series(
        &self,
        primary: &SourceSpec,
        fallbacks: &[SourceSpec],
        prefix: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        for chunk in month_chunks(start, end, self.cfg.chunk_months) {
            let out = self
                .raw_dir
                .join(format!("{prefix}_{}.nc", chunk.label.format("%Y%m")));
            report.record(self.fetch_with_fallback(&out, primary, fallbacks, chunk, prefix)?);
        }
        info!(
            "📊 {prefix}: {} lastet ned, {} fantes fra før, {} feilet",
            report.downloaded, report.skipped_existing, report.failed
        );
        Ok(report)
    }

    fn ndbc_year_rows(&self, year: i32) -> Result<Vec<Vec<String>>> {
        let url = ndbc_year_url(&self.cfg.ndbc_base_url, &self.cfg.ndbc_station, year);
        let body = self.get_with_retry(&url, "ndbc", 0)?;
        let text = String::from_utf8_lossy(&body);
        let table = parse_stdmet_text(&text);
        let has_date_cols = table.header.iter().any(|h| h == "MM");
        if !has_date_cols || table.rows.is_empty() {
            return Err(BlueGlowError::Fetch {
                url,
                reason: "response contained no stdmet rows".into(),
            });
        }
        Ok(table.standard_rows())
    }

    /// NDBC-år [y0, y1] samlet i `ndbc_{station}_{y0}_{y1}.csv` med `dt`-kolonne.
    pub fn fetch_ndbc(&self, y0: i32, y1: i32) -> Result<ChunkOutcome> {
        let station = &self.cfg.ndbc_station;
        let out = self.raw_dir.join(format!("ndbc_{station}_{y0}_{y1}.csv"));
        if out.exists() {
            info!("✓ Hopper over {}", out.display());
            metrics::record_chunk_skipped();
            return Ok(ChunkOutcome::SkippedExisting);
        }

        let mut rows = Vec::new();
        for year in y0..=y1 {
            match self.ndbc_year_rows(year) {
                Ok(mut r) => {
                    info!("✅ År {year}: {} rader", r.len());
                    rows.append(&mut r);
                }
                Err(e) => warn!("⚠️ Hopper over år {year}: {e}"),
            }
        }
        if rows.is_empty() {
            warn!("⚠️ Ingen NDBC-filer lastet ned for stasjon {station}");
            metrics::record_fetch_failure("ndbc");
            return Ok(ChunkOutcome::Failed);
        }

        std::fs::create_dir_all(&self.raw_dir).map_err(|e| BlueGlowError::io(&self.raw_dir, e))?;
        write_ndbc_csv(&out, &rows)?;
        info!("✅ Lagret {} ({} rader, {y0}-{y1})", out.display(), rows.len());
        metrics::record_chunk_downloaded("ndbc");
        Ok(ChunkOutcome::Downloaded)
    }

    /// SST, Chl-a og NDBC for konfigurert periode.
    pub fn fetch_all(&self, start: NaiveDate, end: NaiveDate) -> Result<FetchReport> {
        info!("📅 Periode: {start} → {end}");
        info!(
            "📍 Bbox: ({}, {}) → ({}, {})",
            self.cfg.lat_min, self.cfg.lon_min, self.cfg.lat_max, self.cfg.lon_max
        );
        info!("🛟 NDBC-stasjon: {}", self.cfg.ndbc_station_label);

        let mut report = FetchReport::default();
        report.merge(self.fetch_series(
            &self.cfg.sst_primary,
            &self.cfg.sst_fallbacks,
            "sst",
            start,
            end,
        )?);
        report.merge(self.fetch_series(
            &self.cfg.chla_primary,
            &self.cfg.chla_fallbacks,
            "chla",
            start,
            end,
        )?);
        report.record(self.fetch_ndbc(start.year(), end.year())?);
        Ok(report)
    }
}

fn write_ndbc_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let csv_err = |source| BlueGlowError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    let header: Vec<&str> = STD_COLS.iter().copied().chain(["dt"]).collect();
    wtr.write_record(&header).map_err(csv_err)?;
    for row in rows {
        wtr.write_record(row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| BlueGlowError::io(path, e))?;
    Ok(())
}

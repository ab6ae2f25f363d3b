// core/src/pipeline.rs
//! Stegene i pipelinen, hver med eksplisitt konfig og eksplisitte artefakter.
//!
//! astronomy → fetch → climatology → train → forecast. `run_all` kjører de
//! lokale stegene i én prosess og gjenbruker artefakter som allerede finnes.
use chrono::NaiveDate;
use log::info;

use crate::astronomy::Astronomy;
use crate::climatology::Climatology;
use crate::config::BlueGlowConfig;
use crate::error::Result;
use crate::features::Environment;
use crate::fetch::{FetchReport, Fetcher, HttpGet};
use crate::forecast::Forecaster;
use crate::model::TrainedModel;
use crate::storage::save_json;
use crate::training::train_seeded;
use crate::types::{
    AstronomySnapshot, DailyForecast, DetailedDayForecast, ForecastDatabase, ForecastDocument,
};

pub fn run_astronomy(cfg: &BlueGlowConfig, start: NaiveDate) -> Result<AstronomySnapshot> {
    let astronomy = Astronomy::from_config(cfg);
    let snapshot = astronomy.snapshot(start, cfg.forecast.next_days);
    for day in &snapshot.forecast_days {
        info!(
            "🌙 {} | måne {:.2} ({}) | tidevann {:+.2} | lavvann nær: {}",
            day.date.date_naive(),
            day.moon.illumination,
            day.moon.phase_name,
            day.tide.current_level,
            day.tide.near_low_tide
        );
    }
    save_json(&snapshot, &cfg.paths.astronomy, "astronomy snapshot")?;
    Ok(snapshot)
}

pub fn run_fetch(cfg: &BlueGlowConfig, http: &dyn HttpGet, today: NaiveDate) -> Result<FetchReport> {
    let (start, end) = cfg.fetch.resolved_range(today);
    let fetcher = Fetcher::new(http, &cfg.fetch, &cfg.paths.raw_dir);
    let report = fetcher.fetch_all(start, end)?;
    info!(
        "📦 Fetch ferdig: {} lastet ned, {} fantes fra før, {} feilet",
        report.downloaded, report.skipped_existing, report.failed
    );
    Ok(report)
}

pub fn run_climatology(cfg: &BlueGlowConfig) -> Result<Climatology> {
    let clim = Climatology::build_from_dir(&cfg.paths.raw_dir, &cfg.fetch.ndbc_station_label)?;
    clim.save(&cfg.paths.climatology)?;
    Ok(clim)
}

pub fn run_train(cfg: &BlueGlowConfig, clim: &Climatology) -> Result<TrainedModel> {
    let astronomy = Astronomy::from_config(cfg);
    let env = Environment::new(&astronomy, clim);
    let model = train_seeded(&env, &cfg.training)?;
    model.save(&cfg.paths.model)?;
    Ok(model)
}

/// Artefaktene scoringen trenger, lastet fra disk.
pub struct Artifacts {
    pub climatology: Climatology,
    pub model: TrainedModel,
}

impl Artifacts {
    /// Mangler en av filene, er det feil med beskjed om hvilket steg som må kjøres.
    pub fn load(cfg: &BlueGlowConfig) -> Result<Self> {
        Ok(Self {
            climatology: Climatology::load(&cfg.paths.climatology)?,
            model: TrainedModel::load(&cfg.paths.model)?,
        })
    }

    /// Gjenbruker eksisterende filer, bygger/trener det som mangler.
    pub fn load_or_build(cfg: &BlueGlowConfig) -> Result<Self> {
        let climatology = if cfg.paths.climatology.exists() {
            Climatology::load(&cfg.paths.climatology)?
        } else {
            info!("🧱 Ingen klimatologi funnet, bygger fra rådata");
            run_climatology(cfg)?
        };
        let model = if cfg.paths.model.exists() {
            TrainedModel::load(&cfg.paths.model)?
        } else {
            info!("🤖 Ingen modell funnet, trener ny");
            run_train(cfg, &climatology)?
        };
        Ok(Self { climatology, model })
    }
}

pub fn forecast_daily(
    cfg: &BlueGlowConfig,
    artifacts: &Artifacts,
    start: NaiveDate,
) -> Result<ForecastDocument<DailyForecast>> {
    let astronomy = Astronomy::from_config(cfg);
    Forecaster::new(cfg, &artifacts.model, &astronomy, &artifacts.climatology).best_week_daily(start)
}

pub fn forecast_detailed(
    cfg: &BlueGlowConfig,
    artifacts: &Artifacts,
    start: NaiveDate,
) -> Result<ForecastDocument<DetailedDayForecast>> {
    let astronomy = Astronomy::from_config(cfg);
    Forecaster::new(cfg, &artifacts.model, &astronomy, &artifacts.climatology)
        .best_week_detailed(start)
}

pub fn forecast_next_days(
    cfg: &BlueGlowConfig,
    artifacts: &Artifacts,
    start: NaiveDate,
) -> Result<ForecastDocument<DailyForecast>> {
    let astronomy = Astronomy::from_config(cfg);
    Forecaster::new(cfg, &artifacts.model, &astronomy, &artifacts.climatology).next_days(start)
}

pub fn forecast_range(
    cfg: &BlueGlowConfig,
    artifacts: &Artifacts,
    start: NaiveDate,
    n_days: usize,
) -> Result<ForecastDocument<DetailedDayForecast>> {
    let astronomy = Astronomy::from_config(cfg);
    Forecaster::new(cfg, &artifacts.model, &astronomy, &artifacts.climatology)
        .detailed_range(start, n_days)
}

/// `year`-steget: `n_days` detaljerte dager til `paths.forecast_year`.
pub fn run_year(
    cfg: &BlueGlowConfig,
    start: NaiveDate,
    n_days: usize,
) -> Result<ForecastDocument<DetailedDayForecast>> {
    let artifacts = Artifacts::load(cfg)?;
    let doc = forecast_range(cfg, &artifacts, start, n_days)?;
    save_json(&doc, &cfg.paths.forecast_year, "year forecast")?;
    Ok(doc)
}

/// `database`-steget: `years` × 365 dager nøklet på dato.
pub fn run_database(
    cfg: &BlueGlowConfig,
    start: NaiveDate,
    years: usize,
) -> Result<ForecastDatabase> {
    let artifacts = Artifacts::load(cfg)?;
    let astronomy = Astronomy::from_config(cfg);
    let db = Forecaster::new(cfg, &artifacts.model, &astronomy, &artifacts.climatology)
        .database(start, years * 365)?;
    save_json(&db, &cfg.paths.forecast_database, "forecast database")?;
    Ok(db)
}

/// `forecast`-steget: laster artefakter, scorer og skriver dokumentet.
pub fn run_forecast(cfg: &BlueGlowConfig, start: NaiveDate, detailed: bool) -> Result<()> {
    let artifacts = Artifacts::load(cfg)?;
    if detailed {
        let doc = forecast_detailed(cfg, &artifacts, start)?;
        save_json(&doc, &cfg.paths.forecast_detailed, "detailed forecast")
    } else {
        let doc = forecast_daily(cfg, &artifacts, start)?;
        save_json(&doc, &cfg.paths.forecast, "forecast")
    }
}

pub fn run_next_days(cfg: &BlueGlowConfig, start: NaiveDate) -> Result<()> {
    let artifacts = Artifacts::load(cfg)?;
    let doc = forecast_next_days(cfg, &artifacts, start)?;
    save_json(&doc, &cfg.paths.forecast, "forecast")
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub daily: ForecastDocument<DailyForecast>,
    pub detailed: ForecastDocument<DetailedDayForecast>,
}

/// Ett-skudds kjøring: klimatologi og modell (bygges ved behov), så begge prognosene.
pub fn run_all(cfg: &BlueGlowConfig, start: NaiveDate) -> Result<RunSummary> {
    let artifacts = Artifacts::load_or_build(cfg)?;
    let daily = forecast_daily(cfg, &artifacts, start)?;
    save_json(&daily, &cfg.paths.forecast, "forecast")?;
    let detailed = forecast_detailed(cfg, &artifacts, start)?;
    save_json(&detailed, &cfg.paths.forecast_detailed, "detailed forecast")?;
    Ok(RunSummary { daily, detailed })
}

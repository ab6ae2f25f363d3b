// core/src/config.rs
//! Felles konfigurasjon for alle steg i pipelinen.
//!
//! Alle konstanter (lokasjon, tidevanns-epoke, terskler, stier) samles her og
//! sendes eksplisitt inn i hver komponent. Filen er TOML; alle felt er valgfrie.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{BlueGlowError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueGlowConfig {
    pub location: Location,
    pub astronomy: AstronomyConfig,
    pub rating: RatingThresholds,
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
    pub paths: PathsConfig,
    pub fetch: FetchConfig,
}

/// Fast observatør-posisjon (grader, øst og nord positive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            name: "La Jolla Shores (Scripps Nearshore)".to_string(),
            lat: 32.86,
            lon: -117.26,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AstronomyConfig {
    /// Referanse-høyvann for den enkle M2-modellen.
    pub tide_reference: DateTime<Utc>,
    /// M2 hovedkomponent (12t 25min).
    pub tide_period_hours: f64,
    /// Månelys under denne terskelen regnes som mørk natt.
    pub dark_threshold: f64,
    /// ±vindu rundt lavvann (timer).
    pub low_tide_window_hours: f64,
}

impl Default for AstronomyConfig {
    fn default() -> Self {
        Self {
            // 2024-01-01T00:00:00Z
            tide_reference: DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default(),
            tide_period_hours: 12.42,
            dark_threshold: 0.3,
            low_tide_window_hours: 2.0,
        }
    }
}

/// Kanonisk ratingtabell (score >= terskel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingThresholds {
    pub excellent: u8,
    pub good: u8,
    pub fair: u8,
}

impl Default for RatingThresholds {
    fn default() -> Self {
        Self {
            excellent: 70,
            good: 50,
            fair: 30,
        }
    }
}

impl RatingThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.excellent <= 100 && self.excellent > self.good && self.good > self.fair) {
            return Err(BlueGlowError::validation(format!(
                "rating thresholds must satisfy 100 >= excellent > good > fair, got {}/{}/{}",
                self.excellent, self.good, self.fair
            )));
        }
        Ok(())
    }
}

/// Terskler i den svake merkeregelen (alle må være oppfylt for label=1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelRule {
    pub max_illumination: f64,
    pub max_tide_level: f64,
    pub max_wave_height: f64,
}

impl Default for LabelRule {
    fn default() -> Self {
        Self {
            max_illumination: 0.3,
            max_tide_level: -0.5,
            max_wave_height: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_samples: usize,
    pub seed: u64,
    /// Representativt år som tidspunktene trekkes fra.
    pub sample_year: i32,
    pub test_fraction: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    /// Invers L2-styrke (som sklearn `C`).
    pub c: f64,
    pub version: String,
    pub label_rule: LabelRule,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_samples: 5000,
            seed: 42,
            sample_year: 2024,
            test_fraction: 0.2,
            max_iter: 100,
            tolerance: 1e-8,
            c: 1.0,
            version: "1.0-climatology".to_string(),
            label_rule: LabelRule::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub horizon_days: usize,
    pub window_days: usize,
    pub timeslot_hours: u32,
    /// Klokkeslett (UTC) for daglig score.
    pub daily_reference_hour: u32,
    pub next_days: usize,
    /// Over denne terskelen nevnes månelys som begrensning ved "Poor".
    pub bright_moon_threshold: f64,
    /// Standardlengde for `year`-steget.
    pub year_days: usize,
    /// Standardlengde (år à 365 dager) for `database`-steget.
    pub database_years: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            window_days: 7,
            timeslot_hours: 3,
            daily_reference_hour: 12,
            next_days: 7,
            bright_moon_threshold: 0.5,
            year_days: 365,
            database_years: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub climatology: PathBuf,
    pub model: PathBuf,
    pub astronomy: PathBuf,
    pub forecast: PathBuf,
    pub forecast_detailed: PathBuf,
    pub forecast_year: PathBuf,
    pub forecast_database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            climatology: PathBuf::from("data/climatology.json"),
            model: PathBuf::from("models/biolum_lr.json"),
            astronomy: PathBuf::from("data/astronomy_next7.json"),
            forecast: PathBuf::from("site/forecast.json"),
            forecast_detailed: PathBuf::from("site/forecast_detailed.json"),
            forecast_year: PathBuf::from("site/forecast_year.json"),
            forecast_database: PathBuf::from("site/forecast_database.json"),
        }
    }
}

/// ERDDAP-kilde: server, datasett og variabel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub server: String,
    pub dataset: String,
    pub variable: String,
}

impl SourceSpec {
    pub fn new(server: &str, dataset: &str, variable: &str) -> Self {
        Self {
            server: server.to_string(),
            dataset: dataset.to_string(),
            variable: variable.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    /// Mangler => to år tilbake fra i dag.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub ndbc_station: String,
    pub ndbc_station_label: String,
    pub ndbc_base_url: String,
    pub chunk_months: u32,
    pub timeout_secs: u64,
    pub retry_times: u32,
    pub retry_backoff_secs: u64,
    pub sst_primary: SourceSpec,
    pub sst_fallbacks: Vec<SourceSpec>,
    pub chla_primary: SourceSpec,
    pub chla_fallbacks: Vec<SourceSpec>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            lat_min: 32.83,
            lat_max: 32.89,
            lon_min: -117.32,
            lon_max: -117.20,
            start: None,
            end: None,
            ndbc_station: "46254".to_string(),
            ndbc_station_label: "46254 (Scripps Nearshore - Wave Buoy)".to_string(),
            ndbc_base_url: "https://www.ndbc.noaa.gov".to_string(),
            chunk_months: 1,
            timeout_secs: 120,
            retry_times: 3,
            retry_backoff_secs: 15,
            sst_primary: SourceSpec::new(
                "https://coastwatch.pfeg.noaa.gov/erddap",
                "jplMURSST41",
                "sst",
            ),
            sst_fallbacks: Vec::new(),
            chla_primary: SourceSpec::new(
                "https://coastwatch.noaa.gov/erddap",
                "noaacwNPPVIIRSchlaDaily",
                "chlor_a",
            ),
            chla_fallbacks: Vec::new(),
        }
    }
}

impl FetchConfig {
    /// Faktisk [start, end], byttet om hvis de er oppgitt i feil rekkefølge.
    pub fn resolved_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = self.end.unwrap_or(today);
        let start = self.start.unwrap_or(end - Duration::days(365 * 2));
        if start > end {
            (end, start)
        } else {
            (start, end)
        }
    }
}

impl BlueGlowConfig {
    /// Leser konfig fra TOML. Finnes ikke filen, brukes standardverdier.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "⚠️ Fant ikke konfig på {}, bruker standardverdier",
                path.display()
            );
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| BlueGlowError::io(path, e))?;
        let cfg = Self::from_toml_str(&text).map_err(|e| match e {
            BlueGlowError::Config { field, message, .. } => BlueGlowError::Config {
                path: path.to_path_buf(),
                field,
                message,
            },
            other => other,
        })?;
        info!("📂 Konfig lastet fra {}", path.display());
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let de = toml::Deserializer::new(text);
        let cfg: Self = serde_path_to_error::deserialize(de).map_err(|e| BlueGlowError::Config {
            path: PathBuf::from("<inline>"),
            field: e.path().to_string(),
            message: e.inner().to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.rating.validate()?;
        if !(self.astronomy.tide_period_hours > 0.0) {
            return Err(BlueGlowError::validation("tide_period_hours must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.astronomy.dark_threshold) {
            return Err(BlueGlowError::validation("dark_threshold must be in [0, 1]"));
        }
        let f = &self.forecast;
        if f.window_days == 0 || f.horizon_days < f.window_days {
            return Err(BlueGlowError::validation(format!(
                "horizon_days ({}) must be >= window_days ({}) >= 1",
                f.horizon_days, f.window_days
            )));
        }
        if f.timeslot_hours == 0 || 24 % f.timeslot_hours != 0 {
            return Err(BlueGlowError::validation(
                "timeslot_hours must divide 24",
            ));
        }
        if f.daily_reference_hour > 23 {
            return Err(BlueGlowError::validation("daily_reference_hour must be 0-23"));
        }
        let t = &self.training;
        if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            return Err(BlueGlowError::validation("test_fraction must be in (0, 1)"));
        }
        if t.n_samples < 10 || t.max_iter == 0 || !(t.c > 0.0) {
            return Err(BlueGlowError::validation(
                "training needs n_samples >= 10, max_iter >= 1 and c > 0",
            ));
        }
        if self.fetch.chunk_months == 0 || self.fetch.retry_times == 0 {
            return Err(BlueGlowError::validation(
                "chunk_months and retry_times must be >= 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = BlueGlowConfig::from_toml_str(
            r#"
            [location]
            name = "Matsu"
            lat = 26.16
            lon = 119.95

            [rating]
            excellent = 80
            "#,
        )
        .unwrap();
        assert_eq!(cfg.location.name, "Matsu");
        assert_eq!(cfg.rating.excellent, 80);
        assert_eq!(cfg.rating.good, 50);
        assert_eq!(cfg.training.n_samples, 5000);
        assert!((cfg.astronomy.tide_period_hours - 12.42).abs() < 1e-12);
    }

    #[test]
    fn bad_field_reports_path() {
        let err = BlueGlowConfig::from_toml_str("[forecast]\nhorizon_days = \"thirty\"\n")
            .unwrap_err();
        match err {
            BlueGlowError::Config { field, .. } => assert_eq!(field, "forecast.horizon_days"),
            other => panic!("uventet feil: {other:?}"),
        }
    }

    #[test]
    fn overlapping_ratings_rejected() {
        let r = RatingThresholds {
            excellent: 70,
            good: 70,
            fair: 30,
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn fetch_range_swaps_reversed_dates() {
        let mut f = FetchConfig::default();
        f.start = NaiveDate::from_ymd_opt(2024, 6, 1);
        f.end = NaiveDate::from_ymd_opt(2023, 6, 1);
        let (s, e) = f.resolved_range(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(s < e);
        assert_eq!(s, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
    }
}

// core/src/climatology.rs
//! Dag-i-året-klimatologi fra historiske bøyedata.
//!
//! Median per dag-i-året (1..=366) over alle år, sentinel-verdier filtrert bort
//! før aggregering, hull fylt fra nærmeste naboer.
use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Datelike, Utc};
use log::info;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::buoy::{load_ndbc_dir, parse_timestamp, BuoyRecord};
use crate::error::{BlueGlowError, Result};
use crate::storage::{load_json, save_json};

pub const DAYS_IN_YEAR: u16 = 366;
pub const DEFAULT_WAVE_HEIGHT_M: f64 = 1.0;
pub const DEFAULT_WATER_TEMP_C: f64 = 16.0;

/// Bølgehøyde: 0 < h < 20 og ikke 99 (sensorfeil-kode).
pub fn valid_wave_height(h: f64) -> bool {
    h > 0.0 && h < 20.0 && h != 99.0
}

/// Vanntemperatur: 5 < t < 30 og ikke 999.
pub fn valid_water_temp(t: f64) -> bool {
    t > 5.0 && t < 30.0 && t != 999.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalValues {
    pub winter: f64,
    pub spring: f64,
    pub summer: f64,
    pub fall: f64,
}

impl SeasonalValues {
    pub fn get(&self, season: Season) -> f64 {
        match season {
            Season::Winter => self.winter,
            Season::Spring => self.spring,
            Season::Summer => self.summer,
            Season::Fall => self.fall,
        }
    }
}

/// Faste sesongverdier for SST/Chl-a (stasjonen mangler dekning for disse).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalDefaults {
    /// °C
    pub sst: SeasonalValues,
    /// mg/m³
    pub chla: SeasonalValues,
}

impl Default for SeasonalDefaults {
    fn default() -> Self {
        Self {
            sst: SeasonalValues {
                winter: 15.5,
                spring: 16.5,
                summer: 20.0,
                fall: 18.5,
            },
            chla: SeasonalValues {
                winter: 0.8,
                // vårblomstring
                spring: 1.5,
                summer: 0.5,
                fall: 0.6,
            },
        }
    }
}

/// Godtar også naive tidsstempler (tolket som UTC).
fn lenient_timestamp<'de, D>(d: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {s:?}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(deserialize_with = "lenient_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub end: DateTime<Utc>,
}

/// Proveniens. Tallene er det som faktisk ble brukt, aldri mer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimatologyMetadata {
    pub created: DateTime<Utc>,
    pub ndbc_records: usize,
    #[serde(default)]
    pub valid_wave_observations: usize,
    #[serde(default)]
    pub valid_temp_observations: usize,
    pub ndbc_station: String,
    #[serde(default)]
    pub source_files: Vec<String>,
    pub note: String,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Climatology {
    /// DOY 1..=366 → median bølgehøyde (m)
    pub wave_height_doy: BTreeMap<u16, f64>,
    /// DOY 1..=366 → median vanntemperatur (°C)
    pub water_temp_doy: BTreeMap<u16, f64>,
    pub seasonal_defaults: SeasonalDefaults,
    pub metadata: ClimatologyMetadata,
}

/// Robust median; None for tom liste.
pub fn median(mut xs: Vec<f64>) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    xs.sort_by_key(|x| OrderedFloat(*x));
    let n = xs.len();
    Some(if n % 2 == 1 {
        xs[n / 2]
    } else {
        (xs[n / 2 - 1] + xs[n / 2]) / 2.0
    })
}

/// Median per DOY for verdiene som passerer `valid`.
fn doy_medians(
    records: &[BuoyRecord],
    value: impl Fn(&BuoyRecord) -> Option<f64>,
    valid: impl Fn(f64) -> bool,
) -> (BTreeMap<u16, f64>, usize) {
    let mut buckets: BTreeMap<u16, Vec<f64>> = BTreeMap::new();
    let mut used = 0usize;
    for r in records {
        if let Some(v) = value(r).filter(|v| valid(*v)) {
            buckets.entry(r.timestamp.ordinal() as u16).or_default().push(v);
            used += 1;
        }
    }
    let medians = buckets
        .into_iter()
        .filter_map(|(doy, vs)| median(vs).map(|m| (doy, m)))
        .collect();
    (medians, used)
}

/// Fyller alle DOY 1..=366: snitt av nærmeste før/etter, én nabo => den, ingen => default.
pub fn fill_gaps(observed: &BTreeMap<u16, f64>, default: f64) -> BTreeMap<u16, f64> {
    (1..=DAYS_IN_YEAR)
        .map(|doy| {
            if let Some(v) = observed.get(&doy) {
                return (doy, *v);
            }
            let before = observed.range(..doy).next_back().map(|(_, v)| *v);
            let after = observed.range(doy + 1..).next().map(|(_, v)| *v);
            let v = match (before, after) {
                (Some(b), Some(a)) => (b + a) / 2.0,
                (Some(b), None) => b,
                (None, Some(a)) => a,
                (None, None) => default,
            };
            (doy, v)
        })
        .collect()
}

impl Climatology {
    /// Bygger tabellen fra allerede innleste poster.
    pub fn from_records(records: &[BuoyRecord], station: &str, source_files: Vec<String>) -> Self {
        let (wave_obs, n_wave) = doy_medians(records, |r| r.wave_height, valid_wave_height);
        let (temp_obs, n_temp) = doy_medians(records, |r| r.water_temp, valid_water_temp);

        let time_range = records
            .iter()
            .map(|r| r.timestamp)
            .min()
            .zip(records.iter().map(|r| r.timestamp).max())
            .map(|(start, end)| TimeRange { start, end });

        info!(
            "🌊 Klimatologi: {} poster, {} DOY med bølgedata, {} DOY med temperatur",
            records.len(),
            wave_obs.len(),
            temp_obs.len()
        );

        Self {
            wave_height_doy: fill_gaps(&wave_obs, DEFAULT_WAVE_HEIGHT_M),
            water_temp_doy: fill_gaps(&temp_obs, DEFAULT_WATER_TEMP_C),
            seasonal_defaults: SeasonalDefaults::default(),
            metadata: ClimatologyMetadata {
                created: Utc::now(),
                ndbc_records: records.len(),
                valid_wave_observations: n_wave,
                valid_temp_observations: n_temp,
                ndbc_station: station.to_string(),
                source_files,
                note: "Wave buoy without anemometer: WVHT is used as the wind-wave proxy."
                    .to_string(),
                time_range,
            },
        }
    }

    /// Leser rådata-katalogen og bygger tabellen. Ingen poster => feil.
    pub fn build_from_dir(raw_dir: &Path, station: &str) -> Result<Self> {
        let load = load_ndbc_dir(raw_dir)?;
        if load.records.is_empty() {
            return Err(BlueGlowError::MissingArtifact {
                what: "NDBC buoy records",
                path: raw_dir.to_path_buf(),
                stage: "fetch",
            });
        }
        let files = load
            .files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        Ok(Self::from_records(&load.records, station, files))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let clim: Self = load_json(path, "climatology", "climatology")?;
        Ok(clim)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(self, path, "climatology")
    }

    pub fn wave_height(&self, doy: u16) -> f64 {
        self.wave_height_doy
            .get(&doy)
            .copied()
            .unwrap_or(DEFAULT_WAVE_HEIGHT_M)
    }

    pub fn water_temp(&self, doy: u16) -> f64 {
        self.water_temp_doy
            .get(&doy)
            .copied()
            .unwrap_or(DEFAULT_WATER_TEMP_C)
    }

    pub fn seasonal_sst(&self, month: u32) -> f64 {
        self.seasonal_defaults.sst.get(Season::from_month(month))
    }

    pub fn seasonal_chla(&self, month: u32) -> f64 {
        self.seasonal_defaults.chla.get(Season::from_month(month))
    }
}

// core/src/types.rs
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Location;
use crate::error::{BlueGlowError, Result};

// --- RoundTo trait (offentlig, brukt av forecast.rs og astronomy.rs) ---
pub trait RoundTo {
    fn round_to(self, dp: u32) -> f64;
}

impl RoundTo for f64 {
    #[inline]
    fn round_to(self, dp: u32) -> f64 {
        if dp == 0 {
            return self.round();
        }
        let factor = 10_f64.powi(dp as i32);
        (self * factor).round() / factor
    }
}

/// Parser "YYYY-MM-DD". Ugyldig dato gir valideringsfeil.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| BlueGlowError::validation(format!("malformed date {s:?}: {e}")))
}

// ──────────────────────────────────────────────────────────────────────────────
// Astronomi
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub noon: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoonState {
    pub illumination: f64,
    pub phase_name: String,
    pub is_dark_night: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TideState {
    pub high_tide_times: Vec<DateTime<Utc>>,
    pub low_tide_times: Vec<DateTime<Utc>>,
    pub current_level: f64,
    pub near_low_tide: bool,
}

/// Alle avledede sol/måne/tidevann-verdier for ett tidspunkt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstronomyFeatures {
    pub date: DateTime<Utc>,
    /// None ved midnattssol / mørketid.
    pub sun: Option<SunTimes>,
    pub moon: MoonState,
    pub tide: TideState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstronomySnapshot {
    pub location: Location,
    pub computed_at: DateTime<Utc>,
    pub forecast_days: Vec<AstronomyFeatures>,
}

// ──────────────────────────────────────────────────────────────────────────────
// Prognose-dokumenter (leses av den statiske nettsiden)
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Poor => "Poor",
            Rating::Fair => "Fair",
            Rating::Good => "Good",
            Rating::Excellent => "Excellent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoonConditions {
    pub phase: String,
    pub illumination: f64,
    pub dark_night: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TideConditions {
    pub level: f64,
    pub near_low_tide: bool,
    pub low_tide_times: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayConditions {
    pub moon: MoonConditions,
    pub tide: TideConditions,
    pub wave_height_m: f64,
    pub water_temp_c: f64,
}

/// Én dag i den daglige prognosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub score: u8,
    pub rating: Rating,
    pub conditions: DayConditions,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConditions {
    pub moon_illumination: f64,
    pub tide_level: f64,
    pub near_low_tide: bool,
    pub wave_height_m: f64,
    pub water_temp_c: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeslot {
    /// "HH:MM"
    pub time: String,
    pub datetime: DateTime<Utc>,
    pub score: u8,
    pub rating: Rating,
    pub is_night: bool,
    pub conditions: SlotConditions,
}

/// Én dag i den detaljerte prognosen (flere tidsluker per dag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedDayForecast {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub avg_score: u8,
    pub best_score: u8,
    pub best_time: String,
    pub timeslots: Vec<Timeslot>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search_window: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selection_method: String,
    pub features_used: Vec<String>,
    pub weak_supervision: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeslot_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeslots_per_day: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_window_avg: Option<f64>,
}

/// Første og siste dag i en periodeprognose (begge inklusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_days: usize,
}

/// Flat JSON-konvolutt rundt prognosene; `T` er daglig eller detaljert post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDocument<T> {
    pub generated_at: DateTime<Utc>,
    pub location: Location,
    pub model_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    pub note: String,
    pub forecasts: Vec<T>,
    pub metadata: ForecastMetadata,
}

/// Offline-oppslag: detaljerte dager nøklet på "YYYY-MM-DD".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDatabase {
    pub generated_at: DateTime<Utc>,
    pub location: Location,
    pub model_version: String,
    pub date_range: DateRange,
    pub forecasts: BTreeMap<NaiveDate, DetailedDayForecast>,
}

impl ForecastDatabase {
    pub fn get(&self, date: NaiveDate) -> Option<&DetailedDayForecast> {
        self.forecasts.get(&date)
    }
}

impl TryFrom<ForecastDocument<DetailedDayForecast>> for ForecastDatabase {
    type Error = BlueGlowError;

    fn try_from(doc: ForecastDocument<DetailedDayForecast>) -> Result<Self> {
        let date_range = doc
            .date_range
            .ok_or_else(|| BlueGlowError::validation("forecast document has no date_range"))?;
        Ok(Self {
            generated_at: doc.generated_at,
            location: doc.location,
            model_version: doc.model_version,
            date_range,
            forecasts: doc.forecasts.into_iter().map(|d| (d.date, d)).collect(),
        })
    }
}

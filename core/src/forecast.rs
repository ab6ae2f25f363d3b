// core/src/forecast.rs
//! Scoring av tidspunkter, ratingbøtter, anbefalinger og søk etter beste uke.
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use log::info;

use crate::astronomy::Astronomy;
use crate::climatology::Climatology;
use crate::config::{BlueGlowConfig, RatingThresholds};
use crate::error::{BlueGlowError, Result};
use crate::features::{feature_names, Environment, EnvironmentModel, FeatureVector, NightMode};
use crate::metrics;
use crate::model::TrainedModel;
use crate::types::{
    DailyForecast, DateRange, DayConditions, DetailedDayForecast, ForecastDatabase,
    ForecastDocument, ForecastMetadata, MoonConditions, Rating, RoundTo, SlotConditions, TideConditions, Timeslot,
};

// ──────────────────────────────────────────────────────────────────────────────
// Score og rating
// ──────────────────────────────────────────────────────────────────────────────

/// Sannsynlighet → heltallsscore 0–100 (avkortet, ikke avrundet).
pub fn score_from_probability(p: f64) -> u8 {
    if !p.is_finite() {
        return 0;
    }
    (p * 100.0).trunc().clamp(0.0, 100.0) as u8
}

impl RatingThresholds {
    /// Score >= terskel gir bøtta; alt under `fair` er Poor.
    pub fn rate(&self, score: u8) -> Rating {
        if score >= self.excellent {
            Rating::Excellent
        } else if score >= self.good {
            Rating::Good
        } else if score >= self.fair {
            Rating::Fair
        } else {
            Rating::Poor
        }
    }
}

pub fn score_features(model: &TrainedModel, features: &FeatureVector) -> Result<u8> {
    Ok(score_from_probability(model.predict_proba(features)?))
}

/// Score for ett tidspunkt gjennom den felles miljømodellen.
pub fn score_at(
    model: &TrainedModel,
    env: &dyn EnvironmentModel,
    t: DateTime<Utc>,
    night: NightMode,
) -> Result<(u8, FeatureVector)> {
    let features = env.features(t, night);
    let score = score_features(model, &features)?;
    Ok((score, features))
}

/// Glidende vindu: første start med strengt høyere snitt vinner (likhet beholder
/// den tidligste). None hvis serien er kortere enn vinduet.
pub fn best_window(values: &[f64], window: usize) -> Option<(usize, f64)> {
    if window == 0 || values.len() < window {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for start in 0..=values.len() - window {
        let mean = values[start..start + window].iter().sum::<f64>() / window as f64;
        match best {
            Some((_, b)) if mean <= b => {}
            _ => best = Some((start, mean)),
        }
    }
    best
}

// ──────────────────────────────────────────────────────────────────────────────
// Anbefalinger
// ──────────────────────────────────────────────────────────────────────────────

/// Tekst for daglig prognose. `illumination` brukes bare for Poor.
pub fn daily_recommendation(
    rating: Rating,
    illumination: f64,
    low_tide_times: &[DateTime<Utc>],
    bright_moon_threshold: f64,
) -> String {
    match rating {
        Rating::Excellent => {
            let when = low_tide_times
                .first()
                .map(|t| t.format("%H:%M UTC").to_string())
                .unwrap_or_else(|| "evening".to_string());
            format!("Excellent conditions! Best viewing during low tide at {when}.")
        }
        Rating::Good => {
            "Good conditions for bioluminescence viewing. Try visiting during low tide.".into()
        }
        Rating::Fair => {
            "Fair conditions. May see some bioluminescence, but not guaranteed.".into()
        }
        Rating::Poor if illumination > bright_moon_threshold => {
            "Poor conditions due to bright moonlight. Try a darker night.".into()
        }
        Rating::Poor => "Conditions are not ideal. Check back in a few days.".into(),
    }
}

/// Lavvann om natta først, deretter resten, hver gruppe i tidsrekkefølge.
pub fn night_low_tides_first(
    astronomy: &Astronomy,
    low_tide_times: &[DateTime<Utc>],
) -> Vec<DateTime<Utc>> {
    let (mut night, day): (Vec<_>, Vec<_>) = low_tide_times
        .iter()
        .copied()
        .partition(|t| astronomy.is_night(*t));
    night.extend(day);
    night
}

/// Første slot med høyest score (samme regel som `max` i en stabil sortering).
fn first_best<'s>(slots: impl Iterator<Item = &'s Timeslot>) -> Option<&'s Timeslot> {
    slots.fold(None::<&'s Timeslot>, |best, s| match best {
        Some(b) if s.score <= b.score => Some(b),
        _ => Some(s),
    })
}

/// Tekst for detaljert dag, basert på beste natt-slot.
pub fn detailed_recommendation(slots: &[Timeslot], thresholds: &RatingThresholds) -> String {
    match first_best(slots.iter().filter(|s| s.is_night)) {
        None => "No night-time slots available".to_string(),
        Some(best) if best.score >= thresholds.excellent => format!(
            "Best window: {} (score {}), night-time low tide window",
            best.time, best.score
        ),
        Some(best) if best.score >= thresholds.good => {
            format!("Recommended slot: {} (score {})", best.time, best.score)
        }
        Some(_) => "Conditions are average today, consider another date".to_string(),
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Prognosegenerator
// ──────────────────────────────────────────────────────────────────────────────

fn at_hour(date: NaiveDate, hour: u32) -> Result<DateTime<Utc>> {
    date.and_hms_opt(hour, 0, 0)
        .map(|n| n.and_utc())
        .ok_or_else(|| BlueGlowError::validation(format!("invalid hour {hour} on {date}")))
}

fn weekday_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

/// Scorer dager og tidsluker for én lokasjon med én modell.
pub struct Forecaster<'a> {
    cfg: &'a BlueGlowConfig,
    model: &'a TrainedModel,
    astronomy: &'a Astronomy,
    env: Environment<'a>,
}

impl<'a> Forecaster<'a> {
    pub fn new(
        cfg: &'a BlueGlowConfig,
        model: &'a TrainedModel,
        astronomy: &'a Astronomy,
        climatology: &'a Climatology,
    ) -> Self {
        Self {
            cfg,
            model,
            astronomy,
            env: Environment::new(astronomy, climatology),
        }
    }

    fn rating(&self, score: u8) -> Rating {
        self.cfg.rating.rate(score)
    }

    /// Én dag, scoret ved referansetimen med natt antatt.
    pub fn daily(&self, date: NaiveDate) -> Result<DailyForecast> {
        let t = at_hour(date, self.cfg.forecast.daily_reference_hour)?;
        let (score, features) = score_at(self.model, &self.env, t, NightMode::AssumeNight)?;
        metrics::record_scored(1);

        let astro = self.astronomy.compute_astronomy_features(t);
        let rating = self.rating(score);
        let recommendation = daily_recommendation(
            rating,
            features.moon_illumination,
            &night_low_tides_first(self.astronomy, &astro.tide.low_tide_times),
            self.cfg.forecast.bright_moon_threshold,
        );
        let mut low_tide_times = astro.tide.low_tide_times;
        low_tide_times.truncate(2);

        Ok(DailyForecast {
            date,
            day_of_week: weekday_name(date),
            score,
            rating,
            conditions: DayConditions {
                moon: MoonConditions {
                    phase: astro.moon.phase_name,
                    illumination: astro.moon.illumination,
                    dark_night: astro.moon.is_dark_night,
                },
                tide: TideConditions {
                    level: astro.tide.current_level,
                    near_low_tide: astro.tide.near_low_tide,
                    low_tide_times,
                },
                wave_height_m: features.wave_height.round_to(2),
                water_temp_c: features.water_temp.round_to(1),
            },
            recommendation,
        })
    }

    pub fn timeslot(&self, t: DateTime<Utc>) -> Result<Timeslot> {
        let (score, f) = score_at(self.model, &self.env, t, NightMode::FromSun)?;
        metrics::record_scored(1);
        Ok(Timeslot {
            time: t.format("%H:%M").to_string(),
            datetime: t,
            score,
            rating: self.rating(score),
            is_night: f.is_night,
            conditions: SlotConditions {
                moon_illumination: f.moon_illumination.round_to(3),
                tide_level: f.tide_level.round_to(3),
                near_low_tide: self
                    .astronomy
                    .is_near_low_tide(t, self.astronomy.cfg.low_tide_window_hours),
                wave_height_m: f.wave_height.round_to(2),
                water_temp_c: f.water_temp.round_to(1),
            },
        })
    }

    /// Én dag med tidsluker fra 00:00 UTC. Returnerer også det eksakte snittet
    /// som brukes i vindussøket.
    pub fn detailed(&self, date: NaiveDate) -> Result<(DetailedDayForecast, f64)> {
        let step = self.cfg.forecast.timeslot_hours.max(1);
        let timeslots = (0..24)
            .step_by(step as usize)
            .map(|h| at_hour(date, h).and_then(|t| self.timeslot(t)))
            .collect::<Result<Vec<_>>>()?;

        let mean = timeslots.iter().map(|s| f64::from(s.score)).sum::<f64>()
            / timeslots.len().max(1) as f64;
        let (best_score, best_time) = first_best(timeslots.iter())
            .map(|s| (s.score, s.time.clone()))
            .unwrap_or_default();
        let recommendation = detailed_recommendation(&timeslots, &self.cfg.rating);

        Ok((
            DetailedDayForecast {
                date,
                day_of_week: weekday_name(date),
                avg_score: mean.trunc() as u8,
                best_score,
                best_time,
                timeslots,
                recommendation,
            },
            mean,
        ))
    }

    fn dates(start: NaiveDate, n: usize) -> impl Iterator<Item = NaiveDate> {
        start.iter_days().take(n)
    }

    fn window_or_err(&self, values: &[f64]) -> Result<(usize, f64)> {
        let window = self.cfg.forecast.window_days;
        best_window(values, window).ok_or_else(|| {
            BlueGlowError::validation(format!(
                "horizon of {} days is shorter than the {window}-day window",
                values.len()
            ))
        })
    }

    fn metadata(&self) -> ForecastMetadata {
        let f = &self.cfg.forecast;
        ForecastMetadata {
            search_window: format!("{} days", f.horizon_days),
            selection_method: format!(
                "Highest average score for {} consecutive days",
                f.window_days
            ),
            features_used: feature_names(),
            weak_supervision: true,
            ..ForecastMetadata::default()
        }
    }

    fn document<T>(
        &self,
        forecast_type: Option<String>,
        note: String,
        forecasts: Vec<T>,
        metadata: ForecastMetadata,
    ) -> ForecastDocument<T> {
        ForecastDocument {
            generated_at: Utc::now(),
            location: self.astronomy.location.clone(),
            model_version: self.model.metadata.version.clone(),
            forecast_type,
            date_range: None,
            note,
            forecasts,
            metadata,
        }
    }

    /// Beste `window_days`-blokk av daglige prognoser innen horisonten.
    pub fn best_week_daily(&self, start: NaiveDate) -> Result<ForecastDocument<DailyForecast>> {
        let f = &self.cfg.forecast;
        info!(
            "🔍 Søker {} dager fra {start} etter beste {}-dagersvindu",
            f.horizon_days, f.window_days
        );
        let days = Self::dates(start, f.horizon_days)
            .map(|d| self.daily(d))
            .collect::<Result<Vec<_>>>()?;
        let scores: Vec<f64> = days.iter().map(|d| f64::from(d.score)).collect();
        let (best_start, best_avg) = self.window_or_err(&scores)?;

        info!(
            "✅ Beste uke starter {} (snitt {:.1}/100)",
            days[best_start].date, best_avg
        );
        let week: Vec<DailyForecast> = days
            .into_iter()
            .skip(best_start)
            .take(f.window_days)
            .collect();
        for d in &week {
            info!(
                "   {} {:<9}: {:3} | {:<9} | måne {:.2}",
                d.date, d.day_of_week, d.score, d.rating.as_str(), d.conditions.moon.illumination
            );
        }

        let mut metadata = self.metadata();
        metadata.best_window_avg = Some(best_avg.round_to(1));
        Ok(self.document(
            None,
            format!(
                "Best {}-day window selected from next {} days",
                f.window_days, f.horizon_days
            ),
            week,
            metadata,
        ))
    }

    /// Som `best_week_daily`, men med tidsluker og natt fra ekte solhendelser.
    pub fn best_week_detailed(
        &self,
        start: NaiveDate,
    ) -> Result<ForecastDocument<DetailedDayForecast>> {
        let f = &self.cfg.forecast;
        info!(
            "🔍 Søker {} dager fra {start} ({}-timers tidsluker)",
            f.horizon_days, f.timeslot_hours
        );
        let mut days = Vec::with_capacity(f.horizon_days);
        let mut means = Vec::with_capacity(f.horizon_days);
        for d in Self::dates(start, f.horizon_days) {
            let (day, mean) = self.detailed(d)?;
            days.push(day);
            means.push(mean);
        }
        let (best_start, best_avg) = self.window_or_err(&means)?;
        info!(
            "✅ Beste uke starter {} (snitt {:.1}/100)",
            days[best_start].date, best_avg
        );

        let week: Vec<DetailedDayForecast> = days
            .into_iter()
            .skip(best_start)
            .take(f.window_days)
            .collect();
        for d in &week {
            info!(
                "   {} {:<9}: snitt {:3} | best {:3} @ {}",
                d.date, d.day_of_week, d.avg_score, d.best_score, d.best_time
            );
        }

        let per_day = (24 / f.timeslot_hours.max(1)) as usize;
        let mut metadata = self.metadata();
        metadata.timeslot_interval = Some(format!("{} hours", f.timeslot_hours));
        metadata.timeslots_per_day = Some(per_day);
        metadata.best_window_avg = Some(best_avg.round_to(1));
        Ok(self.document(
            Some(format!(
                "{}-hour intervals ({} timeslots per day)",
                f.timeslot_hours, per_day
            )),
            format!(
                "Best {}-day window selected from next {} days",
                f.window_days, f.horizon_days
            ),
            week,
            metadata,
        ))
    }

    /// `n_days` påfølgende detaljerte dager fra `start`, uten vindussøk.
    pub fn detailed_range(
        &self,
        start: NaiveDate,
        n_days: usize,
    ) -> Result<ForecastDocument<DetailedDayForecast>> {
        if n_days == 0 {
            return Err(BlueGlowError::validation("n_days must be >= 1"));
        }
        let end = start
            .checked_add_days(Days::new(n_days as u64 - 1))
            .ok_or_else(|| {
                BlueGlowError::validation(format!("{n_days} days from {start} overflows"))
            })?;
        info!("📅 Detaljert prognose {start} → {end} ({n_days} dager)");

        let mut days = Vec::with_capacity(n_days);
        for d in Self::dates(start, n_days) {
            let (day, _) = self.detailed(d)?;
            if day.date.day() == 1 {
                info!(
                    "   {} | snitt {:3} | best {:3} @ {}",
                    day.date, day.avg_score, day.best_score, day.best_time
                );
            }
            days.push(day);
        }

        let f = &self.cfg.forecast;
        let per_day = (24 / f.timeslot_hours.max(1)) as usize;
        let metadata = ForecastMetadata {
            timeslot_interval: Some(format!("{} hours", f.timeslot_hours)),
            timeslots_per_day: Some(per_day),
            features_used: feature_names(),
            weak_supervision: true,
            ..ForecastMetadata::default()
        };
        let mut doc = self.document(
            Some(format!(
                "{}-hour intervals ({} timeslots per day)",
                f.timeslot_hours, per_day
            )),
            format!("{n_days}-day forecast from {start}"),
            days,
            metadata,
        );
        doc.date_range = Some(DateRange {
            start,
            end,
            total_days: n_days,
        });
        Ok(doc)
    }

    /// Samme dager som `detailed_range`, nøklet på dato for oppslag.
    pub fn database(&self, start: NaiveDate, n_days: usize) -> Result<ForecastDatabase> {
        let db = ForecastDatabase::try_from(self.detailed_range(start, n_days)?)?;
        info!("🗄️ Prognosedatabase med {} datoer", db.forecasts.len());
        Ok(db)
    }

    /// De neste `next_days` dagene fra `start`, uten vindussøk.
    pub fn next_days(&self, start: NaiveDate) -> Result<ForecastDocument<DailyForecast>> {
        let n = self.cfg.forecast.next_days;
        let days = Self::dates(start, n)
            .map(|d| self.daily(d))
            .collect::<Result<Vec<_>>>()?;
        for d in &days {
            info!(
                "   {} {:<9} | score {:3}/100 | {:<9} | måne {:.2}",
                d.date, d.day_of_week, d.score, d.rating.as_str(), d.conditions.moon.illumination
            );
        }
        let metadata = ForecastMetadata {
            features_used: self.model.feature_names.clone(),
            weak_supervision: true,
            ..ForecastMetadata::default()
        };
        Ok(self.document(
            None,
            "Forecast based on climatology + astronomy. Will improve with real-time SST/Chl-a data."
                .to_string(),
            days,
            metadata,
        ))
    }
}

/// Startdato for prognoser: dagens UTC-dato.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

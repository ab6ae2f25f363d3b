// core/src/astronomy.rs
//! Sol, måne og tidevann for en fast lokasjon.
//!
//! Alt her er rene funksjoner av tidspunkt + konfig. Tidevannet er en ren
//! cosinus med M2-perioden forankret i et referanse-høyvann; det er godt nok
//! som feature for en klassifikator, ikke som navigasjonstabell.
use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::config::{AstronomyConfig, BlueGlowConfig, Location};
use crate::error::{BlueGlowError, Result};
use crate::types::{
    AstronomyFeatures, AstronomySnapshot, MoonState, RoundTo, SunTimes, TideState,
};

/// Månefase-skalaen går 0..28 (0 = nymåne, 14 = fullmåne).
pub const MOON_CYCLE: f64 = 28.0;

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

#[inline]
fn proper_angle(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Juliansk dag for et UTC-tidspunkt (inkl. døgnbrøk).
pub fn julian_day(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 86_400_000.0 + UNIX_EPOCH_JD
}

fn from_julian_day(jd: f64) -> Result<DateTime<Utc>> {
    let ms = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round() as i64;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| BlueGlowError::validation(format!("julian day {jd} out of range")))
}

fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * 3_600_000.0).round() as i64)
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Månens alder på 0..28-skala, fra elongasjonen måne–sol
/// (avkortet månerekke: D, M, M').
pub fn moon_phase(t: DateTime<Utc>) -> f64 {
    let jd = julian_day(t);
    // grov ΔT-korreksjon (dager)
    let dt = (jd - 2_382_148.0).powi(2) / (41_048_480.0 * 86_400.0);
    let tc = (jd + dt - J2000) / 36_525.0;
    let t2 = tc * tc;
    let t3 = t2 * tc;

    let d = proper_angle(297.85 + 445_267.1115 * tc - 0.001_630_0 * t2 + t3 / 545_868.0);
    let m = proper_angle(357.53 + 35_999.0503 * tc);
    let m1 = proper_angle(134.96 + 477_198.8676 * tc + 0.008_997_0 * t2 + t3 / 69_699.0);

    let elong = d + 6.29 * m1.to_radians().sin() - 2.10 * m.to_radians().sin()
        + 1.27 * (2.0 * d - m1).to_radians().sin()
        + 0.66 * (2.0 * d).to_radians().sin();
    let elong = proper_angle(elong);

    (((elong + 6.43) / 360.0) * MOON_CYCLE).rem_euclid(MOON_CYCLE)
}

/// Trekantmapping fase → belysning: 1 ved fase 14, 0 ved 0 og 28.
pub fn illumination_from_phase(phase: f64) -> f64 {
    let half = MOON_CYCLE / 2.0;
    (1.0 - (phase - half).abs() / half).clamp(0.0, 1.0)
}

pub fn moon_illumination(t: DateTime<Utc>) -> f64 {
    illumination_from_phase(moon_phase(t))
}

pub fn moon_phase_name(illumination: f64) -> &'static str {
    if illumination < 0.1 {
        "New Moon"
    } else if illumination < 0.4 {
        "Crescent"
    } else if illumination < 0.6 {
        "Quarter"
    } else if illumination < 0.9 {
        "Gibbous"
    } else {
        "Full Moon"
    }
}

#[derive(Debug, Clone)]
pub struct Tides {
    pub high_times: Vec<DateTime<Utc>>,
    pub low_times: Vec<DateTime<Utc>>,
    pub current_level: f64,
}

/// Utfallet av soloppgangs-ligningen for én dato.
#[derive(Debug, Clone, PartialEq)]
pub enum SolarDay {
    Normal(SunTimes),
    /// Sola går ikke ned (midnattssol).
    AlwaysUp,
    /// Sola står ikke opp (mørketid).
    AlwaysDown,
}

/// Astronomi-kalkulator for én fast observatør.
#[derive(Debug, Clone)]
pub struct Astronomy {
    pub location: Location,
    pub cfg: AstronomyConfig,
}

impl Astronomy {
    pub fn new(location: Location, cfg: AstronomyConfig) -> Self {
        Self { location, cfg }
    }

    pub fn from_config(cfg: &BlueGlowConfig) -> Self {
        Self::new(cfg.location.clone(), cfg.astronomy.clone())
    }

    pub fn is_dark_night(&self, t: DateTime<Utc>) -> bool {
        moon_illumination(t) < self.cfg.dark_threshold
    }

    fn hours_since_reference(&self, t: DateTime<Utc>) -> f64 {
        (t - self.cfg.tide_reference).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Tidevannsnivå i [-1, 1]; 1 = høyvann, -1 = lavvann.
    pub fn tide_level(&self, t: DateTime<Utc>) -> f64 {
        let phase = self.hours_since_reference(t) / self.cfg.tide_period_hours * 2.0 * PI;
        phase.cos()
    }

    /// Høy- og lavvann innen UTC-døgnet `date` (maks to av hver).
    pub fn tide_extremes(&self, date: NaiveDate) -> (Vec<DateTime<Utc>>, Vec<DateTime<Utc>>) {
        let period = self.cfg.tide_period_hours;
        let start = day_start(date);
        let end = start + Duration::days(1);

        // siste høyvann ved eller før midnatt
        let k = (self.hours_since_reference(start) / period).floor();
        let mut highs = Vec::with_capacity(2);
        let mut lows = Vec::with_capacity(2);
        let mut step = 0u32;
        loop {
            let h = k * period + f64::from(step) * period / 2.0;
            let t = self.cfg.tide_reference + hours(h);
            if t >= end {
                break;
            }
            if t >= start {
                if step % 2 == 0 {
                    highs.push(t);
                } else {
                    lows.push(t);
                }
            }
            step += 1;
        }
        highs.truncate(2);
        lows.truncate(2);
        (highs, lows)
    }

    pub fn compute_tides(&self, t: DateTime<Utc>) -> Tides {
        let (high_times, low_times) = self.tide_extremes(t.date_naive());
        Tides {
            high_times,
            low_times,
            current_level: self.tide_level(t),
        }
    }

    pub fn is_near_low_tide(&self, t: DateTime<Utc>, window_hours: f64) -> bool {
        let (_, lows) = self.tide_extremes(t.date_naive());
        lows.iter().any(|low| {
            let diff = (t - *low).num_milliseconds().abs() as f64 / 3_600_000.0;
            diff <= window_hours
        })
    }

    /// Soloppgangs-ligningen (høyde -0.833° for refraksjon + solradius).
    pub fn solar_day(&self, date: NaiveDate) -> Result<SolarDay> {
        let j2000_date = NaiveDate::from_ymd_opt(2000, 1, 1)
            .ok_or_else(|| BlueGlowError::validation("J2000 date"))?;
        let n = (date - j2000_date).num_days() as f64;
        let j_star = n - self.location.lon / 360.0;

        let m = proper_angle(357.5291 + 0.985_600_28 * j_star);
        let m_rad = m.to_radians();
        let c = 1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin() + 0.0003 * (3.0 * m_rad).sin();
        let lambda = proper_angle(m + c + 180.0 + 102.9372).to_radians();
        let j_transit = J2000 + j_star + 0.0053 * m_rad.sin() - 0.0069 * (2.0 * lambda).sin();

        let sin_decl = lambda.sin() * 23.4397_f64.to_radians().sin();
        let cos_decl = (1.0 - sin_decl * sin_decl).sqrt();
        let phi = self.location.lat.to_radians();
        let cos_omega =
            ((-0.833_f64).to_radians().sin() - phi.sin() * sin_decl) / (phi.cos() * cos_decl);

        if cos_omega < -1.0 {
            return Ok(SolarDay::AlwaysUp);
        }
        if cos_omega > 1.0 {
            return Ok(SolarDay::AlwaysDown);
        }
        let omega_days = cos_omega.acos().to_degrees() / 360.0;
        Ok(SolarDay::Normal(SunTimes {
            sunrise: from_julian_day(j_transit - omega_days)?,
            sunset: from_julian_day(j_transit + omega_days)?,
            noon: from_julian_day(j_transit)?,
        }))
    }

    pub fn sun_events(&self, date: NaiveDate) -> Result<SunTimes> {
        match self.solar_day(date)? {
            SolarDay::Normal(s) => Ok(s),
            SolarDay::AlwaysUp | SolarDay::AlwaysDown => Err(BlueGlowError::validation(format!(
                "no sunrise/sunset on {date} at lat {:.2}",
                self.location.lat
            ))),
        }
    }

    /// Natt = ikke mellom soloppgang og solnedgang for noe soldøgn.
    /// Sjekker nabodatoene også, siden solnedgang vest for Greenwich
    /// ofte havner etter UTC-midnatt.
    pub fn is_night(&self, t: DateTime<Utc>) -> bool {
        let date = t.date_naive();
        for d in [date.pred_opt(), Some(date), date.succ_opt()].into_iter().flatten() {
            match self.solar_day(d) {
                Ok(SolarDay::Normal(s)) if s.sunrise <= t && t <= s.sunset => return false,
                Ok(SolarDay::AlwaysUp) if d == date => return false,
                _ => {}
            }
        }
        true
    }

    pub fn compute_astronomy_features(&self, t: DateTime<Utc>) -> AstronomyFeatures {
        let illumination = moon_illumination(t);
        let tides = self.compute_tides(t);
        let sun = match self.solar_day(t.date_naive()) {
            Ok(SolarDay::Normal(s)) => Some(s),
            _ => None,
        };
        AstronomyFeatures {
            date: t,
            sun,
            moon: MoonState {
                illumination: illumination.round_to(3),
                phase_name: moon_phase_name(illumination).to_string(),
                is_dark_night: illumination < self.cfg.dark_threshold,
            },
            tide: TideState {
                high_tide_times: tides.high_times,
                low_tide_times: tides.low_times,
                current_level: tides.current_level.round_to(3),
                near_low_tide: self.is_near_low_tide(t, self.cfg.low_tide_window_hours),
            },
        }
    }

    /// N dager fra `start` (kl. 12 UTC hver dag), for cache-fila.
    pub fn snapshot(&self, start: NaiveDate, n_days: usize) -> AstronomySnapshot {
        let forecast_days = start
            .iter_days()
            .take(n_days)
            .map(|d| self.compute_astronomy_features(day_start(d) + Duration::hours(12)))
            .collect();
        AstronomySnapshot {
            location: self.location.clone(),
            computed_at: Utc::now(),
            forecast_days,
        }
    }
}

/// Sesongkoding: sin(2π·doy/365).
pub fn season_sin(t: DateTime<Utc>) -> f64 {
    (2.0 * PI * f64::from(t.ordinal()) / 365.0).sin()
}

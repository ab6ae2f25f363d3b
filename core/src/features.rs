// core/src/features.rs
//! Kanonisk feature-modell, delt av trening og scoring.
//!
//! Både syntetiske treningssampler og ekte prognoser bygger features gjennom
//! [`EnvironmentModel::features`], så det finnes kun én måne/tidevann-formel.
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::astronomy::{moon_illumination, season_sin, Astronomy};
use crate::climatology::Climatology;
use crate::error::{BlueGlowError, Result};

/// Autoritativ rekkefølge. Modellen lagrer denne listen og valideres mot den.
pub const FEATURE_NAMES: [&str; 6] = [
    "moon_illumination",
    "is_night",
    "tide_level",
    "wave_height",
    "water_temp",
    "season_sin",
];

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Navngitte features for ett tidspunkt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub moon_illumination: f64,
    pub is_night: bool,
    pub tide_level: f64,
    pub wave_height: f64,
    pub water_temp: f64,
    pub season_sin: f64,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        Some(match name {
            "moon_illumination" => self.moon_illumination,
            "is_night" => {
                if self.is_night {
                    1.0
                } else {
                    0.0
                }
            }
            "tide_level" => self.tide_level,
            "wave_height" => self.wave_height,
            "water_temp" => self.water_temp,
            "season_sin" => self.season_sin,
            _ => return None,
        })
    }

    /// Projiserer til posisjonell vektor i modellens deklarerte rekkefølge.
    pub fn to_ordered(&self, names: &[String]) -> Result<Vec<f64>> {
        names
            .iter()
            .map(|n| {
                self.get(n).ok_or_else(|| BlueGlowError::FeatureContract {
                    model: names.to_vec(),
                    expected: feature_names(),
                })
            })
            .collect()
    }
}

/// Modellens feature-liste må være nøyaktig [`FEATURE_NAMES`], i samme rekkefølge.
pub fn validate_feature_names(names: &[String]) -> Result<()> {
    if names.len() != FEATURE_NAMES.len() || names.iter().zip(FEATURE_NAMES).any(|(a, b)| a != b)
    {
        return Err(BlueGlowError::FeatureContract {
            model: names.to_vec(),
            expected: feature_names(),
        });
    }
    Ok(())
}

/// Hvordan natt-flagget settes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightMode {
    /// Daglig prognose: vi spår nattforhold, is_night = 1.
    AssumeNight,
    /// Fra ekte soloppgang/solnedgang.
    FromSun,
}

pub trait EnvironmentModel {
    fn moon_illumination(&self, t: DateTime<Utc>) -> f64;
    fn is_night(&self, t: DateTime<Utc>) -> bool;
    fn tide_level(&self, t: DateTime<Utc>) -> f64;
    fn wave_height(&self, doy: u16) -> f64;
    fn water_temp(&self, doy: u16) -> f64;

    fn features(&self, t: DateTime<Utc>, night: NightMode) -> FeatureVector {
        let doy = t.ordinal() as u16;
        FeatureVector {
            moon_illumination: self.moon_illumination(t),
            is_night: match night {
                NightMode::AssumeNight => true,
                NightMode::FromSun => self.is_night(t),
            },
            tide_level: self.tide_level(t),
            wave_height: self.wave_height(doy),
            water_temp: self.water_temp(doy),
            season_sin: season_sin(t),
        }
    }
}

/// Astronomi + klimatologi = miljømodellen som brukes overalt.
#[derive(Debug, Clone, Copy)]
pub struct Environment<'a> {
    pub astronomy: &'a Astronomy,
    pub climatology: &'a Climatology,
}

impl<'a> Environment<'a> {
    pub fn new(astronomy: &'a Astronomy, climatology: &'a Climatology) -> Self {
        Self {
            astronomy,
            climatology,
        }
    }
}

impl EnvironmentModel for Environment<'_> {
    fn moon_illumination(&self, t: DateTime<Utc>) -> f64 {
        moon_illumination(t)
    }

    fn is_night(&self, t: DateTime<Utc>) -> bool {
        self.astronomy.is_night(t)
    }

    fn tide_level(&self, t: DateTime<Utc>) -> f64 {
        self.astronomy.tide_level(t)
    }

    fn wave_height(&self, doy: u16) -> f64 {
        self.climatology.wave_height(doy)
    }

    fn water_temp(&self, doy: u16) -> f64 {
        self.climatology.water_temp(doy)
    }
}

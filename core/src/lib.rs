// core/src/lib.rs
//! BlueGlow: prognose for morild (bioluminescens) ved La Jolla Shores.
//!
//! Astronomi og tidevann + bøyeklimatologi → svak supervisjon → logistisk
//! regresjon → daglige og detaljerte prognosedokumenter for nettsiden.

pub mod astronomy;
pub mod buoy;
pub mod climatology;
pub mod config;
pub mod error;
pub mod features;
pub mod fetch;
pub mod forecast;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod storage;
pub mod training;
pub mod types;

#[cfg(feature = "python")]
mod py;

pub use astronomy::{Astronomy, SolarDay};
pub use climatology::Climatology;
pub use config::BlueGlowConfig;
pub use error::{BlueGlowError, Result};
pub use features::{Environment, EnvironmentModel, FeatureVector, NightMode};
pub use forecast::Forecaster;
pub use model::TrainedModel;
pub use types::*;

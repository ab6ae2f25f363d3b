// core/src/py/mod.rs
//! PyO3-bindinger for Streamlit-siden. Alt går inn og ut som JSON-strenger.
use std::path::{Path, PathBuf};

use pyo3::exceptions::{PyFileNotFoundError, PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::astronomy::Astronomy;
use crate::config::BlueGlowConfig;
use crate::error::BlueGlowError;
use crate::features::{Environment, NightMode};
use crate::forecast::{score_at, today_utc};
use crate::pipeline::{
    forecast_daily, forecast_detailed, forecast_next_days, forecast_range, Artifacts,
};
use crate::types::parse_date;

const DEFAULT_CONFIG: &str = "blueglow.toml";

// ──────────────────────────────────────────────────────────────────────────────
// Hjelpere
// ──────────────────────────────────────────────────────────────────────────────

fn to_py_err(e: BlueGlowError) -> PyErr {
    match e {
        BlueGlowError::MissingArtifact { .. } => PyFileNotFoundError::new_err(e.to_string()),
        BlueGlowError::Io { .. } | BlueGlowError::Fetch { .. } => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn load_config(config_path: Option<&str>) -> PyResult<BlueGlowConfig> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    BlueGlowConfig::load(Path::new(&path)).map_err(to_py_err)
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(format!("serialize: {e}")))
}

// ──────────────────────────────────────────────────────────────────────────────
// PyO3-funksjoner
// ──────────────────────────────────────────────────────────────────────────────

/// mode: "best_week" (standard), "detailed", "next7" eller "year".
#[pyfunction]
#[pyo3(signature = (config_path=None, start=None, mode="best_week"))]
fn forecast_json(config_path: Option<&str>, start: Option<&str>, mode: &str) -> PyResult<String> {
    let cfg = load_config(config_path)?;
    let start = match start {
        Some(s) => parse_date(s).map_err(to_py_err)?,
        None => today_utc(),
    };
    let artifacts = Artifacts::load(&cfg).map_err(to_py_err)?;
    match mode {
        "best_week" => to_json(&forecast_daily(&cfg, &artifacts, start).map_err(to_py_err)?),
        "detailed" => to_json(&forecast_detailed(&cfg, &artifacts, start).map_err(to_py_err)?),
        "next7" => to_json(&forecast_next_days(&cfg, &artifacts, start).map_err(to_py_err)?),
        "year" => to_json(
            &forecast_range(&cfg, &artifacts, start, cfg.forecast.year_days).map_err(to_py_err)?,
        ),
        other => Err(PyValueError::new_err(format!(
            "unknown mode {other:?}, expected best_week|detailed|next7|year"
        ))),
    }
}

/// Astronomi-snapshot for `n_days` dager fra `start` (kl. 12 UTC).
#[pyfunction]
#[pyo3(signature = (start, n_days=7, config_path=None))]
fn astronomy_json(start: &str, n_days: usize, config_path: Option<&str>) -> PyResult<String> {
    let cfg = load_config(config_path)?;
    let start = parse_date(start).map_err(to_py_err)?;
    to_json(&Astronomy::from_config(&cfg).snapshot(start, n_days))
}

/// Score 0–100 for et RFC3339-tidspunkt. `assume_night` følger daglig modus.
#[pyfunction]
#[pyo3(signature = (datetime, assume_night=false, config_path=None))]
fn score_datetime(datetime: &str, assume_night: bool, config_path: Option<&str>) -> PyResult<u8> {
    let cfg = load_config(config_path)?;
    let t = chrono::DateTime::parse_from_rfc3339(datetime.trim())
        .map_err(|e| PyValueError::new_err(format!("malformed datetime {datetime:?}: {e}")))?
        .with_timezone(&chrono::Utc);
    let artifacts = Artifacts::load(&cfg).map_err(to_py_err)?;
    let astronomy = Astronomy::from_config(&cfg);
    let env = Environment::new(&astronomy, &artifacts.climatology);
    let night = if assume_night {
        NightMode::AssumeNight
    } else {
        NightMode::FromSun
    };
    let (score, _) = score_at(&artifacts.model, &env, t, night).map_err(to_py_err)?;
    Ok(score)
}

// ──────────────────────────────────────────────────────────────────────────────
// PyO3-MODUL
// ──────────────────────────────────────────────────────────────────────────────

#[pymodule]
fn blueglow_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(forecast_json, m)?)?;
    m.add_function(wrap_pyfunction!(astronomy_json, m)?)?;
    m.add_function(wrap_pyfunction!(score_datetime, m)?)?;
    Ok(())
}

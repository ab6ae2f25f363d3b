// core/src/model.rs
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BlueGlowError, Result};
use crate::features::{validate_feature_names, FeatureVector};
use crate::storage::{load_json, save_json};

pub const MODEL_TYPE: &str = "LogisticRegression";

#[inline]
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Evaluering på holdt-ut split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evaluation {
    pub low: ClassReport,
    pub high: ClassReport,
    pub accuracy: f64,
    pub roc_auc: Option<f64>,
    pub train_size: usize,
    pub test_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub version: String,
    pub n_samples: usize,
    pub positive_rate: f64,
    pub seed: u64,
    pub iterations: usize,
    pub converged: bool,
    pub evaluation: Evaluation,
    pub note: String,
}

/// Tilpasset logistisk regresjon + feature-kontrakten den ble trent med.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model_type: String,
    pub intercept: f64,
    /// Samme rekkefølge som `feature_names`.
    pub coefficients: Vec<f64>,
    pub feature_names: Vec<String>,
    pub metadata: ModelMetadata,
}

impl TrainedModel {
    /// Sjekker feature-kontrakten; kalles ved lasting, før noe scores.
    pub fn validate(&self) -> Result<()> {
        if self.model_type != MODEL_TYPE {
            return Err(BlueGlowError::validation(format!(
                "unsupported model_type {:?}",
                self.model_type
            )));
        }
        validate_feature_names(&self.feature_names)?;
        if self.coefficients.len() != self.feature_names.len() {
            return Err(BlueGlowError::validation(format!(
                "model has {} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(BlueGlowError::validation("model has non-finite coefficients"));
        }
        Ok(())
    }

    pub fn decision(&self, x: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }

    /// P(label = 1) for en navngitt feature-vektor.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        let x = features.to_ordered(&self.feature_names)?;
        Ok(sigmoid(self.decision(&x)))
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.coefficients[i])
    }

    pub fn load(path: &Path) -> Result<Self> {
        let model: Self = load_json(path, "model", "train")?;
        model.validate()?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        save_json(self, path, "model")
    }
}

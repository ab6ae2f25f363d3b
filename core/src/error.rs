// core/src/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// Felles feiltype for hele pipeline-kjeden.
#[derive(Debug, Error)]
pub enum BlueGlowError {
    /// Et artefakt fra et tidligere steg mangler (klimatologi, modell, rådata).
    #[error("missing {what} at {path}: run the `{stage}` stage first")]
    MissingArtifact {
        what: &'static str,
        path: PathBuf,
        stage: &'static str,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON-feil med sti til feltet som feilet (serde_path_to_error).
    #[error("JSON error in {path} at `{field}`: {message}")]
    Json {
        path: PathBuf,
        field: String,
        message: String,
    },

    #[error("config error in {path} at `{field}`: {message}")]
    Config {
        path: PathBuf,
        field: String,
        message: String,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid input: {0}")]
    Validation(String),

    /// Modellens feature-liste matcher ikke scorerens feature-sett.
    #[error("feature contract mismatch: model declares {model:?}, scorer expects {expected:?}")]
    FeatureContract {
        model: Vec<String>,
        expected: Vec<String>,
    },

    #[error("training failed: {0}")]
    Training(String),

    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BlueGlowError>;

impl BlueGlowError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

// core/src/storage.rs
use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BlueGlowError, Result};

/// Leser et JSON-artefakt fra disk.
/// Mangler filen, er det en feil som peker på steget som lager den.
pub fn load_json<T: DeserializeOwned>(
    path: &Path,
    what: &'static str,
    stage: &'static str,
) -> Result<T> {
    if !path.exists() {
        return Err(BlueGlowError::MissingArtifact {
            what,
            path: path.to_path_buf(),
            stage,
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| BlueGlowError::io(path, e))?;
    let mut de = serde_json::Deserializer::from_str(&contents);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|e| BlueGlowError::Json {
        path: path.to_path_buf(),
        field: e.path().to_string(),
        message: e.inner().to_string(),
    })?;
    info!("📂 {} lastet fra {}", what, path.display());
    Ok(value)
}

/// Lagrer som JSON (pretty-print). Oppretter manglende kataloger.
pub fn save_json<T: Serialize>(value: &T, path: &Path, what: &'static str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| BlueGlowError::io(parent, e))?;
        }
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| BlueGlowError::Json {
        path: path.to_path_buf(),
        field: String::new(),
        message: e.to_string(),
    })?;
    std::fs::write(path, &json).map_err(|e| BlueGlowError::io(path, e))?;
    info!(
        "✅ {} lagret til {} ({} bytes)",
        what,
        path.display(),
        json.len()
    );
    Ok(())
}

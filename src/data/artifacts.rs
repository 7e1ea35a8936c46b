//! Persisted model bundle
//!
//! A bundle is a directory with three JSON artifacts: the forest, the scaler
//! and the ordered feature-name list. Bundles are staged in a sibling
//! directory and published with a rename, so readers never see a mix of old
//! and new artifacts.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{RandomForest, StandardScaler};
use crate::{MatchError, Result};

pub const MODEL_FILE: &str = "matching_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURES_FILE: &str = "features.json";

/// Everything a predictor needs, versioned together
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedModel {
    pub forest: RandomForest,
    pub scaler: StandardScaler,
    /// Feature names in the column order the scaler and forest were fitted on
    pub feature_names: Vec<String>,
}

/// Directory-backed store for a single model bundle
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        ArtifactStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.dir
    }

    /// True when all three artifacts are present
    pub fn exists(&self) -> bool {
        [MODEL_FILE, SCALER_FILE, FEATURES_FILE]
            .iter()
            .all(|f| self.dir.join(f).is_file())
    }

    /// Write the bundle and publish it in one step
    pub fn save(&self, model: &PersistedModel) -> Result<()> {
        let staging = self.sibling("staging")?;
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        if let Err(e) = Self::stage(&staging, model) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if let Err(e) = self.publish(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        log::info!("Saved model bundle to {}", self.dir.display());
        Ok(())
    }

    /// Read all three artifacts
    pub fn load(&self) -> Result<PersistedModel> {
        if !self.dir.is_dir() {
            return Err(MatchError::ModelNotFound(format!(
                "{} (no model trained yet, run `internmatch train` first)",
                self.dir.display()
            )));
        }

        let forest: RandomForest = self.read_artifact(MODEL_FILE)?;
        let scaler: StandardScaler = self.read_artifact(SCALER_FILE)?;
        let feature_names: Vec<String> = self.read_artifact(FEATURES_FILE)?;

        log::debug!(
            "Loaded model bundle from {} ({} features)",
            self.dir.display(),
            feature_names.len()
        );

        Ok(PersistedModel {
            forest,
            scaler,
            feature_names,
        })
    }

    fn stage(staging: &Path, model: &PersistedModel) -> Result<()> {
        fs::create_dir_all(staging)?;
        write_json(&staging.join(MODEL_FILE), &model.forest)?;
        write_json(&staging.join(SCALER_FILE), &model.scaler)?;
        write_json(&staging.join(FEATURES_FILE), &model.feature_names)?;
        Ok(())
    }

    /// Swap the staged directory into place, keeping the old bundle until
    /// the new one is live
    fn publish(&self, staging: &Path) -> Result<()> {
        if !self.dir.exists() {
            return Ok(fs::rename(staging, &self.dir)?);
        }

        let previous = self.sibling("previous")?;
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        fs::rename(&self.dir, &previous)?;

        if let Err(e) = fs::rename(staging, &self.dir) {
            // Put the old bundle back
            fs::rename(&previous, &self.dir)?;
            return Err(e.into());
        }

        if let Err(e) = fs::remove_dir_all(&previous) {
            log::warn!("Could not remove old bundle {}: {}", previous.display(), e);
        }
        Ok(())
    }

    /// Hidden directory next to the model dir, created on demand
    fn sibling(&self, tag: &str) -> Result<PathBuf> {
        let name = self.dir.file_name().ok_or_else(|| {
            MatchError::InvalidInput(format!(
                "model directory must end in a directory name: {}",
                self.dir.display()
            ))
        })?;
        let parent = match self.dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        Ok(parent.join(format!(
            ".{}.{}-{}",
            name.to_string_lossy(),
            tag,
            std::process::id()
        )))
    }

    fn read_artifact<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.dir.join(file);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MatchError::ModelNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec(value)?;
    let mut file = File::create(path)?;
    file.write_all(&data)?;
    file.flush()?;
    file.sync_all()?;
    log::debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

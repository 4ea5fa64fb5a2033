use crate::{
    error::{MorphoError, Result},
    store::DATABASE_ENV,
    verification::{BioStateValidator, Calibration, DEFAULT_BLUR_SIGMA},
};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const CONFIG_ENV: &str = "MORPHOLANG_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphoConfig {
    /// Subroutine database; `None` uses the standard resolution order.
    pub database_path: Option<String>,
    /// Dye calibration used when converting images to Vmem.
    pub calibration: Calibration,
    /// Gaussian sigma applied before conversion; 0 disables denoising.
    pub blur_sigma: f32,
}

impl Default for MorphoConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            calibration: Calibration::default(),
            blur_sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

impl MorphoConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            MorphoError::Config(format!("Could not read config '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            MorphoError::Config(format!("Could not parse config '{}': {e}", path.display()))
        })
    }

    /// Explicit path, then `MORPHOLANG_CONFIG`, then defaults. The
    /// `MORPHOLANG_DATABASE` variable overrides the configured database.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path.map(str::to_string).or_else(|| env::var(CONFIG_ENV).ok()) {
            Some(path) if !path.trim().is_empty() => Self::from_json_file(path.trim())?,
            _ => Self::default(),
        };
        if let Ok(db) = env::var(DATABASE_ENV) {
            if !db.trim().is_empty() {
                config.database_path = Some(db.trim().to_string());
            }
        }
        Ok(config)
    }

    pub fn validator(&self) -> BioStateValidator {
        BioStateValidator::new(self.calibration).with_blur_sigma(self.blur_sigma)
    }
}

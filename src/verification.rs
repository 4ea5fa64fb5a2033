//! Voltage-dye image analysis and target-state verification.
//!
//! Fluorescence intensity is mapped to membrane voltage with a fixed linear
//! calibration, `Vmem = intensity * slope + intercept`. Calibration values
//! come from configuration; they are never fitted here.

use crate::error::{MorphoError, Result};
use image::{GrayImage, imageops};
use morpho_protocol::{BioelectricState, VmemRange};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_BLUR_SIGMA: f32 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            slope: -0.5,
            intercept: -20.0,
        }
    }
}

impl Calibration {
    pub fn to_vmem(&self, intensity: f64) -> f64 {
        intensity * self.slope + self.intercept
    }

    pub fn intensity_for(&self, vmem: f64) -> Option<f64> {
        if self.slope == 0.0 {
            return None;
        }
        Some((vmem - self.intercept) / self.slope)
    }
}

/// Row-major grid of membrane voltages in mV.
#[derive(Debug, Clone, PartialEq)]
pub struct VmemMap {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl VmemMap {
    pub fn from_values(width: usize, height: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != width * height {
            return Err(MorphoError::InvalidInput(format!(
                "expected {} voltage samples for a {width}x{height} grid, got {}",
                width * height,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn from_intensities(
        width: usize,
        height: usize,
        intensities: &[u8],
        calibration: &Calibration,
    ) -> Result<Self> {
        let values = intensities
            .iter()
            .map(|i| calibration.to_vmem(f64::from(*i)))
            .collect();
        Self::from_values(width, height, values)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(y * self.width + x).copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub success: bool,
    pub observed_mean: Option<f64>,
    pub target_vmem_range: [f64; 2],
    pub deviation: f64,
    pub message: String,
}

/// Compares a mean observed voltage with the target window.
pub fn verify_observed(observed_mean: f64, range: &VmemRange) -> VerificationOutcome {
    let deviation = range.deviation(observed_mean);
    let success = range.contains(observed_mean);
    let message = if success {
        "SUCCESS: Tissue has entered the Target Bioelectric State.".to_string()
    } else {
        format!("FAILURE: State Mismatch. Deviation: {deviation:.2} mV")
    };
    VerificationOutcome {
        success,
        observed_mean: Some(observed_mean),
        target_vmem_range: range.raw(),
        deviation,
        message,
    }
}

#[derive(Debug, Clone)]
pub struct BioStateValidator {
    calibration: Calibration,
    blur_sigma: f32,
}

impl Default for BioStateValidator {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}

impl BioStateValidator {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            blur_sigma: DEFAULT_BLUR_SIGMA,
        }
    }

    pub fn with_blur_sigma(mut self, sigma: f32) -> Self {
        self.blur_sigma = sigma;
        self
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Denoises a grayscale frame and converts it to a voltage map.
    pub fn analyze_luma(&self, img: &GrayImage) -> Result<VmemMap> {
        let smoothed;
        let img = if self.blur_sigma > 0.0 {
            smoothed = imageops::blur(img, self.blur_sigma);
            &smoothed
        } else {
            img
        };
        VmemMap::from_intensities(
            img.width() as usize,
            img.height() as usize,
            img.as_raw(),
            &self.calibration,
        )
    }

    pub fn analyze_image(&self, path: impl AsRef<Path>) -> Result<VmemMap> {
        let path = path.as_ref();
        let img = image::open(path)?.to_luma8();
        debug!(
            "analyzing {}x{} frame from {}",
            img.width(),
            img.height(),
            path.display()
        );
        self.analyze_luma(&img)
    }

    pub fn verify_state(&self, map: &VmemMap, state: &BioelectricState) -> VerificationOutcome {
        let range = &state.target_vmem_range;
        match map.mean() {
            Some(mean) => {
                debug!(
                    "domain {}: target {} mV, observed mean {mean:.2} mV",
                    state.spatial_domain, range
                );
                verify_observed(mean, range)
            }
            None => VerificationOutcome {
                success: false,
                observed_mean: None,
                target_vmem_range: range.raw(),
                deviation: 0.0,
                message: "FAILURE: No Vmem map data.".to_string(),
            },
        }
    }
}

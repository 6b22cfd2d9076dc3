//! Configuration loading.
//!
//! One YAML file with a section per component. Component crates own
//! their runtime config structs; the binary maps these serialized
//! sections into them at startup. Every section has working defaults
//! so a minimal file (or none at all, for tests) is enough to run.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Sequential detector settings (serialized section; see
/// `flyway-detection` for the runtime policy type).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSection {
    /// Boundary family: "sprt", "obrien_fleming", "pocock", "cusum".
    pub boundary: String,
    /// Overall Type-I error budget per monitoring window.
    pub alpha: f64,
    /// Type-II error rate used by SPRT bound derivation.
    pub beta: f64,
    /// Alternative-to-null rate ratio the tests are powered against.
    pub elevation_ratio: f64,
    /// Maximum looks before a window times out to CLEARED.
    pub max_looks: u32,
    /// Minimum baseline periods before a cell may be tested.
    pub min_baseline_periods: u32,
    /// CUSUM reference value.
    pub cusum_k: f64,
    /// CUSUM decision interval.
    pub cusum_h: f64,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            boundary: "obrien_fleming".to_string(),
            alpha: 0.05,
            beta: 0.2,
            elevation_ratio: 3.0,
            max_looks: 20,
            min_baseline_periods: 14,
            cusum_k: 0.5,
            cusum_h: 5.0,
        }
    }
}

/// Adaptive sampling allocator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSection {
    /// Minimum budget every cell receives when capacity allows.
    pub floor_per_cell: u32,
    /// How far back (in days) an ALARM counts as a full reward.
    pub recency_window_days: i64,
    /// Decay applied to the baseline-rate reward for quiet cells.
    pub baseline_decay: f64,
    /// Beta prior parameters.
    pub prior_alpha: f64,
    pub prior_beta: f64,
    /// RNG seed; set for reproducible allocations, unset in production.
    pub seed: Option<u64>,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            floor_per_cell: 1,
            recency_window_days: 7,
            baseline_decay: 0.9,
            prior_alpha: 1.0,
            prior_beta: 1.0,
            seed: None,
        }
    }
}

/// Network inference settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub temporal_window_days: f64,
    pub spatial_threshold_km: f64,
    pub genetic_threshold: f64,
    /// Likelihood weights; renormalized when genetic data is absent.
    pub temporal_weight: f64,
    pub spatial_weight: f64,
    pub genetic_weight: f64,
    /// "linear" or "exponential".
    pub decay: String,
    /// Super-spreader score must exceed this multiple of the
    /// component's mean out-degree.
    pub superspreader_multiple: f64,
    /// Cap on transitive-reach traversal depth.
    pub reach_horizon: usize,
    /// Case count above which bucketed candidate generation kicks in.
    pub bucket_activation_threshold: usize,
    /// Case count above which the API returns a job handle instead of
    /// a synchronous result.
    pub sync_case_limit: usize,
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            temporal_window_days: 30.0,
            spatial_threshold_km: 100.0,
            genetic_threshold: 0.05,
            temporal_weight: 0.3,
            spatial_weight: 0.3,
            genetic_weight: 0.4,
            decay: "linear".to_string(),
            superspreader_multiple: 2.0,
            reach_horizon: 4,
            bucket_activation_threshold: 256,
            sync_case_limit: 500,
        }
    }
}

/// Geographic partition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSection {
    pub cell_size_km: f64,
}

impl Default for GridSection {
    fn default() -> Self {
        Self { cell_size_km: 25.0 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub detection: DetectionSection,
    pub sampling: SamplingSection,
    pub inference: InferenceSection,
    pub grid: GridSection,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would corrupt detection guarantees.
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.detection.alpha && self.detection.alpha < 1.0) {
            return Err(Error::Config(format!(
                "alpha must be in (0, 1), got {}",
                self.detection.alpha
            )));
        }
        if !(0.0 < self.detection.beta && self.detection.beta < 1.0) {
            return Err(Error::Config(format!(
                "beta must be in (0, 1), got {}",
                self.detection.beta
            )));
        }
        if self.detection.elevation_ratio <= 1.0 {
            return Err(Error::Config(
                "elevation_ratio must exceed 1.0 (alternative above baseline)".to_string(),
            ));
        }
        if self.detection.max_looks == 0 {
            return Err(Error::Config("max_looks must be positive".to_string()));
        }
        for (name, v) in [
            ("temporal_window_days", self.inference.temporal_window_days),
            ("spatial_threshold_km", self.inference.spatial_threshold_km),
            ("genetic_threshold", self.inference.genetic_threshold),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::Config(format!("{name} must be non-negative, got {v}")));
            }
        }
        if self.grid.cell_size_km <= 0.0 {
            return Err(Error::Config("grid cell_size_km must be positive".to_string()));
        }
        Ok(())
    }
}

//! Estimator configuration
//!
//! Stored as pretty-printed JSON. Missing fields take their defaults so old
//! files keep loading as options are added.

use crate::audio::bands::BandScheme;
use crate::audio::filter::{DEFAULT_FILTER_ORDER, MAX_FILTER_ORDER};
use crate::decay::curve::DecayConfig;
use crate::decay::regression::{Method, DEFAULT_MIN_FIT_POINTS};
use crate::error::{Result, Rt60Error};
use crate::stats::report::DEFAULT_RELIABLE_CORRELATION;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_filter_order() -> usize {
    DEFAULT_FILTER_ORDER
}

fn default_min_fit_points() -> usize {
    DEFAULT_MIN_FIT_POINTS
}

fn default_reliable_correlation() -> f64 {
    DEFAULT_RELIABLE_CORRELATION
}

fn default_true() -> bool {
    true
}

/// Settings for an [`crate::Estimator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Bands to analyze
    #[serde(default)]
    pub scheme: BandScheme,
    /// Decay-range convention
    #[serde(default)]
    pub method: Method,
    /// Butterworth order per band edge
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,
    /// Envelope and noise-floor thresholds
    #[serde(default)]
    pub decay: DecayConfig,
    /// Fewest curve points a fit may use
    #[serde(default = "default_min_fit_points")]
    pub min_fit_points: usize,
    /// Worker thread cap (None = available parallelism)
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// |r| at or above which an estimate is flagged reliable
    #[serde(default = "default_reliable_correlation")]
    pub reliable_correlation: f64,
    /// Run a spectrum over the input to report its dominant frequency
    #[serde(default = "default_true")]
    pub dominant_frequency: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            scheme: BandScheme::default(),
            method: Method::default(),
            filter_order: default_filter_order(),
            decay: DecayConfig::default(),
            min_fit_points: default_min_fit_points(),
            max_workers: None,
            reliable_correlation: default_reliable_correlation(),
            dominant_frequency: true,
        }
    }
}

impl EstimatorConfig {
    /// Reject values no estimator could run with
    pub fn validate(&self) -> Result<()> {
        if self.filter_order == 0 || self.filter_order > MAX_FILTER_ORDER {
            return Err(Rt60Error::InvalidConfig(format!(
                "filter_order must be 1-{}, got {}",
                MAX_FILTER_ORDER, self.filter_order
            )));
        }
        if self.min_fit_points < 2 {
            return Err(Rt60Error::InvalidConfig(format!(
                "min_fit_points must be at least 2, got {}",
                self.min_fit_points
            )));
        }
        if self.max_workers == Some(0) {
            return Err(Rt60Error::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reliable_correlation) {
            return Err(Rt60Error::InvalidConfig(format!(
                "reliable_correlation must be within 0-1, got {}",
                self.reliable_correlation
            )));
        }
        if self.scheme.bands().is_empty() {
            return Err(Rt60Error::InvalidConfig(
                "band scheme contains no bands".to_string(),
            ));
        }
        self.decay.validate()
    }

    /// Read and validate a config file
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Self::default();
        }
        match Self::read(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded config from disk");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}

//! Reverbmeter - room reverberation time measurement
//!
//! This library re-exports the RT60 estimation engine from
//! `reverbmeter-core` and adds the WAV ingestion used by the command line
//! front end ([`input`]).

pub mod input;

pub use reverbmeter_core::audio;
pub use reverbmeter_core::config;
pub use reverbmeter_core::decay;
pub use reverbmeter_core::stats;

pub use reverbmeter_core::{
    estimate, BandFailure, BandScheme, DecayCurve, DecayCurveBuilder, DecayRegressor, Estimator,
    EstimatorConfig, FrequencyBand, Method, ReportRow, Rt60Error, Rt60Estimate, Rt60Report,
    SignalBuffer,
};
pub use reverbmeter_core::{BUILD_DATE, ENERGY_FLOOR, MLS_LENGTH, VERSION};

/// Default config file: `<config_dir>/reverbmeter/config.json`
pub fn default_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("reverbmeter")
        .join("config.json")
}

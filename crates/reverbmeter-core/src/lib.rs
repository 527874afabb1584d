//! Reverbmeter Core - RT60 estimation engine
//!
//! This library estimates the reverberation time of a room from a recorded
//! decay (impulse response, balloon pop, interrupted noise). The signal is
//! split into octave or third-octave bands, each band is turned into a
//! Schroeder energy decay curve, and a line fitted over a standard dB range
//! is extrapolated to a 60 dB drop.
//!
//! Audio decoding and report rendering live outside this crate; the core
//! consumes a [`SignalBuffer`] and produces an [`Rt60Report`].

pub mod audio;
pub mod config;
pub mod decay;
pub mod error;
pub mod estimator;
pub mod stats;

pub use audio::bands::{BandScheme, FrequencyBand};
pub use audio::buffer::SignalBuffer;
pub use audio::filter::BandFilterBank;
pub use audio::signal::MlsGenerator;
pub use config::EstimatorConfig;
pub use decay::curve::{DecayCurve, DecayCurveBuilder};
pub use decay::regression::{DecayRegressor, Method, Rt60Estimate};
pub use error::{Result, Rt60Error};
pub use estimator::{estimate, Estimator};
pub use stats::report::{BandFailure, ReportRow, Rt60Report};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Date this crate was built (set by build.rs)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Default sample rate for synthesized test signals
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// MLS sequence order used for synthesized noise (2^ORDER - 1 samples)
pub const MLS_ORDER: u32 = 15;

/// MLS sequence length (32767 samples at order 15)
pub const MLS_LENGTH: usize = (1 << MLS_ORDER) - 1;

/// Smallest energy ratio converted to decibels (-100 dB).
///
/// Every energy-to-dB conversion in the crate clamps to this value before
/// taking the logarithm, so silent stretches map to -100 dB instead of -inf.
pub const ENERGY_FLOOR: f64 = 1e-10;

/// Convert an energy ratio to decibels, clamped at [`ENERGY_FLOOR`].
pub fn energy_ratio_to_db(ratio: f64) -> f64 {
    10.0 * ratio.max(ENERGY_FLOOR).log10()
}

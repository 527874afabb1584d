//! Error types for the estimation engine
//!
//! Only whole-input problems are errors. Problems that affect a single band
//! are recorded in the report as [`crate::BandFailure`] values instead.

use thiserror::Error;

/// Convenience alias used throughout the core crate
pub type Result<T> = std::result::Result<T, Rt60Error>;

/// Errors that can abort an estimation call or reject a value at construction
#[derive(Error, Debug)]
pub enum Rt60Error {
    /// The input cannot produce any meaningful band result (empty, one frame,
    /// zero sample rate)
    #[error("Degenerate signal: {0}")]
    DegenerateSignal(String),

    /// Sample data violates a buffer invariant
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Invalid frequency band: lower {lower_hz} Hz, center {center_hz} Hz, upper {upper_hz} Hz")]
    InvalidBand {
        lower_hz: f64,
        center_hz: f64,
        upper_hz: f64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

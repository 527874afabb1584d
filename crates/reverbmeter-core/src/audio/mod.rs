//! Audio processing module
//!
//! This module contains the signal-side building blocks:
//! - Immutable sample container ([`buffer`])
//! - Standard octave and third-octave band tables ([`bands`])
//! - Zero-phase Butterworth band filter bank ([`filter`])
//! - Hann-windowed intensity spectrum and dominant frequency ([`spectrum`])
//! - MLS noise and synthetic decay generation ([`signal`])

pub mod bands;
pub mod buffer;
pub mod filter;
pub mod signal;
pub mod spectrum;

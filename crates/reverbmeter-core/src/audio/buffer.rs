//! Immutable audio sample container
//!
//! A [`SignalBuffer`] is the hand-off point between the ingestion
//! collaborator and the estimation engine. Its invariants are checked once,
//! at construction, so every later stage can rely on them.

use crate::error::{Result, Rt60Error};

/// Fixed-sample-rate amplitude sequence
///
/// Samples are interleaved when `channels > 1`. Values are nominally in
/// `[-1.0, 1.0]` but are not clamped; only finiteness is enforced.
///
/// # Example
/// ```
/// use reverbmeter_core::SignalBuffer;
///
/// let buffer = SignalBuffer::mono(vec![0.0; 48000], 48000).unwrap();
/// assert_eq!(buffer.frames(), 48000);
/// assert!((buffer.duration_secs() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl SignalBuffer {
    /// Create a buffer from interleaved samples
    ///
    /// # Arguments
    /// * `samples` - Interleaved samples, `frames * channels` long
    /// * `sample_rate` - Sample rate in Hz (must be > 0)
    /// * `channels` - Channel count (must be > 0)
    ///
    /// # Errors
    /// [`Rt60Error::DegenerateSignal`] for a zero sample rate,
    /// [`Rt60Error::InvalidSignal`] for a zero channel count, a sample count
    /// that is not a multiple of the channel count, or non-finite samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Rt60Error::DegenerateSignal(
                "sample rate must be positive".to_string(),
            ));
        }
        if channels == 0 {
            return Err(Rt60Error::InvalidSignal(
                "channel count must be positive".to_string(),
            ));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Rt60Error::InvalidSignal(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(Rt60Error::InvalidSignal(format!(
                "non-finite sample at index {}",
                index
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Create a single-channel buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, sample_rate, 1)
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Nyquist frequency in Hz
    pub fn nyquist_hz(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// True when every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// Extract one channel as a mono buffer
    ///
    /// # Errors
    /// [`Rt60Error::InvalidSignal`] when `index` is out of range.
    pub fn channel(&self, index: u16) -> Result<SignalBuffer> {
        if index >= self.channels {
            return Err(Rt60Error::InvalidSignal(format!(
                "channel {} requested from a {}-channel buffer",
                index, self.channels
            )));
        }
        let samples = self
            .samples
            .iter()
            .skip(index as usize)
            .step_by(self.channels as usize)
            .copied()
            .collect();
        Ok(Self {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        })
    }

    /// Downmix to a single channel by averaging each frame
    ///
    /// A mono buffer is returned as a plain copy.
    pub fn to_mono(&self) -> SignalBuffer {
        if self.channels == 1 {
            return self.clone();
        }
        Self {
            samples: self.mono_f64().into_iter().map(|s| s as f32).collect(),
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }

    /// Scale so the peak absolute value is 1.0
    ///
    /// Silent buffers are returned unchanged.
    pub fn normalized(&self) -> SignalBuffer {
        let peak = self.peak();
        if peak <= 0.0 {
            return self.clone();
        }
        Self {
            samples: self.samples.iter().map(|s| s / peak).collect(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Mono samples widened to f64 for processing
    ///
    /// Multi-channel buffers are averaged per frame.
    pub fn mono_f64(&self) -> Vec<f64> {
        if self.channels == 1 {
            return self.samples.iter().map(|&s| s as f64).collect();
        }
        let scale = 1.0 / self.channels as f64;
        self.samples
            .chunks_exact(self.channels as usize)
            .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() * scale)
            .collect()
    }

    /// Build a mono buffer from processed f64 samples
    pub(crate) fn from_f64(samples: &[f64], sample_rate: u32) -> Result<Self> {
        Self::mono(samples.iter().map(|&s| s as f32).collect(), sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_rate_is_degenerate() {
        let result = SignalBuffer::mono(vec![0.0; 10], 0);
        assert!(matches!(result, Err(Rt60Error::DegenerateSignal(_))));
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let result = SignalBuffer::new(vec![0.0; 5], 48000, 2);
        assert!(matches!(result, Err(Rt60Error::InvalidSignal(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = SignalBuffer::mono(vec![0.0, f32::NAN, 0.0], 48000);
        assert!(matches!(result, Err(Rt60Error::InvalidSignal(_))));
    }

    #[test]
    fn test_empty_buffer_allowed() {
        let buffer = SignalBuffer::mono(Vec::new(), 44100).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.frames(), 0);
        assert_eq!(buffer.duration_secs(), 0.0);
    }

    #[test]
    fn test_stereo_frames_and_duration() {
        let buffer = SignalBuffer::new(vec![0.1; 96000], 48000, 2).unwrap();
        assert_eq!(buffer.frames(), 48000);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-12);
        assert_eq!(buffer.nyquist_hz(), 24000.0);
    }

    #[test]
    fn test_channel_extraction() {
        let buffer = SignalBuffer::new(vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 8000, 2).unwrap();
        let left = buffer.channel(0).unwrap();
        let right = buffer.channel(1).unwrap();
        assert_eq!(left.samples(), &[1.0, 2.0, 3.0]);
        assert_eq!(right.samples(), &[-1.0, -2.0, -3.0]);
        assert!(buffer.channel(2).is_err());
    }

    #[test]
    fn test_to_mono_averages_frames() {
        let buffer = SignalBuffer::new(vec![1.0, 0.0, 0.5, 0.5], 8000, 2).unwrap();
        let mono = buffer.to_mono();
        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.samples(), &[0.5, 0.5]);
        assert_eq!(buffer.mono_f64(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_to_mono_matches_processing_downmix() {
        let samples = vec![0.3, -0.2, 0.7, 1.0, 0.25, -0.5, 0.0, 0.9, -0.9];
        let buffer = SignalBuffer::new(samples, 44100, 3).unwrap();
        let mono = buffer.to_mono();
        assert_eq!(mono.sample_rate(), 44100);
        assert_eq!(mono.frames(), buffer.frames());
        for (&a, b) in mono.samples().iter().zip(buffer.mono_f64()) {
            assert_eq!(a, b as f32);
        }
        assert_eq!(mono.to_mono(), mono);
    }

    #[test]
    fn test_normalized_peak() {
        let buffer = SignalBuffer::mono(vec![0.25, -0.5, 0.1], 8000).unwrap();
        let normalized = buffer.normalized();
        assert!((normalized.peak() - 1.0).abs() < 1e-6);
        assert!((normalized.samples()[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_silence() {
        let silent = SignalBuffer::mono(vec![0.0; 100], 8000).unwrap();
        assert!(silent.is_silent());
        assert_eq!(silent.normalized(), silent);

        let not_silent = SignalBuffer::mono(vec![0.0, 1e-6], 8000).unwrap();
        assert!(!not_silent.is_silent());
    }
}

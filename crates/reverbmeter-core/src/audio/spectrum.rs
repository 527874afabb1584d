//! Hann-windowed intensity spectrum and dominant frequency

use crate::audio::buffer::SignalBuffer;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;
use std::f64::consts::PI;

/// Magnitude spectrum over the non-negative frequency bins
#[derive(Debug, Clone, Default, Serialize)]
pub struct Spectrum {
    /// Bin frequencies in Hz, ascending from 0
    pub frequencies: Vec<f64>,
    /// Unnormalized FFT magnitude per bin
    pub magnitudes: Vec<f64>,
}

/// One spectral peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectralPeak {
    pub frequency_hz: f64,
    pub magnitude: f64,
}

impl Spectrum {
    /// Compute the spectrum of the mono downmix of `signal`
    ///
    /// The whole signal is Hann-windowed and transformed in a single FFT of
    /// its own length, so the bin spacing is `sample_rate / frames`.
    ///
    /// # Example
    /// ```
    /// use reverbmeter_core::audio::spectrum::Spectrum;
    /// use reverbmeter_core::SignalBuffer;
    ///
    /// let samples: Vec<f32> = (0..8000)
    ///     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 8000.0).sin())
    ///     .collect();
    /// let signal = SignalBuffer::mono(samples, 8000).unwrap();
    /// let spectrum = Spectrum::analyze(&signal);
    /// assert_eq!(spectrum.dominant_frequency(), Some(440.0));
    /// ```
    pub fn analyze(signal: &SignalBuffer) -> Self {
        let data = signal.mono_f64();
        let n = data.len();
        if n == 0 {
            return Self::default();
        }

        let denom = (n.max(2) - 1) as f64;
        let mut buffer: Vec<Complex<f64>> = data
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let w = if n == 1 {
                    1.0
                } else {
                    0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos()
                };
                Complex::new(x * w, 0.0)
            })
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        // Non-negative bins only; for even n the Nyquist bin counts as negative
        let positive = n.div_ceil(2);
        let resolution = signal.sample_rate() as f64 / n as f64;
        Self {
            frequencies: (0..positive).map(|k| k as f64 * resolution).collect(),
            magnitudes: buffer[..positive].iter().map(|c| c.norm()).collect(),
        }
    }

    /// Frequency spacing between bins in Hz
    pub fn resolution_hz(&self) -> Option<f64> {
        self.frequencies.get(1).copied()
    }

    /// Frequency of the largest magnitude, `None` for an empty or silent signal
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.magnitudes
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.frequencies[i])
    }

    /// Up to `count` local maxima, loudest first
    pub fn peaks(&self, count: usize) -> Vec<SpectralPeak> {
        let m = &self.magnitudes;
        let mut peaks: Vec<SpectralPeak> = (0..m.len())
            .filter(|&i| {
                let left = i == 0 || m[i] > m[i - 1];
                let right = i + 1 == m.len() || m[i] >= m[i + 1];
                m[i] > 0.0 && left && right
            })
            .map(|i| SpectralPeak {
                frequency_hz: self.frequencies[i],
                magnitude: m[i],
            })
            .collect();
        peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
        peaks.truncate(count);
        peaks
    }
}

/// Frequency with the greatest spectral magnitude
pub fn dominant_frequency(signal: &SignalBuffer) -> Option<f64> {
    Spectrum::analyze(signal).dominant_frequency()
}

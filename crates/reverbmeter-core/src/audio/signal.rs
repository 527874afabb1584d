//! Synthetic test signals
//!
//! Maximum Length Sequence noise and exponentially decaying excitations with
//! a known decay rate, used by the tests and benchmarks. A decay of `r` dB/s
//! has an RT60 of `60 / r` seconds.

use crate::audio::bands::FrequencyBand;
use crate::audio::buffer::SignalBuffer;
use crate::audio::filter::{BandFilter, DEFAULT_FILTER_ORDER};
use crate::error::{Result, Rt60Error};
use std::f64::consts::PI;

/// Peak level of MLS samples, -6 dB to leave headroom
const MLS_AMPLITUDE: f32 = 0.5;

/// MLS (Maximum Length Sequence) generator
///
/// Produces a pseudo-random binary sequence of length 2^order - 1. Its flat
/// spectrum makes it a repeatable broadband excitation.
#[derive(Debug, Clone)]
pub struct MlsGenerator {
    /// Current position in the sequence
    position: usize,
    /// Pre-generated bipolar sequence
    sequence: Vec<f32>,
}

impl MlsGenerator {
    /// Create a new MLS generator with the specified order
    ///
    /// # Arguments
    /// * `order` - Order of the sequence (2-15). Sequence length = 2^order - 1
    ///
    /// # Example
    /// ```
    /// use reverbmeter_core::MlsGenerator;
    ///
    /// let mut gen = MlsGenerator::new(10).unwrap(); // 1023 sample sequence
    /// let first = gen.next_sample();
    /// assert_eq!(first.abs(), 0.5);
    /// gen.seek(1023);
    /// assert_eq!(gen.next_sample(), first);
    /// ```
    pub fn new(order: u32) -> Result<Self> {
        if !(2..=15).contains(&order) {
            return Err(Rt60Error::InvalidConfig(format!(
                "MLS order must be between 2 and 15, got {}",
                order
            )));
        }
        Ok(Self::with_order(order))
    }

    fn with_order(order: u32) -> Self {
        Self {
            position: 0,
            sequence: Self::generate_sequence(order),
        }
    }

    /// Generate the MLS sequence using a Galois LFSR
    fn generate_sequence(order: u32) -> Vec<f32> {
        let length = (1usize << order) - 1;
        let mut sequence = Vec::with_capacity(length);
        let mut lfsr: u32 = 1;

        // Primitive polynomial tap masks (Xilinx XAPP052)
        let mask: u32 = match order {
            2 => 0x3,     // x^2 + x + 1
            3 => 0x6,     // x^3 + x^2 + 1
            4 => 0xC,     // x^4 + x^3 + 1
            5 => 0x14,    // x^5 + x^3 + 1
            6 => 0x30,    // x^6 + x^5 + 1
            7 => 0x60,    // x^7 + x^6 + 1
            8 => 0xB8,    // x^8 + x^6 + x^5 + x^4 + 1
            9 => 0x110,   // x^9 + x^5 + 1
            10 => 0x240,  // x^10 + x^7 + 1
            11 => 0x500,  // x^11 + x^9 + 1
            12 => 0xE08,  // x^12 + x^11 + x^10 + x^4 + 1
            13 => 0x1C80, // x^13 + x^12 + x^11 + x^8 + 1
            14 => 0x3802, // x^14 + x^13 + x^12 + x^2 + 1
            _ => 0x6000,  // x^15 + x^14 + 1
        };

        for _ in 0..length {
            let output = lfsr & 1;
            sequence.push(if output == 1 { 1.0 } else { -1.0 });

            lfsr >>= 1;
            if output == 1 {
                lfsr ^= mask;
            }
        }

        sequence
    }

    /// Next sample; the sequence repeats after reaching the end
    pub fn next_sample(&mut self) -> f32 {
        let sample = self.sequence[self.position] * MLS_AMPLITUDE;
        self.position = (self.position + 1) % self.sequence.len();
        sample
    }

    /// Jump to `position` (taken modulo the sequence length)
    pub fn seek(&mut self, position: usize) {
        self.position = position % self.sequence.len();
    }
}

impl Default for MlsGenerator {
    fn default() -> Self {
        Self::with_order(crate::MLS_ORDER)
    }
}

/// Exponentially decaying MLS noise with a known decay rate
///
/// The noise is optionally band-limited before the envelope is applied, so
/// the decay rate holds within the band.
///
/// # Example
/// ```
/// use reverbmeter_core::audio::signal::SyntheticDecay;
///
/// // 60 dB/s -> RT60 of 1 second
/// let decay = SyntheticDecay::new(48000, 0.5, 60.0).unwrap();
/// let signal = decay.generate().unwrap();
/// assert_eq!(signal.frames(), 24000);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticDecay {
    sample_rate: u32,
    duration_secs: f64,
    decay_db_per_sec: f64,
    gain_db: f64,
    band: Option<FrequencyBand>,
    mls_offset: usize,
}

impl SyntheticDecay {
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `duration_secs` - Signal length in seconds
    /// * `decay_db_per_sec` - Envelope decay rate (0 gives stationary noise)
    pub fn new(sample_rate: u32, duration_secs: f64, decay_db_per_sec: f64) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Rt60Error::DegenerateSignal(
                "sample rate must be positive".to_string(),
            ));
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(Rt60Error::InvalidConfig(format!(
                "duration must be positive, got {}",
                duration_secs
            )));
        }
        if !decay_db_per_sec.is_finite() || decay_db_per_sec < 0.0 {
            return Err(Rt60Error::InvalidConfig(format!(
                "decay rate must be >= 0 dB/s, got {}",
                decay_db_per_sec
            )));
        }
        Ok(Self {
            sample_rate,
            duration_secs,
            decay_db_per_sec,
            gain_db: 0.0,
            band: None,
            mls_offset: 0,
        })
    }

    /// Band-limit the noise before applying the envelope
    pub fn with_band(mut self, band: FrequencyBand) -> Self {
        self.band = Some(band);
        self
    }

    /// Start the MLS at a different position so two generators are uncorrelated
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.mls_offset = offset;
        self
    }

    /// Scale the whole signal by `gain_db`
    pub fn with_gain_db(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }

    /// Expected RT60 in seconds, `None` for stationary noise
    pub fn expected_rt60(&self) -> Option<f64> {
        (self.decay_db_per_sec > 0.0).then(|| 60.0 / self.decay_db_per_sec)
    }

    pub fn frames(&self) -> usize {
        (self.duration_secs * self.sample_rate as f64) as usize
    }

    /// Generate at full f64 precision, for mixing several components
    pub fn samples_f64(&self) -> Result<Vec<f64>> {
        let mut mls = MlsGenerator::default();
        mls.seek(self.mls_offset);
        let mut noise: Vec<f64> = (0..self.frames())
            .map(|_| mls.next_sample() as f64)
            .collect();

        if let Some(band) = self.band {
            let filter = BandFilter::design(band, DEFAULT_FILTER_ORDER, self.sample_rate)?;
            noise = filter.filter_zero_phase(&noise);
        }

        let gain = 10f64.powf(self.gain_db / 20.0);
        let fs = self.sample_rate as f64;
        Ok(noise
            .iter()
            .enumerate()
            .map(|(i, &v)| v * gain * decay_envelope(self.decay_db_per_sec, i as f64 / fs))
            .collect())
    }

    /// Generate a mono buffer
    pub fn generate(&self) -> Result<SignalBuffer> {
        SignalBuffer::from_f64(&self.samples_f64()?, self.sample_rate)
    }
}

/// Amplitude of an exponential decay of `rate_db_per_sec` after `t` seconds
fn decay_envelope(rate_db_per_sec: f64, t: f64) -> f64 {
    10f64.powf(-rate_db_per_sec * t / 20.0)
}

/// Sum several f64 components into one mono buffer
///
/// # Errors
/// [`Rt60Error::InvalidSignal`] when the components differ in length.
pub fn mix(components: &[Vec<f64>], sample_rate: u32) -> Result<SignalBuffer> {
    let len = components.first().map_or(0, Vec::len);
    if components.iter().any(|c| c.len() != len) {
        return Err(Rt60Error::InvalidSignal(
            "mixed components must have equal length".to_string(),
        ));
    }
    let summed: Vec<f64> = (0..len)
        .map(|i| components.iter().map(|c| c[i]).sum())
        .collect();
    SignalBuffer::from_f64(&summed, sample_rate)
}

/// Unit-amplitude sine whose envelope falls at `decay_db_per_sec`
pub fn decaying_tone(
    frequency_hz: f64,
    sample_rate: u32,
    duration_secs: f64,
    decay_db_per_sec: f64,
) -> Result<SignalBuffer> {
    let shape = SyntheticDecay::new(sample_rate, duration_secs, decay_db_per_sec)?;
    let fs = sample_rate as f64;
    let samples: Vec<f64> = (0..shape.frames())
        .map(|i| {
            let t = i as f64 / fs;
            (2.0 * PI * frequency_hz * t).sin() * decay_envelope(decay_db_per_sec, t)
        })
        .collect();
    SignalBuffer::from_f64(&samples, sample_rate)
}

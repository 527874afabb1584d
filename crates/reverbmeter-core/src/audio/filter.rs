//! Zero-phase Butterworth band filter bank
//!
//! Each band is a Butterworth highpass at the lower edge cascaded with a
//! Butterworth lowpass at the upper edge, realised as second-order sections
//! (Direct Form II Transposed) for numerical stability. Filtering runs
//! forward and then backward over the signal so the combined response has
//! zero phase and decay timing is not shifted.

use crate::audio::bands::FrequencyBand;
use crate::audio::buffer::SignalBuffer;
use crate::error::{Result, Rt60Error};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Default Butterworth order per band edge
pub const DEFAULT_FILTER_ORDER: usize = 4;

/// Highest supported order per band edge
pub const MAX_FILTER_ORDER: usize = 10;

/// A single biquad (second-order section)
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    /// Numerator coefficients [b0, b1, b2]
    b: [f64; 3],
    /// Denominator coefficients [a1, a2] (a0 normalized to 1)
    a: [f64; 2],
}

impl Biquad {
    /// Create a section from normalized coefficients
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self { b, a }
    }

    /// Butterworth lowpass section with quality factor `q`, prewarped at `cutoff_hz`
    pub fn lowpass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;
        let b = [(1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0];
        Self::normalized(b, [a0, -2.0 * cos_w0, 1.0 - alpha])
    }

    /// Butterworth highpass section with quality factor `q`, prewarped at `cutoff_hz`
    pub fn highpass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;
        let b = [(1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0];
        Self::normalized(b, [a0, -2.0 * cos_w0, 1.0 - alpha])
    }

    /// First-order lowpass (used for odd filter orders)
    pub fn first_order_lowpass(cutoff_hz: f64, sample_rate: f64) -> Self {
        let k = (PI * cutoff_hz / sample_rate).tan();
        Self::new([k / (1.0 + k), k / (1.0 + k), 0.0], [(k - 1.0) / (k + 1.0), 0.0])
    }

    /// First-order highpass (used for odd filter orders)
    pub fn first_order_highpass(cutoff_hz: f64, sample_rate: f64) -> Self {
        let k = (PI * cutoff_hz / sample_rate).tan();
        Self::new([1.0 / (1.0 + k), -1.0 / (1.0 + k), 0.0], [(k - 1.0) / (k + 1.0), 0.0])
    }

    fn normalized(b: [f64; 3], a: [f64; 3]) -> Self {
        let a0 = a[0];
        Self::new([b[0] / a0, b[1] / a0, b[2] / a0], [a[1] / a0, a[2] / a0])
    }

    pub fn numerator(&self) -> &[f64; 3] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64; 2] {
        &self.a
    }

    /// Check that both poles lie inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }

    /// DC gain H(1)
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Steady-state output and DF2T state for a constant input
    ///
    /// Starting a pass from this state suppresses the step transient that a
    /// zero state would produce at the signal edge.
    fn steady_state(&self, input: f64) -> (f64, [f64; 2]) {
        let output = input * self.dc_gain();
        let s2 = self.b[2] * input - self.a[1] * output;
        let s1 = self.b[1] * input - self.a[0] * output + s2;
        (output, [s1, s2])
    }

    /// Run the section over `data` in place, starting from `state`
    fn run(&self, data: &mut [f64], mut state: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [a1, a2] = self.a;
        for sample in data.iter_mut() {
            let input = *sample;
            let output = b0 * input + state[0];
            state[0] = b1 * input - a1 * output + state[1];
            state[1] = b2 * input - a2 * output;
            *sample = output;
        }
    }
}

/// Butterworth section quality factors for an even part of `order`
fn butterworth_qs(order: usize) -> impl Iterator<Item = f64> {
    (0..order / 2).map(move |k| {
        let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
        1.0 / (2.0 * theta.cos())
    })
}

/// Bandpass filter for one frequency band
#[derive(Debug, Clone)]
pub struct BandFilter {
    band: FrequencyBand,
    sections: Vec<Biquad>,
}

impl BandFilter {
    /// Design the cascade for `band` at `sample_rate`
    ///
    /// # Arguments
    /// * `band` - Passband; `upper_hz` must not exceed the Nyquist frequency
    /// * `order` - Butterworth order per edge (1..=10)
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// When `upper_hz` equals the Nyquist frequency the lowpass stage is
    /// omitted, since a lowpass at Nyquist has its poles on the unit circle.
    pub fn design(band: FrequencyBand, order: usize, sample_rate: u32) -> Result<Self> {
        if order == 0 || order > MAX_FILTER_ORDER {
            return Err(Rt60Error::InvalidConfig(format!(
                "filter order must be 1-{}, got {}",
                MAX_FILTER_ORDER, order
            )));
        }
        if !band.is_supported(sample_rate) {
            return Err(Rt60Error::InvalidBand {
                lower_hz: band.lower_hz(),
                center_hz: band.center_hz(),
                upper_hz: band.upper_hz(),
            });
        }

        let fs = sample_rate as f64;
        let nyquist = fs / 2.0;
        let mut sections: Vec<Biquad> = butterworth_qs(order)
            .map(|q| Biquad::highpass(band.lower_hz(), q, fs))
            .collect();
        if order % 2 == 1 {
            sections.push(Biquad::first_order_highpass(band.lower_hz(), fs));
        }

        if band.upper_hz() < nyquist {
            sections.extend(butterworth_qs(order).map(|q| Biquad::lowpass(band.upper_hz(), q, fs)));
            if order % 2 == 1 {
                sections.push(Biquad::first_order_lowpass(band.upper_hz(), fs));
            }
        }

        Ok(Self { band, sections })
    }

    pub fn band(&self) -> FrequencyBand {
        self.band
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Check that every section is stable
    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(Biquad::is_stable)
    }

    /// Edge padding length, dependent only on the section count
    fn pad_len(&self, len: usize) -> usize {
        (3 * (2 * self.sections.len() + 1)).min(len.saturating_sub(1))
    }

    /// Single forward pass with steady-state initial conditions
    fn forward(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let mut level = first;
        for section in &self.sections {
            let (output, state) = section.steady_state(level);
            section.run(data, state);
            level = output;
        }
    }

    /// Zero-phase filtering of a mono sample sequence
    ///
    /// The input is extended at both ends by an odd reflection, filtered
    /// forward, reversed, filtered again, reversed back, and trimmed to the
    /// original length.
    pub fn filter_zero_phase(&self, input: &[f64]) -> Vec<f64> {
        let len = input.len();
        if len == 0 {
            return Vec::new();
        }
        let pad = self.pad_len(len);
        let first = input[0];
        let last = input[len - 1];

        let mut data = Vec::with_capacity(len + 2 * pad);
        data.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
        data.extend_from_slice(input);
        data.extend((1..=pad).map(|i| 2.0 * last - input[len - 1 - i]));

        self.forward(&mut data);
        data.reverse();
        self.forward(&mut data);
        data.reverse();

        data.drain(..pad);
        data.truncate(len);
        data
    }

    /// Filter a buffer channel by channel
    pub fn apply(&self, signal: &SignalBuffer) -> Result<SignalBuffer> {
        let channels = signal.channels();
        if channels == 1 {
            let mono = signal.mono_f64();
            return SignalBuffer::from_f64(&self.filter_zero_phase(&mono), signal.sample_rate());
        }

        let frames = signal.frames();
        let mut interleaved = vec![0.0f32; signal.samples().len()];
        for ch in 0..channels {
            let channel: Vec<f64> = signal.channel(ch)?.mono_f64();
            let filtered = self.filter_zero_phase(&channel);
            for (frame, value) in filtered.iter().enumerate().take(frames) {
                interleaved[frame * channels as usize + ch as usize] = *value as f32;
            }
        }
        SignalBuffer::new(interleaved, signal.sample_rate(), channels)
    }
}

/// Band-limited copies of one signal
#[derive(Debug, Clone, Default)]
pub struct FilteredBands {
    /// Band-limited signals keyed by band, ascending by centre frequency
    pub bands: BTreeMap<FrequencyBand, SignalBuffer>,
    /// Requested bands whose upper edge lies above the Nyquist frequency
    pub unsupported: Vec<FrequencyBand>,
}

/// Produces band-limited copies of a signal
///
/// # Example
/// ```
/// use reverbmeter_core::{BandFilterBank, BandScheme, SignalBuffer};
///
/// let signal = SignalBuffer::mono(vec![0.0; 4410], 44100).unwrap();
/// let bank = BandFilterBank::default();
/// let filtered = bank.filter(&signal, &BandScheme::Octave.bands()).unwrap();
///
/// // The 16 kHz octave reaches 22.6 kHz, above the 22.05 kHz Nyquist limit
/// assert_eq!(filtered.bands.len(), 9);
/// assert_eq!(filtered.unsupported.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct BandFilterBank {
    order: usize,
}

impl Default for BandFilterBank {
    fn default() -> Self {
        Self {
            order: DEFAULT_FILTER_ORDER,
        }
    }
}

impl BandFilterBank {
    /// Create a filter bank with the given Butterworth order per band edge
    pub fn new(order: usize) -> Result<Self> {
        if order == 0 || order > MAX_FILTER_ORDER {
            return Err(Rt60Error::InvalidConfig(format!(
                "filter order must be 1-{}, got {}",
                MAX_FILTER_ORDER, order
            )));
        }
        Ok(Self { order })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Filter `signal` into each band
    ///
    /// Bands above the Nyquist frequency are left out of the map and listed
    /// in [`FilteredBands::unsupported`]; they are not an error.
    pub fn filter(&self, signal: &SignalBuffer, bands: &[FrequencyBand]) -> Result<FilteredBands> {
        let mut output = FilteredBands::default();
        for &band in bands {
            match self.filter_band(signal, band)? {
                Some(filtered) => {
                    output.bands.insert(band, filtered);
                }
                None => {
                    tracing::warn!(
                        center_hz = band.center_hz(),
                        upper_hz = band.upper_hz(),
                        sample_rate = signal.sample_rate(),
                        "band_above_nyquist"
                    );
                    output.unsupported.push(band);
                }
            }
        }
        Ok(output)
    }

    /// Filter `signal` into a single band
    ///
    /// # Returns
    /// `None` when the band is not supported at the signal's sample rate
    pub fn filter_band(
        &self,
        signal: &SignalBuffer,
        band: FrequencyBand,
    ) -> Result<Option<SignalBuffer>> {
        if !band.is_supported(signal.sample_rate()) {
            return Ok(None);
        }
        let filter = BandFilter::design(band, self.order, signal.sample_rate())?;
        filter.apply(signal).map(Some)
    }
}

//! Schroeder energy decay curves
//!
//! The decay curve of a band is the backward-integrated squared signal,
//! normalized to its start and expressed in dB. Before integrating, the
//! band's short-time envelope is scanned for a stationary noise floor; the
//! integral stops where the envelope sinks into that floor and the curve is
//! cut a margin above it, so measurement noise does not bend the tail.
//!
//! Stopping the integral early (at the floor, or because the recording ends
//! mid-decay) loses the energy of the rest of the decay. That energy is
//! estimated from the late slope of the envelope and added back to the
//! integral. When the recording simply ends, the curve is continued along
//! the same slope down to [`TAIL_EXTENSION_LIMIT_DB`].

use crate::audio::buffer::SignalBuffer;
use crate::decay::regression::{least_squares, MIN_DECAY_SLOPE};
use crate::error::{Result, Rt60Error};
use crate::{energy_ratio_to_db, ENERGY_FLOOR};
use serde::{Deserialize, Serialize};

/// Level a compensated curve is continued to past the end of the recording
///
/// Lies below the deepest fit window of every method.
pub const TAIL_EXTENSION_LIMIT_DB: f64 = -65.0;

/// Thresholds for envelope analysis and curve truncation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Envelope block length in milliseconds
    pub block_ms: f64,
    /// Length of the sliding window tested for flatness, in milliseconds
    pub noise_window_ms: f64,
    /// Largest |slope| (dB/s) of a window still considered flat
    pub flat_slope_db_per_sec: f64,
    /// Curve points closer than this to the noise floor are discarded
    pub noise_margin_db: f64,
    /// Add the estimated energy of the unrecorded decay to the integral
    pub tail_compensation: bool,
    /// Envelope range (dB) above the lowest usable level used to fit the late decay
    pub tail_fit_range_db: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            block_ms: 10.0,
            noise_window_ms: 500.0,
            flat_slope_db_per_sec: 10.0,
            noise_margin_db: 10.0,
            tail_compensation: true,
            tail_fit_range_db: 20.0,
        }
    }
}

impl DecayConfig {
    /// Check that every threshold is finite and positive
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("block_ms", self.block_ms),
            ("noise_window_ms", self.noise_window_ms),
            ("flat_slope_db_per_sec", self.flat_slope_db_per_sec),
            ("noise_margin_db", self.noise_margin_db),
            ("tail_fit_range_db", self.tail_fit_range_db),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(Rt60Error::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.noise_window_ms < 2.0 * self.block_ms {
            return Err(Rt60Error::InvalidConfig(format!(
                "noise_window_ms ({}) must cover at least two blocks of {} ms",
                self.noise_window_ms, self.block_ms
            )));
        }
        Ok(())
    }
}

/// Normalized energy decay in dB over time
///
/// Invariants: at least two points, times strictly increasing, levels
/// non-increasing and starting at 0 dB. Points from `measured_len` on are
/// extrapolated past the end of the recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecayCurve {
    times: Vec<f64>,
    levels_db: Vec<f64>,
    noise_floor_db: Option<f64>,
    measured_len: usize,
}

impl DecayCurve {
    /// Create a curve from explicit points
    ///
    /// # Errors
    /// [`Rt60Error::InvalidSignal`] when an invariant does not hold.
    pub fn new(times: Vec<f64>, levels_db: Vec<f64>, noise_floor_db: Option<f64>) -> Result<Self> {
        if times.len() != levels_db.len() || times.len() < 2 {
            return Err(Rt60Error::InvalidSignal(format!(
                "decay curve needs at least 2 matching points, got {} times and {} levels",
                times.len(),
                levels_db.len()
            )));
        }
        if times.iter().chain(&levels_db).any(|v| !v.is_finite()) {
            return Err(Rt60Error::InvalidSignal(
                "decay curve contains non-finite values".to_string(),
            ));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Rt60Error::InvalidSignal(
                "decay curve times must be strictly increasing".to_string(),
            ));
        }
        if levels_db.windows(2).any(|w| w[1] > w[0]) {
            return Err(Rt60Error::InvalidSignal(
                "decay curve levels must be non-increasing".to_string(),
            ));
        }
        if levels_db[0].abs() > 1e-9 {
            return Err(Rt60Error::InvalidSignal(format!(
                "decay curve must start at 0 dB, got {}",
                levels_db[0]
            )));
        }
        let measured_len = times.len();
        Ok(Self {
            times,
            levels_db,
            noise_floor_db,
            measured_len,
        })
    }

    /// Mark the points from `measured_len` on as extrapolated
    fn with_measured_len(mut self, measured_len: usize) -> Self {
        self.measured_len = measured_len.min(self.times.len());
        self
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn levels_db(&self) -> &[f64] {
        &self.levels_db
    }

    /// Detected noise floor in dB relative to the envelope peak
    pub fn noise_floor_db(&self) -> Option<f64> {
        self.noise_floor_db
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Number of leading points backed by recorded samples
    pub fn measured_len(&self) -> usize {
        self.measured_len
    }

    pub fn is_extrapolated(&self) -> bool {
        self.measured_len < self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Lowest level the curve reaches
    pub fn final_level_db(&self) -> f64 {
        self.levels_db.last().copied().unwrap_or(0.0)
    }

    /// Time span covered by the curve in seconds
    pub fn duration_secs(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Usable dynamic range in dB (0 minus the final level)
    pub fn dynamic_range_db(&self) -> f64 {
        -self.final_level_db()
    }
}

/// Short-time energy envelope of a signal
#[derive(Debug, Clone)]
struct Envelope {
    /// Block length in samples
    block_len: usize,
    /// Block duration in seconds
    block_secs: f64,
    /// Mean per-sample energy of the loudest block
    peak_energy: f64,
    /// Mean block energy in dB relative to the loudest block
    levels_db: Vec<f64>,
}

/// Straight-line fit of the envelope's late decay, in dB relative to the peak block
#[derive(Debug, Clone, Copy)]
struct LateDecay {
    slope_db_per_sec: f64,
    intercept_db: f64,
}

impl LateDecay {
    /// Energy of the decay continuing from sample `end` onwards
    fn tail_energy(&self, end: usize, sample_rate: u32, peak_energy: f64) -> f64 {
        let fs = sample_rate as f64;
        let end_db = self.intercept_db + self.slope_db_per_sec * end as f64 / fs;
        let first = peak_energy * 10f64.powf(end_db / 10.0);
        // Per-sample energy ratio of the exponential
        let ratio = 10f64.powf(self.slope_db_per_sec / (10.0 * fs));
        first / (1.0 - ratio)
    }
}

impl Envelope {
    fn compute(samples: &[f64], sample_rate: u32, block_ms: f64) -> Self {
        let block_len = ((block_ms * sample_rate as f64 / 1000.0).round() as usize).max(1);
        let energies: Vec<f64> = samples
            .chunks(block_len)
            .map(|block| block.iter().map(|x| x * x).sum::<f64>() / block.len() as f64)
            .collect();
        let max = energies.iter().copied().fold(0.0, f64::max);
        let levels_db = if max > 0.0 {
            energies.iter().map(|&e| energy_ratio_to_db(e / max)).collect()
        } else {
            vec![energy_ratio_to_db(0.0); energies.len()]
        };

        Self {
            block_len,
            block_secs: block_len as f64 / sample_rate as f64,
            peak_energy: max,
            levels_db,
        }
    }

    /// Index of the first loudest block
    fn peak_block(&self) -> usize {
        let mut peak = 0;
        for (i, &level) in self.levels_db.iter().enumerate() {
            if level > self.levels_db[peak] {
                peak = i;
            }
        }
        peak
    }

    /// Lowest mean level among flat windows at or after the peak
    fn noise_floor(&self, window_ms: f64, flat_slope_db_per_sec: f64) -> Option<f64> {
        let window = ((window_ms / (self.block_secs * 1000.0)).round() as usize).max(2);
        let blocks = self.levels_db.len();
        let peak = self.peak_block();
        if blocks < window {
            return None;
        }

        let mut floor: Option<f64> = None;
        for start in peak..=(blocks - window) {
            let levels = &self.levels_db[start..start + window];
            let times: Vec<f64> = (start..start + window)
                .map(|k| k as f64 * self.block_secs)
                .collect();
            let Some(line) = least_squares(&times, levels) else {
                continue;
            };
            if line.slope.abs() <= flat_slope_db_per_sec {
                let mean = levels.iter().sum::<f64>() / window as f64;
                floor = Some(floor.map_or(mean, |f: f64| f.min(mean)));
            }
        }
        floor
    }

    /// First sample of the first block after the peak that lies below `floor_db`
    fn first_sample_below(&self, floor_db: f64) -> Option<usize> {
        let peak = self.peak_block();
        self.levels_db[peak..]
            .iter()
            .position(|&level| level < floor_db)
            .map(|offset| (peak + offset) * self.block_len)
    }

    /// Fit the decay of the last `range_db` above the lowest usable level
    ///
    /// Only whole blocks between the peak and sample `end` that sit above the
    /// energy floor take part. `lower_db` overrides the lowest level (used
    /// to keep the fit clear of a noise floor).
    fn late_decay(&self, end: usize, lower_db: Option<f64>, range_db: f64) -> Option<LateDecay> {
        let floor_db = energy_ratio_to_db(ENERGY_FLOOR);
        let peak = self.peak_block();
        let usable: Vec<usize> = (peak..self.levels_db.len())
            .filter(|&k| (k + 1) * self.block_len <= end && self.levels_db[k] > floor_db)
            .collect();

        let lower = lower_db.unwrap_or_else(|| {
            usable
                .iter()
                .map(|&k| self.levels_db[k])
                .fold(f64::INFINITY, f64::min)
        });
        let (times, levels): (Vec<f64>, Vec<f64>) = usable
            .iter()
            .filter(|&&k| (lower..=lower + range_db).contains(&self.levels_db[k]))
            .map(|&k| ((k as f64 + 0.5) * self.block_secs, self.levels_db[k]))
            .unzip();

        let line = least_squares(&times, &levels)?;
        (line.slope < MIN_DECAY_SLOPE).then_some(LateDecay {
            slope_db_per_sec: line.slope,
            intercept_db: line.intercept,
        })
    }
}

/// Builds [`DecayCurve`]s from band-limited signals
///
/// # Example
/// ```
/// use reverbmeter_core::audio::signal::decaying_tone;
/// use reverbmeter_core::DecayCurveBuilder;
///
/// let signal = decaying_tone(1000.0, 48000, 1.0, 60.0).unwrap();
/// let curve = DecayCurveBuilder::default().build(&signal).unwrap();
/// assert_eq!(curve.levels_db()[0], 0.0);
/// assert!(curve.final_level_db() < -40.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DecayCurveBuilder {
    config: DecayConfig,
}

impl DecayCurveBuilder {
    pub fn new(config: DecayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Build the decay curve of `signal` (downmixed to mono)
    ///
    /// # Errors
    /// [`Rt60Error::DegenerateSignal`] for fewer than two frames.
    pub fn build(&self, signal: &SignalBuffer) -> Result<DecayCurve> {
        if signal.frames() < 2 {
            return Err(Rt60Error::DegenerateSignal(format!(
                "decay curve needs at least 2 frames, got {}",
                signal.frames()
            )));
        }
        let samples = signal.mono_f64();
        let sample_rate = signal.sample_rate();

        let envelope = Envelope::compute(&samples, sample_rate, self.config.block_ms);
        let noise_floor_db = envelope.noise_floor(
            self.config.noise_window_ms,
            self.config.flat_slope_db_per_sec,
        );

        let end = noise_floor_db
            .and_then(|floor| envelope.first_sample_below(floor))
            .unwrap_or(samples.len())
            .clamp(2, samples.len());

        let late_decay = if self.config.tail_compensation {
            envelope.late_decay(
                end,
                noise_floor_db.map(|floor| floor + self.config.noise_margin_db),
                self.config.tail_fit_range_db,
            )
        } else {
            None
        };
        let tail_energy = late_decay.map_or(0.0, |decay| {
            decay.tail_energy(end, sample_rate, envelope.peak_energy)
        });

        let integral = backward_integral(&samples[..end]);
        let total = integral.first().copied().unwrap_or(0.0) + tail_energy;
        let mut levels_db = integral_to_db(&integral, tail_energy, total);
        let measured_len = levels_db.len();

        match (noise_floor_db, late_decay) {
            (Some(floor), _) => {
                let limit = floor + self.config.noise_margin_db;
                let keep = levels_db
                    .iter()
                    .position(|&level| level < limit)
                    .unwrap_or(levels_db.len())
                    .max(2);
                levels_db.truncate(keep);
            }
            (None, Some(decay)) => {
                let start_db = energy_ratio_to_db(tail_energy / total);
                extend_tail(
                    &mut levels_db,
                    start_db,
                    decay.slope_db_per_sec,
                    sample_rate,
                    2 * end,
                );
            }
            (None, None) => {}
        }

        let fs = sample_rate as f64;
        let times = (0..levels_db.len()).map(|i| i as f64 / fs).collect();

        tracing::trace!(
            samples = samples.len(),
            integrated = end,
            points = levels_db.len(),
            extrapolated = levels_db.len().saturating_sub(measured_len),
            noise_floor_db = ?noise_floor_db,
            late_decay_db_per_sec = ?late_decay.map(|d| d.slope_db_per_sec),
            "decay_curve_built"
        );

        Ok(DecayCurve::new(times, levels_db, noise_floor_db)?.with_measured_len(measured_len))
    }
}

/// Continue a curve from `start_db` along `slope_db_per_sec` until it passes
/// [`TAIL_EXTENSION_LIMIT_DB`], adding at most `max_points` points
fn extend_tail(
    levels_db: &mut Vec<f64>,
    start_db: f64,
    slope_db_per_sec: f64,
    sample_rate: u32,
    max_points: usize,
) {
    if start_db <= TAIL_EXTENSION_LIMIT_DB {
        return;
    }
    let floor_db = energy_ratio_to_db(ENERGY_FLOOR);
    let fs = sample_rate as f64;
    for j in 0..max_points {
        let level = start_db + slope_db_per_sec * j as f64 / fs;
        levels_db.push(level.max(floor_db));
        if level <= TAIL_EXTENSION_LIMIT_DB {
            break;
        }
    }
}

/// Backward-integrated energy in dB relative to the total
///
/// A silent input gives a flat 0 dB curve.
pub fn schroeder_db(samples: &[f64]) -> Vec<f64> {
    let integral = backward_integral(samples);
    let total = integral.first().copied().unwrap_or(0.0);
    integral_to_db(&integral, 0.0, total)
}

/// Reverse cumulative sum of the squared samples
fn backward_integral(samples: &[f64]) -> Vec<f64> {
    let mut integral = vec![0.0; samples.len()];
    let mut acc = 0.0;
    for (slot, &x) in integral.iter_mut().zip(samples).rev() {
        acc += x * x;
        *slot = acc;
    }
    integral
}

/// Levels of `integral + tail_energy` relative to `total`; flat 0 dB when `total` is zero
fn integral_to_db(integral: &[f64], tail_energy: f64, total: f64) -> Vec<f64> {
    if total <= 0.0 {
        return vec![0.0; integral.len()];
    }
    integral
        .iter()
        .map(|&e| energy_ratio_to_db((e + tail_energy) / total))
        .collect()
}

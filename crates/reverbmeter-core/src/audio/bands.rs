//! Frequency bands and standard band schemes
//!
//! Octave and third-octave centre frequencies follow the base-2 series
//! anchored at 1 kHz (IEC 61260). The tables below are the only band
//! definitions in the crate; they are constants, never mutated.

use crate::error::{Result, Rt60Error};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Reference frequency the band series is anchored at
const REFERENCE_HZ: f64 = 1000.0;

/// Octave band indices relative to 1 kHz (31.5 Hz .. 16 kHz)
const OCTAVE_INDICES: [i32; 10] = [-5, -4, -3, -2, -1, 0, 1, 2, 3, 4];

/// First and last third-octave band index relative to 1 kHz (20 Hz .. 20 kHz)
const THIRD_OCTAVE_FIRST: i32 = -17;
const THIRD_OCTAVE_LAST: i32 = 13;

/// Nominal (labelled) centre frequencies in Hz, ISO 266
const NOMINAL_CENTERS_HZ: [f64; 31] = [
    20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0,
    500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0, 4000.0, 5000.0, 6300.0,
    8000.0, 10000.0, 12500.0, 16000.0, 20000.0,
];

/// Low / mid / high ranges used by quick broadband reports
const BROAD_RANGES_HZ: [(f64, f64); 3] = [(20.0, 250.0), (250.0, 2000.0), (2000.0, 20000.0)];

/// Relative distance within which a centre takes a nominal label
const NOMINAL_TOLERANCE: f64 = 0.03;

/// A bandpass region described by its edges and centre
///
/// Invariant: `0 < lower_hz < center_hz < upper_hz`, all finite. Bands are
/// totally ordered by centre, then lower edge, then upper edge, so they can
/// key ordered maps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "RawBand")]
pub struct FrequencyBand {
    center_hz: f64,
    lower_hz: f64,
    upper_hz: f64,
}

#[derive(Deserialize)]
struct RawBand {
    center_hz: f64,
    lower_hz: f64,
    upper_hz: f64,
}

impl TryFrom<RawBand> for FrequencyBand {
    type Error = Rt60Error;

    fn try_from(raw: RawBand) -> Result<Self> {
        FrequencyBand::new(raw.lower_hz, raw.center_hz, raw.upper_hz)
    }
}

impl FrequencyBand {
    /// Create a band from explicit edges and centre
    ///
    /// # Errors
    /// [`Rt60Error::InvalidBand`] unless `0 < lower < center < upper`.
    pub fn new(lower_hz: f64, center_hz: f64, upper_hz: f64) -> Result<Self> {
        let finite = lower_hz.is_finite() && center_hz.is_finite() && upper_hz.is_finite();
        if !finite || lower_hz <= 0.0 || lower_hz >= center_hz || center_hz >= upper_hz {
            return Err(Rt60Error::InvalidBand {
                lower_hz,
                center_hz,
                upper_hz,
            });
        }
        Ok(Self {
            center_hz,
            lower_hz,
            upper_hz,
        })
    }

    /// Band spanning `[lower_hz, upper_hz]` with a geometric-mean centre
    pub fn from_edges(lower_hz: f64, upper_hz: f64) -> Result<Self> {
        Self::new(lower_hz, (lower_hz * upper_hz).sqrt(), upper_hz)
    }

    /// Octave band around `center_hz` (edges at centre / sqrt(2), centre * sqrt(2))
    pub fn octave(center_hz: f64) -> Result<Self> {
        let half = 2f64.powf(0.5);
        Self::new(center_hz / half, center_hz, center_hz * half)
    }

    /// Third-octave band around `center_hz` (edges at centre * 2^(-/+1/6))
    pub fn third_octave(center_hz: f64) -> Result<Self> {
        let half = 2f64.powf(1.0 / 6.0);
        Self::new(center_hz / half, center_hz, center_hz * half)
    }

    pub fn center_hz(&self) -> f64 {
        self.center_hz
    }

    pub fn lower_hz(&self) -> f64 {
        self.lower_hz
    }

    pub fn upper_hz(&self) -> f64 {
        self.upper_hz
    }

    /// Bandwidth in Hz
    pub fn bandwidth_hz(&self) -> f64 {
        self.upper_hz - self.lower_hz
    }

    /// Whether the band fits below the Nyquist frequency of `sample_rate`
    pub fn is_supported(&self, sample_rate: u32) -> bool {
        self.upper_hz <= sample_rate as f64 / 2.0
    }

    /// Human-readable centre frequency ("31.5", "1k", "12.5k")
    ///
    /// Centres within 3% of an ISO nominal value use that value; others are
    /// printed rounded.
    pub fn label(&self) -> String {
        let nominal = NOMINAL_CENTERS_HZ
            .iter()
            .copied()
            .find(|n| (self.center_hz / n - 1.0).abs() < NOMINAL_TOLERANCE);

        match nominal {
            Some(n) if n >= 1000.0 => format!("{}k", trim_decimal(n / 1000.0, 2)),
            Some(n) => trim_decimal(n, 1),
            None if self.center_hz < 100.0 => trim_decimal(self.center_hz, 1),
            None => format!("{:.0}", self.center_hz),
        }
    }

    fn key(&self) -> (f64, f64, f64) {
        (self.center_hz, self.lower_hz, self.upper_hz)
    }
}

fn trim_decimal(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

impl PartialEq for FrequencyBand {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrequencyBand {}

impl PartialOrd for FrequencyBand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrequencyBand {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.key(), other.key());
        a.0.total_cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.total_cmp(&b.2))
    }
}

impl Hash for FrequencyBand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.center_hz.to_bits().hash(state);
        self.lower_hz.to_bits().hash(state);
        self.upper_hz.to_bits().hash(state);
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz [{:.1}-{:.1}]",
            self.label(),
            self.lower_hz,
            self.upper_hz
        )
    }
}

/// Which set of bands to analyze
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandScheme {
    /// Ten octave bands, 31.5 Hz to 16 kHz
    #[default]
    Octave,
    /// Thirty-one third-octave bands, 20 Hz to 20 kHz
    ThirdOctave,
    /// Three wide bands: 20-250 Hz, 250-2000 Hz, 2-20 kHz
    Broad,
    /// Caller-supplied bands
    Custom(Vec<FrequencyBand>),
}

impl BandScheme {
    /// All bands of the scheme, ascending and without duplicates
    ///
    /// Sample-rate support is not considered here; see
    /// [`Self::split_supported`].
    pub fn bands(&self) -> Vec<FrequencyBand> {
        let mut bands: Vec<FrequencyBand> = match self {
            BandScheme::Octave => OCTAVE_INDICES
                .iter()
                .filter_map(|&k| FrequencyBand::octave(REFERENCE_HZ * 2f64.powi(k)).ok())
                .collect(),
            BandScheme::ThirdOctave => (THIRD_OCTAVE_FIRST..=THIRD_OCTAVE_LAST)
                .filter_map(|k| {
                    FrequencyBand::third_octave(REFERENCE_HZ * 2f64.powf(k as f64 / 3.0)).ok()
                })
                .collect(),
            BandScheme::Broad => BROAD_RANGES_HZ
                .iter()
                .filter_map(|&(lo, hi)| FrequencyBand::from_edges(lo, hi).ok())
                .collect(),
            BandScheme::Custom(bands) => bands.clone(),
        };
        bands.sort();
        bands.dedup();
        bands
    }

    /// Partition the scheme's bands into (supported, unsupported) for a sample rate
    pub fn split_supported(&self, sample_rate: u32) -> (Vec<FrequencyBand>, Vec<FrequencyBand>) {
        self.bands()
            .into_iter()
            .partition(|band| band.is_supported(sample_rate))
    }

    /// Short name used in logs and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            BandScheme::Octave => "octave",
            BandScheme::ThirdOctave => "third-octave",
            BandScheme::Broad => "broad",
            BandScheme::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for BandScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BandScheme {
    type Err = Rt60Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "octave" | "1/1" => Ok(BandScheme::Octave),
            "third-octave" | "third_octave" | "1/3" => Ok(BandScheme::ThirdOctave),
            "broad" => Ok(BandScheme::Broad),
            other => Err(Rt60Error::InvalidConfig(format!(
                "unknown band scheme '{}' (expected octave, third-octave or broad)",
                other
            ))),
        }
    }
}

//! Decay-rate extraction by linear regression
//!
//! A straight line is fitted (ordinary least squares, level in dB against
//! time) to the part of a decay curve that lies inside a method's dB window,
//! and its slope is extrapolated to a 60 dB drop.

use crate::audio::bands::FrequencyBand;
use crate::decay::curve::DecayCurve;
use crate::error::{Result, Rt60Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slopes at or above this (dB/s) are treated as "no decay"
pub(crate) const MIN_DECAY_SLOPE: f64 = -1e-6;

/// Smallest number of in-window points a fit may use
pub const DEFAULT_MIN_FIT_POINTS: usize = 2;

/// Decay-range convention used for the fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Fit from -5 dB to -25 dB
    T20,
    /// Fit from -5 dB to -35 dB
    #[default]
    T30,
    /// Fit from 0 dB to -60 dB
    T60,
    /// Early decay time, fit from 0 dB to -10 dB
    #[serde(rename = "EDT")]
    Edt,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::T20, Method::T30, Method::T60, Method::Edt];

    /// (start, end) of the fit window in dB relative to the curve start
    pub fn fit_range_db(&self) -> (f64, f64) {
        match self {
            Method::T20 => (-5.0, -25.0),
            Method::T30 => (-5.0, -35.0),
            Method::T60 => (0.0, -60.0),
            Method::Edt => (0.0, -10.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::T20 => "T20",
            Method::T30 => "T30",
            Method::T60 => "T60",
            Method::Edt => "EDT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = Rt60Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "T20" => Ok(Method::T20),
            "T30" => Ok(Method::T30),
            "T60" => Ok(Method::T60),
            "EDT" => Ok(Method::Edt),
            other => Err(Rt60Error::InvalidConfig(format!(
                "unknown method '{}' (expected T20, T30, T60 or EDT)",
                other
            ))),
        }
    }
}

/// Result of an ordinary least-squares line fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient, 0 when `y` is constant
    pub correlation: f64,
}

/// Least-squares fit of `ys` on `xs`
///
/// Returns `None` for fewer than two points or when every `x` is equal.
pub fn least_squares(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let correlation = if syy > 0.0 {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    Some(LineFit {
        slope,
        intercept: mean_y - slope * mean_x,
        correlation,
    })
}

/// Reverberation time for one band and method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rt60Estimate {
    pub band: FrequencyBand,
    pub method: Method,
    /// Seconds for a 60 dB decay; `None` when the curve does not support a fit
    pub value_seconds: Option<f64>,
    /// Pearson r of the fit, in [-1, 1]
    pub correlation: f64,
    pub fit_range_db: (f64, f64),
    /// Fitted decay slope in dB/s
    pub slope_db_per_sec: Option<f64>,
    /// Curve points inside the fit window
    pub points_used: usize,
    /// Noise floor of the band's decay curve
    pub noise_floor_db: Option<f64>,
}

impl Rt60Estimate {
    /// An estimate with no value
    pub fn undefined(band: FrequencyBand, method: Method, noise_floor_db: Option<f64>) -> Self {
        Self {
            band,
            method,
            value_seconds: None,
            correlation: 0.0,
            fit_range_db: method.fit_range_db(),
            slope_db_per_sec: None,
            points_used: 0,
            noise_floor_db,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value_seconds.is_some()
    }
}

/// Fits decay curves
#[derive(Debug, Clone)]
pub struct DecayRegressor {
    min_points: usize,
}

impl Default for DecayRegressor {
    fn default() -> Self {
        Self {
            min_points: DEFAULT_MIN_FIT_POINTS,
        }
    }
}

impl DecayRegressor {
    /// Create a regressor that needs at least `min_points` in-window samples
    pub fn new(min_points: usize) -> Result<Self> {
        if min_points < 2 {
            return Err(Rt60Error::InvalidConfig(format!(
                "a line fit needs at least 2 points, got min_points = {}",
                min_points
            )));
        }
        Ok(Self { min_points })
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Fit `curve` over the window of `method`
    ///
    /// The estimate is undefined when the curve never falls to the window's
    /// end level, when fewer than `min_points` samples lie in the window, or
    /// when the fitted slope is not negative.
    ///
    /// # Example
    /// ```
    /// use reverbmeter_core::{DecayCurve, DecayRegressor, FrequencyBand, Method};
    ///
    /// // A straight 60 dB/s decay sampled every 10 ms
    /// let times: Vec<f64> = (0..100).map(|i| i as f64 * 0.01).collect();
    /// let levels: Vec<f64> = times.iter().map(|t| -60.0 * t).collect();
    /// let curve = DecayCurve::new(times, levels, None).unwrap();
    ///
    /// let band = FrequencyBand::octave(1000.0).unwrap();
    /// let estimate = DecayRegressor::default().fit(&curve, band, Method::T30);
    /// assert!((estimate.value_seconds.unwrap() - 1.0).abs() < 1e-9);
    /// ```
    pub fn fit(&self, curve: &DecayCurve, band: FrequencyBand, method: Method) -> Rt60Estimate {
        let (start_db, end_db) = method.fit_range_db();
        let mut estimate = Rt60Estimate::undefined(band, method, curve.noise_floor_db());

        let reaches_end = curve
            .levels_db()
            .last()
            .is_some_and(|&last| last <= end_db);
        if curve.len() < 2 || !reaches_end {
            tracing::debug!(
                band = %band,
                method = %method,
                final_level_db = curve.final_level_db(),
                "decay_range_not_reached"
            );
            return estimate;
        }

        let (times, levels): (Vec<f64>, Vec<f64>) = curve
            .times()
            .iter()
            .zip(curve.levels_db())
            .filter(|&(_, &level)| level <= start_db && level >= end_db)
            .map(|(&t, &level)| (t, level))
            .unzip();
        estimate.points_used = times.len();
        if times.len() < self.min_points {
            return estimate;
        }

        let Some(line) = least_squares(&times, &levels) else {
            return estimate;
        };
        estimate.correlation = line.correlation;
        estimate.slope_db_per_sec = Some(line.slope);
        if line.slope >= MIN_DECAY_SLOPE {
            return estimate;
        }

        estimate.value_seconds = Some(60.0 / line.slope.abs());
        estimate
    }
}

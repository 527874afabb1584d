//! Summary statistics over per-band values

use serde::Serialize;

/// Mean, spread and extent of a set of values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation (0 for a single value)
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Summarize `values`, or `None` when there are none
    ///
    /// # Example
    /// ```
    /// use reverbmeter_core::stats::summary::Summary;
    ///
    /// let summary = Summary::of(&[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(summary.mean, 2.0);
    /// assert!((summary.std_dev - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    /// assert!(Summary::of(&[]).is_none());
    /// ```
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Some(Self {
            count,
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_value_has_zero_spread() {
        let summary = Summary::of(&[1.7]).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, 1.7);
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.min, 1.7);
        assert_eq!(summary.max, 1.7);
    }

    #[test]
    fn test_population_std_dev() {
        let summary = Summary::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(summary.mean, 5.0);
        assert_relative_eq!(summary.std_dev, 2.0);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 9.0);
    }
}

//! Per-band RT60 report
//!
//! A report is produced whole: every requested band appears either with an
//! estimate (possibly undefined) or in the failed set, and the summary is
//! computed over defined estimates only.

use crate::audio::bands::FrequencyBand;
use crate::decay::regression::{Method, Rt60Estimate};
use crate::error::Result;
use crate::stats::summary::Summary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Default |r| at or above which a band estimate is flagged reliable
pub const DEFAULT_RELIABLE_CORRELATION: f64 = 0.95;

/// Why a band has no RT60 value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandFailure {
    /// The band reaches above the Nyquist frequency
    UnsupportedBand,
    /// The decay curve does not cover the method's range
    InsufficientDecayData,
}

impl fmt::Display for BandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandFailure::UnsupportedBand => f.write_str("unsupported band"),
            BandFailure::InsufficientDecayData => f.write_str("insufficient decay data"),
        }
    }
}

/// Serialize `None` as the string "undefined"
fn undefined_if_none<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_str("undefined"),
    }
}

/// One line of the report table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub band_center_hz: f64,
    pub band_lower_hz: f64,
    pub band_upper_hz: f64,
    pub label: String,
    #[serde(serialize_with = "undefined_if_none")]
    pub rt60_seconds: Option<f64>,
    pub correlation_coefficient: f64,
    /// Defined and |r| at or above the report's threshold
    pub reliable: bool,
    pub failure: Option<BandFailure>,
}

/// RT60 per band plus summary statistics
#[derive(Debug, Clone)]
pub struct Rt60Report {
    per_band: BTreeMap<FrequencyBand, Rt60Estimate>,
    overall_mean_seconds: Option<f64>,
    overall_std_dev: Option<f64>,
    failed_bands: BTreeMap<FrequencyBand, BandFailure>,
    pub method: Method,
    pub sample_rate: u32,
    pub duration_secs: f64,
    /// Frequency with the greatest spectral magnitude in the input
    pub dominant_frequency_hz: Option<f64>,
    /// Source channel for per-channel reports
    pub channel: Option<u16>,
    pub reliable_correlation: f64,
    pub generated_at: DateTime<Utc>,
}

impl Rt60Report {
    /// Assemble a report from per-band estimates and the unsupported bands
    ///
    /// Undefined estimates are kept in `per_band` and also recorded in
    /// `failed_bands` as [`BandFailure::InsufficientDecayData`].
    pub fn new(
        method: Method,
        sample_rate: u32,
        duration_secs: f64,
        estimates: impl IntoIterator<Item = Rt60Estimate>,
        unsupported: impl IntoIterator<Item = FrequencyBand>,
    ) -> Self {
        let per_band: BTreeMap<FrequencyBand, Rt60Estimate> =
            estimates.into_iter().map(|e| (e.band, e)).collect();

        let mut failed_bands: BTreeMap<FrequencyBand, BandFailure> = unsupported
            .into_iter()
            .map(|band| (band, BandFailure::UnsupportedBand))
            .collect();
        for (band, estimate) in &per_band {
            if !estimate.is_defined() {
                failed_bands.insert(*band, BandFailure::InsufficientDecayData);
            }
        }

        let values: Vec<f64> = per_band.values().filter_map(|e| e.value_seconds).collect();
        let summary = Summary::of(&values);

        Self {
            per_band,
            overall_mean_seconds: summary.map(|s| s.mean),
            overall_std_dev: summary.map(|s| s.std_dev),
            failed_bands,
            method,
            sample_rate,
            duration_secs,
            dominant_frequency_hz: None,
            channel: None,
            reliable_correlation: DEFAULT_RELIABLE_CORRELATION,
            generated_at: Utc::now(),
        }
    }

    pub fn with_dominant_frequency(mut self, frequency_hz: Option<f64>) -> Self {
        self.dominant_frequency_hz = frequency_hz;
        self
    }

    pub fn with_channel(mut self, channel: u16) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_reliable_correlation(mut self, threshold: f64) -> Self {
        self.reliable_correlation = threshold;
        self
    }

    /// Estimates for every band that was analyzed, ascending by centre
    pub fn per_band(&self) -> &BTreeMap<FrequencyBand, Rt60Estimate> {
        &self.per_band
    }

    /// Bands without a value and the reason
    pub fn failed_bands(&self) -> &BTreeMap<FrequencyBand, BandFailure> {
        &self.failed_bands
    }

    /// Mean of defined estimates
    pub fn overall_mean_seconds(&self) -> Option<f64> {
        self.overall_mean_seconds
    }

    /// Population standard deviation of defined estimates
    pub fn overall_std_dev(&self) -> Option<f64> {
        self.overall_std_dev
    }

    /// Number of bands with a value
    pub fn defined_count(&self) -> usize {
        self.per_band.values().filter(|e| e.is_defined()).count()
    }

    /// Full summary over defined estimates
    pub fn summary(&self) -> Option<Summary> {
        let values: Vec<f64> = self.per_band.values().filter_map(|e| e.value_seconds).collect();
        Summary::of(&values)
    }

    pub fn estimate(&self, band: &FrequencyBand) -> Option<&Rt60Estimate> {
        self.per_band.get(band)
    }

    /// Whether an estimate passes the report's correlation threshold
    pub fn is_reliable(&self, estimate: &Rt60Estimate) -> bool {
        estimate.is_defined() && estimate.correlation.abs() >= self.reliable_correlation
    }

    /// The report table, one row per requested band, ascending by centre
    pub fn rows(&self) -> Vec<ReportRow> {
        let mut bands: Vec<FrequencyBand> = self
            .per_band
            .keys()
            .chain(self.failed_bands.keys())
            .copied()
            .collect();
        bands.sort();
        bands.dedup();

        bands
            .into_iter()
            .map(|band| {
                let estimate = self.per_band.get(&band);
                ReportRow {
                    band_center_hz: band.center_hz(),
                    band_lower_hz: band.lower_hz(),
                    band_upper_hz: band.upper_hz(),
                    label: band.label(),
                    rt60_seconds: estimate.and_then(|e| e.value_seconds),
                    correlation_coefficient: estimate.map_or(0.0, |e| e.correlation),
                    reliable: estimate.is_some_and(|e| self.is_reliable(e)),
                    failure: self.failed_bands.get(&band).copied(),
                }
            })
            .collect()
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    method: Method,
    sample_rate: u32,
    duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<u16>,
    dominant_frequency_hz: Option<f64>,
    reliable_correlation: f64,
    generated_at: &'a DateTime<Utc>,
    rows: Vec<ReportRow>,
    #[serde(serialize_with = "undefined_if_none")]
    overall_mean_seconds: Option<f64>,
    #[serde(serialize_with = "undefined_if_none")]
    overall_std_dev: Option<f64>,
    defined_bands: usize,
    failed_bands: usize,
}

impl Serialize for Rt60Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ReportDocument {
            method: self.method,
            sample_rate: self.sample_rate,
            duration_secs: self.duration_secs,
            channel: self.channel,
            dominant_frequency_hz: self.dominant_frequency_hz,
            reliable_correlation: self.reliable_correlation,
            generated_at: &self.generated_at,
            rows: self.rows(),
            overall_mean_seconds: self.overall_mean_seconds,
            overall_std_dev: self.overall_std_dev,
            defined_bands: self.defined_count(),
            failed_bands: self.failed_bands.len(),
        }
        .serialize(serializer)
    }
}

fn format_seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| format!("{:.3} s", v))
}

impl fmt::Display for Rt60Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} per band ({} Hz, {:.2} s)",
            self.method, self.sample_rate, self.duration_secs
        )?;
        writeln!(f, "{:>8}  {:>12}  {:>7}  note", "band", "rt60", "r")?;
        for row in self.rows() {
            let note = match (row.failure, row.reliable) {
                (Some(failure), _) => failure.to_string(),
                (None, true) => String::new(),
                (None, false) => "low correlation".to_string(),
            };
            writeln!(
                f,
                "{:>8}  {:>12}  {:>7.3}  {}",
                row.label,
                format_seconds(row.rt60_seconds),
                row.correlation_coefficient,
                note
            )?;
        }
        writeln!(f, "mean     {}", format_seconds(self.overall_mean_seconds))?;
        write!(f, "std dev  {}", format_seconds(self.overall_std_dev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(center: f64, value: Option<f64>, correlation: f64) -> Rt60Estimate {
        let band = FrequencyBand::octave(center).unwrap();
        let mut estimate = Rt60Estimate::undefined(band, Method::T30, None);
        estimate.value_seconds = value;
        estimate.correlation = correlation;
        estimate
    }

    #[test]
    fn test_summary_over_defined_only() {
        let report = Rt60Report::new(
            Method::T30,
            48000,
            2.0,
            vec![
                estimate(500.0, Some(1.0), -0.99),
                estimate(1000.0, Some(2.0), -0.99),
                estimate(2000.0, None, 0.0),
            ],
            Vec::new(),
        );
        assert_eq!(report.overall_mean_seconds(), Some(1.5));
        assert_eq!(report.overall_std_dev(), Some(0.5));
        assert_eq!(report.defined_count(), 2);
        assert_eq!(report.failed_bands().len(), 1);
        let failed = FrequencyBand::octave(2000.0).unwrap();
        assert_eq!(
            report.failed_bands().get(&failed),
            Some(&BandFailure::InsufficientDecayData)
        );
        // Undefined estimates stay in the table
        assert_eq!(report.per_band().len(), 3);
    }

    #[test]
    fn test_summary_fields_follow_estimates() {
        let report = Rt60Report::new(
            Method::T20,
            48000,
            1.0,
            vec![
                estimate(250.0, Some(0.6), -0.98),
                estimate(500.0, Some(0.9), -0.98),
                estimate(1000.0, None, 0.0),
            ],
            vec![FrequencyBand::octave(16000.0).unwrap()],
        )
        .with_channel(1);

        let summary = report.summary().unwrap();
        assert_eq!(report.overall_mean_seconds(), Some(summary.mean));
        assert_eq!(report.overall_std_dev(), Some(summary.std_dev));
        for (band, estimate) in report.per_band() {
            assert_eq!(report.failed_bands().contains_key(band), !estimate.is_defined());
        }
        assert_eq!(report.failed_bands().len(), 2);
        assert_eq!(report.rows().len(), 4);
    }

    #[test]
    fn test_all_undefined_has_undefined_summary() {
        let report = Rt60Report::new(
            Method::T20,
            48000,
            1.0,
            vec![estimate(1000.0, None, 0.0)],
            Vec::new(),
        );
        assert_eq!(report.overall_mean_seconds(), None);
        assert_eq!(report.overall_std_dev(), None);
        assert!(report.summary().is_none());
    }

    #[test]
    fn test_rows_include_unsupported_bands() {
        let unsupported = FrequencyBand::octave(16000.0).unwrap();
        let report = Rt60Report::new(
            Method::T30,
            44100,
            1.0,
            vec![estimate(1000.0, Some(0.8), -0.97)],
            vec![unsupported],
        );
        let rows = report.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "1k");
        assert!(rows[0].reliable);
        assert_eq!(rows[1].label, "16k");
        assert_eq!(rows[1].failure, Some(BandFailure::UnsupportedBand));
        assert_eq!(rows[1].rt60_seconds, None);
    }

    #[test]
    fn test_reliability_threshold() {
        let report = Rt60Report::new(
            Method::T30,
            48000,
            1.0,
            vec![estimate(1000.0, Some(1.0), -0.9)],
            Vec::new(),
        );
        assert!(!report.rows()[0].reliable);
        let relaxed = report.with_reliable_correlation(0.85);
        assert!(relaxed.rows()[0].reliable);
    }

    #[test]
    fn test_json_marks_undefined() {
        let report = Rt60Report::new(
            Method::T30,
            48000,
            1.0,
            vec![estimate(1000.0, None, 0.0)],
            Vec::new(),
        );
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["rows"][0]["rt60_seconds"], "undefined");
        assert_eq!(value["rows"][0]["failure"], "insufficient_decay_data");
        assert_eq!(value["overall_mean_seconds"], "undefined");
        assert_eq!(value["overall_std_dev"], "undefined");
        assert_eq!(value["method"], "T30");
        assert!(value.get("channel").is_none());
    }

    #[test]
    fn test_display_lists_every_band() {
        let report = Rt60Report::new(
            Method::T30,
            48000,
            1.0,
            vec![estimate(500.0, Some(1.25), -0.99), estimate(1000.0, None, 0.0)],
            Vec::new(),
        );
        let text = report.to_string();
        assert!(text.contains("500"));
        assert!(text.contains("1.250 s"));
        assert!(text.contains("insufficient decay data"));
        assert!(text.contains("mean     1.250 s"));
    }
}

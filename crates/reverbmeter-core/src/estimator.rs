//! Estimation orchestrator
//!
//! Runs filter -> decay curve -> fit for every band of a scheme and gathers
//! the results into an [`Rt60Report`]. Bands are independent, so they are
//! spread over a small pool of scoped worker threads fed through a
//! crossbeam job channel; estimates come back on a result channel.

use crate::audio::bands::{BandScheme, FrequencyBand};
use crate::audio::buffer::SignalBuffer;
use crate::audio::filter::BandFilterBank;
use crate::audio::spectrum;
use crate::config::EstimatorConfig;
use crate::decay::curve::DecayCurveBuilder;
use crate::decay::regression::{DecayRegressor, Method, Rt60Estimate};
use crate::error::{Result, Rt60Error};
use crate::stats::report::Rt60Report;
use std::num::NonZeroUsize;
use std::time::Instant;

/// RT60 estimation engine
///
/// # Example
/// ```
/// use reverbmeter_core::audio::signal::SyntheticDecay;
/// use reverbmeter_core::{BandScheme, Estimator, EstimatorConfig, Method};
///
/// let signal = SyntheticDecay::new(16000, 1.0, 60.0).unwrap().generate().unwrap();
/// let estimator = Estimator::new(EstimatorConfig::default()).unwrap();
/// let report = estimator.estimate(&signal, &BandScheme::Broad, Method::T20).unwrap();
/// assert_eq!(report.rows().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Estimator {
    config: EstimatorConfig,
    filter_bank: BandFilterBank,
    curve_builder: DecayCurveBuilder,
    regressor: DecayRegressor,
}

impl Estimator {
    /// Create an estimator from a validated configuration
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter_bank: BandFilterBank::new(config.filter_order)?,
            curve_builder: DecayCurveBuilder::new(config.decay.clone())?,
            regressor: DecayRegressor::new(config.min_fit_points)?,
            config,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate with the configured scheme and method
    pub fn estimate_configured(&self, signal: &SignalBuffer) -> Result<Rt60Report> {
        self.estimate(signal, &self.config.scheme, self.config.method)
    }

    /// Estimate RT60 per band of `scheme`
    ///
    /// Multi-channel input is downmixed to mono first. Bands above the
    /// Nyquist frequency and bands whose decay does not cover the method's
    /// range appear in the report's failed set; neither aborts the run.
    ///
    /// # Errors
    /// [`Rt60Error::DegenerateSignal`] when the buffer holds fewer than two
    /// frames.
    pub fn estimate(
        &self,
        signal: &SignalBuffer,
        scheme: &BandScheme,
        method: Method,
    ) -> Result<Rt60Report> {
        check_frames(signal)?;
        let mono = signal.to_mono();
        let dominant = self.dominant_frequency(&mono);
        Ok(self
            .estimate_mono(&mono, scheme, method)
            .with_dominant_frequency(dominant))
    }

    /// One report per channel of `signal`
    ///
    /// The dominant frequency is taken once from the downmix and shared by
    /// every channel's report.
    pub fn estimate_per_channel(
        &self,
        signal: &SignalBuffer,
        scheme: &BandScheme,
        method: Method,
    ) -> Result<Vec<Rt60Report>> {
        check_frames(signal)?;
        let dominant = self.dominant_frequency(&signal.to_mono());
        (0..signal.channels())
            .map(|ch| {
                let channel = signal.channel(ch)?;
                Ok(self
                    .estimate_mono(&channel, scheme, method)
                    .with_dominant_frequency(dominant)
                    .with_channel(ch))
            })
            .collect()
    }

    fn dominant_frequency(&self, mono: &SignalBuffer) -> Option<f64> {
        if self.config.dominant_frequency {
            spectrum::dominant_frequency(mono)
        } else {
            None
        }
    }

    /// Band analysis of a single-channel buffer
    fn estimate_mono(
        &self,
        mono: &SignalBuffer,
        scheme: &BandScheme,
        method: Method,
    ) -> Rt60Report {
        let started = Instant::now();
        let (supported, unsupported) = scheme.split_supported(mono.sample_rate());
        for band in &unsupported {
            tracing::warn!(
                band = %band,
                sample_rate = mono.sample_rate(),
                "band_above_nyquist"
            );
        }

        let workers = self.worker_count(supported.len());
        tracing::info!(
            scheme = %scheme,
            method = %method,
            bands = supported.len(),
            unsupported = unsupported.len(),
            workers,
            duration_secs = mono.duration_secs(),
            "estimation_started"
        );

        let estimates = if workers <= 1 {
            supported
                .iter()
                .map(|&band| self.analyze_band(mono, band, method))
                .collect()
        } else {
            self.analyze_parallel(mono, &supported, method, workers)
        };

        let report = Rt60Report::new(
            method,
            mono.sample_rate(),
            mono.duration_secs(),
            estimates,
            unsupported,
        )
        .with_reliable_correlation(self.config.reliable_correlation);

        tracing::info!(
            defined = report.defined_count(),
            failed = report.failed_bands().len(),
            mean_seconds = ?report.overall_mean_seconds(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "estimation_complete"
        );
        report
    }

    /// Threads to use for `bands` bands
    fn worker_count(&self, bands: usize) -> usize {
        let available = self.config.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });
        available.min(bands).max(1)
    }

    fn analyze_parallel(
        &self,
        mono: &SignalBuffer,
        bands: &[FrequencyBand],
        method: Method,
        workers: usize,
    ) -> Vec<Rt60Estimate> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<FrequencyBand>(bands.len());
        let (result_tx, result_rx) = crossbeam_channel::bounded::<Rt60Estimate>(bands.len());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || {
                    for band in jobs.iter() {
                        if results.send(self.analyze_band(mono, band, method)).is_err() {
                            break;
                        }
                    }
                });
            }
            for &band in bands {
                if job_tx.send(band).is_err() {
                    break;
                }
            }
            drop(job_tx);
        });
        drop(result_tx);

        result_rx.try_iter().collect()
    }

    /// Filter, integrate and fit one band; problems yield an undefined estimate
    fn analyze_band(
        &self,
        mono: &SignalBuffer,
        band: FrequencyBand,
        method: Method,
    ) -> Rt60Estimate {
        let filtered = match self.filter_bank.filter_band(mono, band) {
            Ok(Some(filtered)) => filtered,
            Ok(None) => return Rt60Estimate::undefined(band, method, None),
            Err(e) => {
                tracing::warn!(band = %band, error = %e, "band_filter_failed");
                return Rt60Estimate::undefined(band, method, None);
            }
        };

        let curve = match self.curve_builder.build(&filtered) {
            Ok(curve) => curve,
            Err(e) => {
                tracing::warn!(band = %band, error = %e, "decay_curve_failed");
                return Rt60Estimate::undefined(band, method, None);
            }
        };

        let estimate = self.regressor.fit(&curve, band, method);
        tracing::debug!(
            band = %band,
            rt60_seconds = ?estimate.value_seconds,
            correlation = estimate.correlation,
            noise_floor_db = ?estimate.noise_floor_db,
            points = curve.len(),
            "band_estimated"
        );
        estimate
    }
}

fn check_frames(signal: &SignalBuffer) -> Result<()> {
    if signal.frames() < 2 {
        return Err(Rt60Error::DegenerateSignal(format!(
            "need at least 2 frames, got {}",
            signal.frames()
        )));
    }
    Ok(())
}

/// Estimate with default settings
///
/// # Example
/// ```
/// use reverbmeter_core::{estimate, BandScheme, Method, SignalBuffer};
///
/// let silence = SignalBuffer::mono(vec![0.0; 8000], 8000).unwrap();
/// let report = estimate(&silence, &BandScheme::Octave, Method::T30).unwrap();
/// assert_eq!(report.defined_count(), 0);
/// assert!(report.overall_mean_seconds().is_none());
/// ```
pub fn estimate(signal: &SignalBuffer, scheme: &BandScheme, method: Method) -> Result<Rt60Report> {
    Estimator::new(EstimatorConfig::default())?.estimate(signal, scheme, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::signal::{decaying_tone, SyntheticDecay};
    use crate::stats::report::BandFailure;

    #[test]
    fn test_one_frame_is_degenerate() {
        let signal = SignalBuffer::mono(vec![0.25], 48000).unwrap();
        let result = estimate(&signal, &BandScheme::Octave, Method::T30);
        assert!(matches!(result, Err(Rt60Error::DegenerateSignal(_))));

        let empty = SignalBuffer::mono(Vec::new(), 48000).unwrap();
        assert!(estimate(&empty, &BandScheme::Octave, Method::T30).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EstimatorConfig {
            filter_order: 0,
            ..Default::default()
        };
        assert!(Estimator::new(config).is_err());
    }

    #[test]
    fn test_worker_count_bounded_by_bands() {
        let estimator = Estimator::new(EstimatorConfig {
            max_workers: Some(8),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(estimator.worker_count(3), 3);
        assert_eq!(estimator.worker_count(20), 8);
        assert_eq!(estimator.worker_count(0), 1);
    }

    #[test]
    fn test_silence_is_undefined_everywhere() {
        let signal = SignalBuffer::mono(vec![0.0; 48000], 48000).unwrap();
        let report = estimate(&signal, &BandScheme::Octave, Method::T30).unwrap();
        assert_eq!(report.per_band().len(), 10);
        assert_eq!(report.defined_count(), 0);
        assert_eq!(report.failed_bands().len(), 10);
        assert!(report
            .failed_bands()
            .values()
            .all(|f| *f == BandFailure::InsufficientDecayData));
        assert_eq!(report.overall_mean_seconds(), None);
        assert_eq!(report.overall_std_dev(), None);
        assert_eq!(report.dominant_frequency_hz, None);
    }

    #[test]
    fn test_unsupported_bands_recorded() {
        let signal = decaying_tone(1000.0, 8000, 0.5, 60.0).unwrap();
        let report = estimate(&signal, &BandScheme::Octave, Method::T20).unwrap();
        let unsupported = report
            .failed_bands()
            .values()
            .filter(|f| **f == BandFailure::UnsupportedBand)
            .count();
        // 4k, 8k and 16k octaves reach above 4 kHz
        assert_eq!(unsupported, 3);
        assert_eq!(report.per_band().len(), 7);
        assert_eq!(report.rows().len(), 10);
    }

    #[test]
    fn test_parallel_matches_inline() {
        let signal = SyntheticDecay::new(16000, 1.0, 60.0)
            .unwrap()
            .generate()
            .unwrap();
        let inline = Estimator::new(EstimatorConfig {
            max_workers: Some(1),
            ..Default::default()
        })
        .unwrap()
        .estimate(&signal, &BandScheme::Octave, Method::T20)
        .unwrap();
        let parallel = Estimator::new(EstimatorConfig {
            max_workers: Some(4),
            ..Default::default()
        })
        .unwrap()
        .estimate(&signal, &BandScheme::Octave, Method::T20)
        .unwrap();

        assert_eq!(inline.per_band(), parallel.per_band());
        assert_eq!(inline.overall_mean_seconds(), parallel.overall_mean_seconds());
    }

    #[test]
    fn test_per_channel_reports() {
        let tone = decaying_tone(1000.0, 16000, 1.0, 60.0).unwrap();
        let interleaved: Vec<f32> = tone
            .samples()
            .iter()
            .flat_map(|&s| [s, 0.0])
            .collect();
        let stereo = SignalBuffer::new(interleaved, 16000, 2).unwrap();

        let estimator = Estimator::new(EstimatorConfig::default()).unwrap();
        let reports = estimator
            .estimate_per_channel(&stereo, &BandScheme::Broad, Method::T20)
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].channel, Some(0));
        assert_eq!(reports[1].channel, Some(1));
        assert!(reports[0].defined_count() >= 1);
        assert_eq!(reports[1].defined_count(), 0);
        // Shared across channels, taken from the downmix
        assert_eq!(reports[0].dominant_frequency_hz, reports[1].dominant_frequency_hz);
        assert!(reports[1].dominant_frequency_hz.is_some());
    }

    #[test]
    fn test_dominant_frequency_can_be_skipped() {
        let tone = decaying_tone(1000.0, 16000, 1.0, 60.0).unwrap();
        let with_spectrum = estimate(&tone, &BandScheme::Broad, Method::T20).unwrap();
        let dominant = with_spectrum.dominant_frequency_hz.unwrap();
        assert!((dominant - 1000.0).abs() < 5.0, "dominant {}", dominant);

        let estimator = Estimator::new(EstimatorConfig {
            dominant_frequency: false,
            ..Default::default()
        })
        .unwrap();
        let without = estimator
            .estimate(&tone, &BandScheme::Broad, Method::T20)
            .unwrap();
        assert_eq!(without.dominant_frequency_hz, None);
        assert_eq!(without.per_band(), with_spectrum.per_band());

        let reports = estimator
            .estimate_per_channel(&tone, &BandScheme::Broad, Method::T20)
            .unwrap();
        assert_eq!(reports[0].dominant_frequency_hz, None);
    }
}

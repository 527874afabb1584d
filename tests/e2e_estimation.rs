//! E2E tests for the estimation orchestrator
//!
//! Drives the full filter -> decay curve -> fit chain with synthetic room
//! decays whose RT60 is known in advance.

use approx::assert_relative_eq;
use reverbmeter::audio::signal::{mix, SyntheticDecay};
use reverbmeter::{
    estimate, BandFailure, BandScheme, Estimator, EstimatorConfig, FrequencyBand, Method,
    Rt60Error, SignalBuffer,
};

fn octave(center: f64) -> FrequencyBand {
    FrequencyBand::octave(center).unwrap()
}

/// Band-limited MLS noise decaying at `rate` dB/s
fn band_decay(center: f64, seconds: f64, rate: f64) -> SignalBuffer {
    SyntheticDecay::new(48000, seconds, rate)
        .unwrap()
        .with_band(octave(center))
        .generate()
        .unwrap()
}

/// Test the 1 s, -30 dB/s, 1 kHz band-noise scenario
///
/// One second of a 2 s reverberation ends only 30 dB down. The missing
/// decay is added back to the curve, so T30 is still close to 2 s.
#[test]
fn test_one_second_t30_scenario() {
    let signal = band_decay(1000.0, 1.0, 30.0);
    let scheme = BandScheme::Custom(vec![octave(1000.0)]);
    let report = estimate(&signal, &scheme, Method::T30).unwrap();

    assert!(report.failed_bands().is_empty());
    let value = report.estimate(&octave(1000.0)).unwrap().value_seconds.unwrap();
    assert_relative_eq!(value, 2.0, max_relative = 0.05);
    assert_eq!(report.overall_mean_seconds(), Some(value));
    assert_eq!(report.overall_std_dev(), Some(0.0));
}

/// Test that short recordings of a slow decay are not biased low
#[test]
fn test_short_recordings_of_slow_decay() {
    let scheme = BandScheme::Custom(vec![octave(1000.0)]);
    for seconds in [1.2, 1.5] {
        let signal = band_decay(1000.0, seconds, 30.0);
        let report = estimate(&signal, &scheme, Method::T30).unwrap();
        let value = report.overall_mean_seconds().unwrap();
        assert_relative_eq!(value, 2.0, max_relative = 0.03);
    }
}

/// Test that switching off tail compensation brings the truncation bias back
#[test]
fn test_uncompensated_curve_reads_low() {
    let signal = band_decay(1000.0, 1.0, 30.0);
    let scheme = BandScheme::Custom(vec![octave(1000.0)]);
    let mut config = EstimatorConfig::default();
    config.decay.tail_compensation = false;
    let report = Estimator::new(config)
        .unwrap()
        .estimate(&signal, &scheme, Method::T30)
        .unwrap();
    let value = report.overall_mean_seconds().unwrap();
    assert!(value < 1.85, "uncompensated T30 {}", value);
}

/// Test that a longer recording of the same room is accurate to 2%
#[test]
fn test_two_second_t30_within_two_percent() {
    let signal = band_decay(1000.0, 2.0, 30.0);
    let scheme = BandScheme::Custom(vec![octave(1000.0)]);
    let report = estimate(&signal, &scheme, Method::T30).unwrap();

    let value = report.overall_mean_seconds().unwrap();
    assert_relative_eq!(value, 2.0, max_relative = 0.02);
    assert!(report.rows()[0].reliable);
}

/// Test that each band of a clean decay recovers 60/rate
#[test]
fn test_band_decays_recover_rt60() {
    for center in [1000.0, 4000.0] {
        let signal = band_decay(center, 2.0, 60.0);
        let scheme = BandScheme::Custom(vec![octave(center)]);
        let report = estimate(&signal, &scheme, Method::T30).unwrap();
        let value = report.overall_mean_seconds().unwrap();
        assert_relative_eq!(value, 1.0, max_relative = 0.02);
    }
}

/// Test two bands where one is buried under a -15 dB noise floor
#[test]
fn test_noise_floor_scenario() {
    let sr = 48000;
    let clean = SyntheticDecay::new(sr, 2.0, 60.0)
        .unwrap()
        .with_band(octave(1000.0))
        .samples_f64()
        .unwrap();
    let masked = SyntheticDecay::new(sr, 2.0, 60.0)
        .unwrap()
        .with_band(octave(4000.0))
        .with_offset(10000)
        .samples_f64()
        .unwrap();
    let floor = SyntheticDecay::new(sr, 2.0, 0.0)
        .unwrap()
        .with_band(octave(4000.0))
        .with_offset(20000)
        .with_gain_db(-15.0)
        .samples_f64()
        .unwrap();
    let signal = mix(&[clean, masked, floor], sr).unwrap();

    let scheme = BandScheme::Custom(vec![octave(1000.0), octave(4000.0)]);
    let report = estimate(&signal, &scheme, Method::T30).unwrap();

    assert_eq!(report.per_band().len(), 2);
    assert_eq!(report.defined_count(), 1);
    assert_eq!(
        report.failed_bands().get(&octave(4000.0)),
        Some(&BandFailure::InsufficientDecayData)
    );
    assert!(!report.failed_bands().contains_key(&octave(1000.0)));

    let defined = report.estimate(&octave(1000.0)).unwrap().value_seconds.unwrap();
    assert_relative_eq!(defined, 1.0, max_relative = 0.03);
    assert_eq!(report.overall_mean_seconds(), Some(defined));
    assert_eq!(report.overall_std_dev(), Some(0.0));

    let masked_estimate = report.estimate(&octave(4000.0)).unwrap();
    let floor_db = masked_estimate.noise_floor_db.unwrap();
    assert!((floor_db + 15.0).abs() < 2.0, "floor {}", floor_db);
}

/// Test that silence is undefined in every band without failing the call
#[test]
fn test_silence_undefined_everywhere() {
    let signal = SignalBuffer::mono(vec![0.0; 96000], 48000).unwrap();
    for method in Method::ALL {
        let report = estimate(&signal, &BandScheme::ThirdOctave, method).unwrap();
        assert_eq!(report.defined_count(), 0);
        assert_eq!(report.failed_bands().len(), 31);
        assert!(report.overall_mean_seconds().is_none());
    }
}

/// Test that a one-sample buffer is rejected as a whole
#[test]
fn test_one_sample_is_degenerate() {
    let signal = SignalBuffer::mono(vec![0.3], 48000).unwrap();
    let result = estimate(&signal, &BandScheme::Octave, Method::T30);
    assert!(matches!(result, Err(Rt60Error::DegenerateSignal(_))));
}

/// Test that bands above Nyquist are reported, not estimated
#[test]
fn test_low_sample_rate_marks_high_bands_unsupported() {
    let signal = SyntheticDecay::new(16000, 1.0, 60.0)
        .unwrap()
        .generate()
        .unwrap();
    let report = estimate(&signal, &BandScheme::Octave, Method::T20).unwrap();

    for (band, failure) in report.failed_bands() {
        if band.upper_hz() > 8000.0 {
            assert_eq!(*failure, BandFailure::UnsupportedBand);
            assert!(!report.per_band().contains_key(band));
        }
    }
    // 8k and 16k octaves
    let unsupported = report
        .failed_bands()
        .values()
        .filter(|f| **f == BandFailure::UnsupportedBand)
        .count();
    assert_eq!(unsupported, 2);
    assert_eq!(report.rows().len(), 10);
}

/// Test that broadband noise gives consistent values across octaves
#[test]
fn test_broadband_decay_across_octaves() {
    let signal = SyntheticDecay::new(48000, 2.0, 60.0)
        .unwrap()
        .generate()
        .unwrap();
    let estimator = Estimator::new(EstimatorConfig {
        max_workers: Some(4),
        ..Default::default()
    })
    .unwrap();
    let report = estimator
        .estimate(&signal, &BandScheme::Octave, Method::T20)
        .unwrap();

    for center in [500.0, 1000.0, 2000.0, 4000.0] {
        let value = report.estimate(&octave(center)).unwrap().value_seconds.unwrap();
        assert_relative_eq!(value, 1.0, max_relative = 0.05);
    }
    assert!(report.dominant_frequency_hz.is_some());
}

/// Test that stereo input is downmixed unless per-channel reports are asked for
#[test]
fn test_stereo_input() {
    let left = band_decay(1000.0, 1.5, 60.0);
    let interleaved: Vec<f32> = left.samples().iter().flat_map(|&s| [s, s]).collect();
    let stereo = SignalBuffer::new(interleaved, 48000, 2).unwrap();
    let scheme = BandScheme::Custom(vec![octave(1000.0)]);

    let estimator = Estimator::new(EstimatorConfig::default()).unwrap();
    let downmixed = estimator.estimate(&stereo, &scheme, Method::T20).unwrap();
    let mono = estimator.estimate(&left, &scheme, Method::T20).unwrap();
    assert_eq!(downmixed.per_band(), mono.per_band());

    let per_channel = estimator
        .estimate_per_channel(&stereo, &scheme, Method::T20)
        .unwrap();
    assert_eq!(per_channel.len(), 2);
    assert_eq!(per_channel[0].per_band(), per_channel[1].per_band());
}

/// Test that the configured scheme and method are used
#[test]
fn test_estimate_configured() {
    let signal = band_decay(1000.0, 1.0, 60.0);
    let estimator = Estimator::new(EstimatorConfig {
        scheme: BandScheme::Broad,
        method: Method::Edt,
        ..Default::default()
    })
    .unwrap();
    let report = estimator.estimate_configured(&signal).unwrap();
    assert_eq!(report.method, Method::Edt);
    assert_eq!(report.rows().len(), 3);
}

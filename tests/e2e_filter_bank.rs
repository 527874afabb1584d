//! E2E tests for the band filter bank
//!
//! Verifies band selection against the Nyquist limit, passband/stopband
//! behaviour and that zero-phase filtering does not shift a decay in time.

use reverbmeter::audio::filter::{BandFilter, BandFilterBank};
use reverbmeter::audio::signal::{decaying_tone, SyntheticDecay};
use reverbmeter::{BandScheme, FrequencyBand, SignalBuffer};

fn rms(samples: &[f32]) -> f64 {
    (samples.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Test that the output holds exactly the bands below Nyquist
#[test]
fn test_output_bands_match_nyquist_limit() {
    for sample_rate in [8000u32, 16000, 22050, 44100, 48000] {
        let signal = SignalBuffer::mono(vec![0.0; 2048], sample_rate).unwrap();
        let bank = BandFilterBank::default();
        let requested = BandScheme::ThirdOctave.bands();
        let filtered = bank.filter(&signal, &requested).unwrap();

        let nyquist = sample_rate as f64 / 2.0;
        let expected: Vec<FrequencyBand> = requested
            .iter()
            .copied()
            .filter(|b| b.upper_hz() <= nyquist)
            .collect();
        let produced: Vec<FrequencyBand> = filtered.bands.keys().copied().collect();
        assert_eq!(produced, expected, "sample rate {}", sample_rate);
        assert_eq!(
            filtered.unsupported.len(),
            requested.len() - expected.len()
        );
    }
}

/// Test that every band keeps the input's sample rate and length
#[test]
fn test_band_signals_keep_shape() {
    let signal = SyntheticDecay::new(44100, 0.3, 60.0)
        .unwrap()
        .generate()
        .unwrap();
    let filtered = BandFilterBank::default()
        .filter(&signal, &BandScheme::Octave.bands())
        .unwrap();
    for (band, buffer) in &filtered.bands {
        assert_eq!(buffer.sample_rate(), 44100, "{}", band);
        assert_eq!(buffer.frames(), signal.frames(), "{}", band);
        assert_eq!(buffer.channels(), 1);
    }
}

/// Test that a tone shows up in its own band and not in distant ones
#[test]
fn test_tone_lands_in_its_band() {
    let signal = decaying_tone(2000.0, 48000, 0.5, 0.0).unwrap();
    let filtered = BandFilterBank::default()
        .filter(&signal, &BandScheme::Octave.bands())
        .unwrap();

    let level = |center: f64| {
        let band = FrequencyBand::octave(center).unwrap();
        rms(&filtered.bands[&band].samples()[4800..19200])
    };
    let input = rms(&signal.samples()[4800..19200]);
    assert!(level(2000.0) / input > 0.8);
    assert!(level(500.0) / input < 1e-3);
    assert!(level(8000.0) / input < 1e-3);
}

/// Test that the decay onset is not delayed by filtering
#[test]
fn test_zero_phase_keeps_envelope_peak() {
    // Silence, then a tone burst decaying from 0.25 s
    let burst = decaying_tone(1000.0, 48000, 0.75, 60.0).unwrap();
    let mut samples = vec![0.0f32; 12000];
    samples.extend_from_slice(burst.samples());
    let signal = SignalBuffer::mono(samples, 48000).unwrap();

    let band = FrequencyBand::octave(1000.0).unwrap();
    let filter = BandFilter::design(band, 4, 48000).unwrap();
    let output = filter.apply(&signal).unwrap();

    // Energy before the onset stays small relative to the burst
    let before = rms(&output.samples()[..11000]);
    let after = rms(&output.samples()[12000..13000]);
    assert!(before / after < 0.01, "pre-onset leakage {}", before / after);
}

#[test]
fn test_higher_order_is_steeper() {
    let band = FrequencyBand::octave(1000.0).unwrap();
    let signal = decaying_tone(3000.0, 48000, 0.5, 0.0).unwrap();
    let gain = |order: usize| {
        let filtered = BandFilterBank::new(order)
            .unwrap()
            .filter_band(&signal, band)
            .unwrap()
            .unwrap();
        rms(&filtered.samples()[4800..19200])
    };
    assert!(gain(6) < gain(2));
}

//! Audio file ingestion
//!
//! Only WAV is decoded. MP3 and other compressed formats are recognized by
//! extension and rejected with a hint to convert first.

use anyhow::{anyhow, bail, Context, Result};
use reverbmeter_core::SignalBuffer;
use std::path::Path;

/// Recognized input container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

/// Classify `path` by extension
///
/// # Errors
/// Fails for missing or unknown extensions.
pub fn check_file_format(path: &Path) -> Result<AudioFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| anyhow!("{} has no file extension", path.display()))?;

    match extension.as_str() {
        "wav" | "wave" => Ok(AudioFormat::Wav),
        "mp3" => Ok(AudioFormat::Mp3),
        other => bail!(
            "unsupported file format '.{}' for {} (expected .wav)",
            other,
            path.display()
        ),
    }
}

/// Decode a WAV file into a [`SignalBuffer`]
///
/// Integer samples (8/16/24/32-bit) are scaled to `[-1.0, 1.0]`; 32-bit
/// float samples are taken as-is. All channels are kept, interleaved.
pub fn load_signal(path: &Path) -> Result<SignalBuffer> {
    match check_file_format(path)? {
        AudioFormat::Wav => {}
        AudioFormat::Mp3 => bail!(
            "MP3 input is not supported: convert {} to WAV first",
            path.display()
        ),
    }

    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                8 | 16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                other => bail!(
                    "unsupported bits per sample {} in {}",
                    other,
                    path.display()
                ),
            }
        }
    };

    let signal = SignalBuffer::new(samples, spec.sample_rate, spec.channels)
        .with_context(|| format!("invalid audio data in {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        sample_rate = signal.sample_rate(),
        channels = signal.channels(),
        duration_secs = signal.duration_secs(),
        "audio_loaded"
    );
    Ok(signal)
}

/// Duration of an audio file in seconds
pub fn audio_length(path: &Path) -> Result<f64> {
    Ok(load_signal(path)?.duration_secs())
}

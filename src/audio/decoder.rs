// WAV decoding into analysis-ready mono tracks
//
// The analysis pipeline only consumes `AudioTrack`s at a single reduced
// sample rate. Containers other than WAV (video files, compressed audio)
// are expected to be demuxed to WAV by an external tool first.

use std::path::Path;

use super::AudioTrack;
use crate::error::{log_audio_error, AudioError};

/// Source of decoded recordings
pub trait AudioDecoder {
    /// Decode the file at `path` into a mono track
    fn decode(&self, path: &Path) -> Result<AudioTrack, AudioError>;
}

/// hound-backed WAV decoder with downmix and linear resampling
#[derive(Debug, Clone)]
pub struct WavDecoder {
    target_sample_rate: u32,
}

impl WavDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate: target_sample_rate.max(1),
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    fn decode_inner(&self, path: &Path) -> Result<AudioTrack, AudioError> {
        let (interleaved, channels, source_rate) = read_wav(path)?;
        let mono = downmix(&interleaved, channels);
        if mono.is_empty() {
            return Err(AudioError::EmptyTrack);
        }
        if source_rate == 0 {
            return Err(AudioError::InvalidSampleRate {
                sample_rate: source_rate,
            });
        }

        let samples = resample_linear(&mono, source_rate, self.target_sample_rate);
        tracing::info!(
            "[WavDecoder] Decoded {} ({} ch @ {} Hz) into {} samples @ {} Hz",
            path.display(),
            channels,
            source_rate,
            samples.len(),
            self.target_sample_rate
        );
        AudioTrack::new(samples, self.target_sample_rate)
    }
}

impl Default for WavDecoder {
    fn default() -> Self {
        Self::new(8_000)
    }
}

impl AudioDecoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<AudioTrack, AudioError> {
        self.decode_inner(path).inspect_err(|err| {
            log_audio_error(err, &format!("WavDecoder::decode({})", path.display()))
        })
    }
}

/// Read interleaved samples normalised to [-1, 1]
fn read_wav(path: &Path) -> Result<(Vec<f32>, u16, u32), AudioError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(AudioError::from))
            .collect::<Result<Vec<f32>, AudioError>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) - 1) as f32;
            match spec.bits_per_sample {
                8 | 16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(AudioError::from)
                    })
                    .collect::<Result<Vec<f32>, AudioError>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(AudioError::from)
                    })
                    .collect::<Result<Vec<f32>, AudioError>>()?,
                other => {
                    return Err(AudioError::UnsupportedFormat {
                        reason: format!("{} bits per sample", other),
                    })
                }
            }
        }
    };

    Ok((samples, spec.channels, spec.sample_rate))
}

/// Average interleaved channels into one; a trailing partial frame is dropped
fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation resampler
///
/// Output length is `round(len * to / from)`; the last source sample is held
/// once the read cursor runs past it.
pub(crate) fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64 / ratio).round() as usize).max(1);
    let last = samples.len() - 1;
    let mut output = Vec::with_capacity(out_len);
    let mut cursor = 0.0f64;

    for _ in 0..out_len {
        let idx = cursor.floor() as usize;
        let sample = if idx >= last {
            samples[last]
        } else {
            let frac = (cursor - idx as f64) as f32;
            let a = samples[idx];
            let b = samples[idx + 1];
            (1.0 - frac) * a + frac * b
        };
        output.push(sample);
        cursor += ratio;
    }

    output
}

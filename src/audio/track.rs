// AudioTrack - decoded mono recording
//
// Immutable once constructed. Produced once per job by a decoder and read
// by the envelope extractor.

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Mono amplitude samples at a fixed sample rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioTrack {
    /// Create a track from mono samples
    ///
    /// # Errors
    /// * `AudioError::InvalidSampleRate` - sample rate is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { sample_rate });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (`len / sample_rate`)
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_sample_count() {
        let track = AudioTrack::new(vec![0.0; 12_000], 8_000).unwrap();
        assert_eq!(track.len(), 12_000);
        assert!((track.duration_secs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let err = AudioTrack::new(vec![0.1; 10], 0).unwrap_err();
        assert_eq!(err, AudioError::InvalidSampleRate { sample_rate: 0 });
    }
}

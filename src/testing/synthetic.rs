//! Deterministic synthetic sleep recordings
//!
//! Breathing is modelled as uniform noise, apnea pauses as much quieter
//! noise, and breathing resumption as a short loud gasp right after each
//! pause. Gasps are a constant-level burst, so every gasp has the same rms.
//! The same seed always renders the same samples.

use std::path::Path;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::analysis::TimeSpan;
use crate::audio::AudioTrack;
use crate::error::AudioError;

/// Builder for a synthetic recording
#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    sample_rate: u32,
    duration_secs: f64,
    breathing_amplitude: f32,
    pause_amplitude: f32,
    gasp_amplitude: f32,
    gasp_secs: f64,
    pauses: Vec<TimeSpan>,
    seed: u64,
}

impl SyntheticRecording {
    pub fn new(sample_rate: u32, duration_secs: f64) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            duration_secs: duration_secs.max(0.0),
            breathing_amplitude: 0.1,
            pause_amplitude: 0.003,
            gasp_amplitude: 0.6,
            gasp_secs: 1.5,
            pauses: Vec::new(),
            seed: 0x5A5A_FFF0,
        }
    }

    pub fn with_breathing_amplitude(mut self, amplitude: f32) -> Self {
        self.breathing_amplitude = amplitude.max(0.0);
        self
    }

    pub fn with_pause_amplitude(mut self, amplitude: f32) -> Self {
        self.pause_amplitude = amplitude.max(0.0);
        self
    }

    pub fn with_gasp(mut self, amplitude: f32, secs: f64) -> Self {
        self.gasp_amplitude = amplitude.max(0.0);
        self.gasp_secs = secs.max(0.0);
        self
    }

    /// Add a pause of `secs` starting at `start`
    pub fn with_pause(mut self, start: f64, secs: f64) -> Self {
        self.pauses.push(TimeSpan {
            start,
            end: start + secs,
        });
        self
    }

    pub fn with_pauses<I: IntoIterator<Item = TimeSpan>>(mut self, pauses: I) -> Self {
        self.pauses.extend(pauses);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn pauses(&self) -> &[TimeSpan] {
        &self.pauses
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Amplitude at time `t` and whether `t` falls inside a gasp
    fn amplitude_at(&self, t: f64) -> (f32, bool) {
        for pause in &self.pauses {
            if t >= pause.start && t < pause.end {
                return (self.pause_amplitude, false);
            }
            if t >= pause.end && t < pause.end + self.gasp_secs {
                return (self.gasp_amplitude, true);
            }
        }
        (self.breathing_amplitude, false)
    }

    pub fn render_samples(&self) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let total = (self.duration_secs * self.sample_rate as f64).round() as usize;
        let rate = self.sample_rate as f64;

        (0..total)
            .map(|i| {
                let (amplitude, gasp) = self.amplitude_at(i as f64 / rate);
                if gasp {
                    if i % 2 == 0 {
                        amplitude
                    } else {
                        -amplitude
                    }
                } else if amplitude > 0.0 {
                    rng.gen_range(-amplitude..amplitude)
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn render(&self) -> Result<AudioTrack, AudioError> {
        AudioTrack::new(self.render_samples(), self.sample_rate)
    }

    /// Write a 16-bit mono WAV file
    pub fn write_wav(&self, path: &Path) -> Result<(), AudioError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for sample in self.render_samples() {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

/// `count` pauses of `pause_secs` spread evenly over `duration_secs`
///
/// Pause `i` starts at `(i + 1) * duration / (count + 1)`.
pub fn evenly_spaced_pauses(duration_secs: f64, count: usize, pause_secs: f64) -> Vec<TimeSpan> {
    let spacing = duration_secs / (count + 1) as f64;
    (0..count)
        .map(|i| {
            let start = spacing * (i + 1) as f64;
            TimeSpan {
                start,
                end: start + pause_secs,
            }
        })
        .collect()
}

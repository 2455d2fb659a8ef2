// Energy envelope - RMS per fixed-length frame
//
// Frames do not overlap. The final partial frame is kept and its RMS is
// computed over the samples it actually has (no zero padding).

use serde::{Deserialize, Serialize};

use crate::audio::AudioTrack;
use crate::error::{log_audio_error, AudioError};

/// One envelope sample, timestamped at its frame start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub time: f64,
    pub rms: f64,
}

/// Ordered RMS time series at fixed hop spacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEnvelope {
    hop_secs: f64,
    duration_secs: f64,
    points: Vec<EnvelopePoint>,
}

impl EnergyEnvelope {
    /// Build an envelope from precomputed points
    ///
    /// Points must be time-ordered and `hop_secs` apart. The recording is
    /// assumed to end one hop after the last point.
    pub fn from_points(hop_secs: f64, points: Vec<EnvelopePoint>) -> Self {
        let duration_secs = points.last().map(|p| p.time + hop_secs).unwrap_or(0.0);
        Self {
            hop_secs,
            duration_secs,
            points,
        }
    }

    /// Build an envelope at 0, hop, 2*hop, ... from bare RMS values
    pub fn from_rms(hop_secs: f64, rms: &[f64]) -> Self {
        let points = rms
            .iter()
            .enumerate()
            .map(|(i, &rms)| EnvelopePoint {
                time: i as f64 * hop_secs,
                rms,
            })
            .collect();
        Self::from_points(hop_secs, points)
    }

    pub fn hop_secs(&self) -> f64 {
        self.hop_secs
    }

    /// Length of the underlying recording in seconds
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn points(&self) -> &[EnvelopePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn rms_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.rms)
    }

    /// Index of the first point with `time >= t`
    pub fn index_at_or_after(&self, t: f64) -> usize {
        self.points.partition_point(|p| p.time < t)
    }

    /// Summary statistics of the RMS values, `None` for an empty envelope
    pub fn statistics(&self) -> Option<EnvelopeStatistics> {
        if self.points.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = self.rms_values().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(EnvelopeStatistics {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            median: percentile_sorted(&sorted, 50.0),
            std: variance.sqrt(),
            p10: percentile_sorted(&sorted, 10.0),
            p25: percentile_sorted(&sorted, 25.0),
            p50: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
            p90: percentile_sorted(&sorted, 90.0),
        })
    }

    /// RMS percentile with linear interpolation between closest ranks
    pub fn percentile(&self, q: f64) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.rms_values().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(percentile_sorted(&sorted, q))
    }

    /// Evenly spaced subset of at most `max_points` points for plotting
    ///
    /// First and last points are always kept.
    pub fn downsample(&self, max_points: usize) -> Vec<EnvelopePoint> {
        let n = self.points.len();
        let max_points = max_points.max(2);
        if n <= max_points {
            return self.points.clone();
        }

        let last = max_points - 1;
        let step = (n - 1) as f64 / last as f64;
        (0..max_points)
            .map(|i| {
                let idx = if i == last {
                    n - 1
                } else {
                    ((i as f64 * step) as usize).min(n - 1)
                };
                self.points[idx]
            })
            .collect()
    }
}

/// Distribution summary of envelope RMS values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// `sorted` must be non-empty and ascending
pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 100.0);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Converts decoded audio into an `EnergyEnvelope`
#[derive(Debug, Clone)]
pub struct EnergyEnvelopeExtractor {
    hop_secs: f64,
}

impl EnergyEnvelopeExtractor {
    pub fn new(hop_secs: f64) -> Self {
        Self {
            hop_secs: if hop_secs.is_finite() && hop_secs > 0.0 {
                hop_secs
            } else {
                0.5
            },
        }
    }

    /// Compute one RMS point per hop-length frame
    ///
    /// # Errors
    /// * `AudioError::EmptyTrack` - the track has no samples
    pub fn extract(&self, track: &AudioTrack) -> Result<EnergyEnvelope, AudioError> {
        if track.is_empty() {
            let err = AudioError::EmptyTrack;
            log_audio_error(&err, "EnergyEnvelopeExtractor::extract");
            return Err(err);
        }

        let rate = track.sample_rate() as f64;
        let frame_len = ((self.hop_secs * rate).round() as usize).max(1);
        let hop_secs = frame_len as f64 / rate;

        let points: Vec<EnvelopePoint> = track
            .samples()
            .chunks(frame_len)
            .enumerate()
            .map(|(i, frame)| {
                let energy = frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
                EnvelopePoint {
                    time: (i * frame_len) as f64 / rate,
                    rms: (energy / frame.len() as f64).sqrt(),
                }
            })
            .collect();

        tracing::info!(
            "[EnvelopeExtractor] {} frames of {} samples ({:.3} s) over {:.1} s",
            points.len(),
            frame_len,
            hop_secs,
            track.duration_secs()
        );

        Ok(EnergyEnvelope {
            hop_secs,
            duration_secs: track.duration_secs(),
            points,
        })
    }
}

impl Default for EnergyEnvelopeExtractor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

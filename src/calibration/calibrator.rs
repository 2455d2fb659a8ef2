// Parameter calibration - silence threshold and resume multiplier
//
// Three sources of parameters:
// - apnea-judged candidates (the main workflow)
// - user-drawn markers over known apnea pauses
// - the envelope's own rms distribution (uncalibrated baseline)
//
// Results are immutable snapshots recomputed on every run.

use serde::{Deserialize, Serialize};

use crate::analysis::{Candidate, EnergyEnvelope, TimeSpan};
use crate::error::{log_calibration_error, CalibrationError};

/// Detection parameters derived from judgments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// rms below which a point is silent
    pub silence_threshold: f64,
    /// Resumption requires rms >= silence_threshold * resume_multiplier
    pub resume_multiplier: f64,
}

impl CalibrationParameters {
    /// Validated constructor
    ///
    /// # Errors
    /// * `CalibrationError::ZeroSilenceThreshold` - threshold not a positive finite value
    /// * `CalibrationError::InvalidMultiplier` - multiplier not a finite value above 1
    pub fn new(silence_threshold: f64, resume_multiplier: f64) -> Result<Self, CalibrationError> {
        if !(silence_threshold.is_finite() && silence_threshold > 0.0) {
            return Err(CalibrationError::ZeroSilenceThreshold);
        }
        if !(resume_multiplier.is_finite() && resume_multiplier > 1.0) {
            return Err(CalibrationError::InvalidMultiplier {
                value: resume_multiplier,
            });
        }
        Ok(Self {
            silence_threshold,
            resume_multiplier,
        })
    }
}

/// User-marked apnea interval in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone)]
pub struct ParameterCalibrator {
    resume_lookahead_secs: f64,
    apnea_window_secs: f64,
    fallback_multiplier: f64,
    marker_resume_frames: usize,
    baseline_percentile: f64,
    baseline_multiplier: f64,
}

/// Where the resumption peak after a pause is searched
#[derive(Debug, Clone, Copy)]
enum ResumeSearch {
    /// Points with `time <= end + secs`
    Secs(f64),
    /// A fixed number of points
    Frames(usize),
}

impl ParameterCalibrator {
    pub fn new(
        resume_lookahead_secs: f64,
        apnea_window_secs: f64,
        fallback_multiplier: f64,
        marker_resume_frames: usize,
        baseline_percentile: f64,
        baseline_multiplier: f64,
    ) -> Self {
        Self {
            resume_lookahead_secs: resume_lookahead_secs.max(0.0),
            apnea_window_secs: apnea_window_secs.max(0.0),
            fallback_multiplier,
            marker_resume_frames: marker_resume_frames.max(1),
            baseline_percentile: baseline_percentile.clamp(0.0, 100.0),
            baseline_multiplier,
        }
    }

    /// Calibrate from apnea-judged candidates
    ///
    /// Each apnea candidate stands for the pause in its apnea window
    /// `[t - apnea_window_secs, t]`. silence_threshold is the mean over
    /// candidates of the mean rms inside that window. The resumption peak is
    /// the loudest point in `[t, t + lookahead]`, which is the candidate
    /// itself for an extracted peak; the multiplier is the mean of
    /// peak / threshold. Candidates whose window covers no envelope point are
    /// skipped.
    ///
    /// # Errors
    /// * `NoApneaJudgments` - no apnea candidate covers an envelope point
    /// * `ZeroSilenceThreshold` - the windows are completely silent
    /// * `InvalidMultiplier` - derived multiplier is not above 1
    pub fn calibrate(
        &self,
        envelope: &EnergyEnvelope,
        candidates: &[Candidate],
    ) -> Result<CalibrationParameters, CalibrationError> {
        self.calibrate_inner(envelope, candidates)
            .inspect_err(|err| log_calibration_error(err, "ParameterCalibrator::calibrate"))
    }

    fn calibrate_inner(
        &self,
        envelope: &EnergyEnvelope,
        candidates: &[Candidate],
    ) -> Result<CalibrationParameters, CalibrationError> {
        let windows: Vec<TimeSpan> = candidates
            .iter()
            .filter(|c| c.is_apnea())
            .map(|c| c.apnea_window(self.apnea_window_secs))
            .collect();
        if windows.is_empty() {
            return Err(CalibrationError::NoApneaJudgments);
        }

        let params = self.calibrate_pauses(
            envelope,
            &windows,
            ResumeSearch::Secs(self.resume_lookahead_secs),
        )?;
        log::info!(
            "[Calibrator] {} apnea judgments: silence_threshold={:.5}, resume_multiplier={:.3}",
            windows.len(),
            params.silence_threshold,
            params.resume_multiplier
        );
        Ok(params)
    }

    /// Calibrate from intervals the user marked as apnea pauses
    ///
    /// silence_threshold is the mean over markers of the mean rms inside
    /// `[start, end]`. The resume peak of a marker is the loudest of the
    /// `marker_resume_frames` points starting at the first point at or after
    /// `end`.
    ///
    /// # Errors
    /// * `InvalidMarker` - a marker with `end <= start`
    /// * `NoApneaJudgments` - no marker covers any envelope point
    /// * `ZeroSilenceThreshold` / `InvalidMultiplier` - degenerate result
    pub fn calibrate_from_markers(
        &self,
        envelope: &EnergyEnvelope,
        markers: &[Marker],
    ) -> Result<CalibrationParameters, CalibrationError> {
        self.calibrate_from_markers_inner(envelope, markers)
            .inspect_err(|err| {
                log_calibration_error(err, "ParameterCalibrator::calibrate_from_markers")
            })
    }

    fn calibrate_from_markers_inner(
        &self,
        envelope: &EnergyEnvelope,
        markers: &[Marker],
    ) -> Result<CalibrationParameters, CalibrationError> {
        if let Some(bad) = markers
            .iter()
            .find(|m| !(m.start.is_finite() && m.end.is_finite() && m.end > m.start))
        {
            return Err(CalibrationError::InvalidMarker {
                start: bad.start,
                end: bad.end,
            });
        }

        let spans: Vec<TimeSpan> = markers
            .iter()
            .map(|m| TimeSpan {
                start: m.start,
                end: m.end,
            })
            .collect();
        let params = self.calibrate_pauses(
            envelope,
            &spans,
            ResumeSearch::Frames(self.marker_resume_frames),
        )?;
        log::info!(
            "[Calibrator] {} markers: silence_threshold={:.5}, resume_multiplier={:.3}",
            markers.len(),
            params.silence_threshold,
            params.resume_multiplier
        );
        Ok(params)
    }

    /// Uncalibrated parameters from the envelope's rms distribution
    ///
    /// # Errors
    /// * `ZeroSilenceThreshold` - the envelope is empty or the percentile is zero
    pub fn baseline(&self, envelope: &EnergyEnvelope) -> Result<CalibrationParameters, CalibrationError> {
        let silence_threshold = envelope.percentile(self.baseline_percentile).unwrap_or(0.0);
        let params = CalibrationParameters::new(silence_threshold, self.baseline_multiplier)
            .inspect_err(|err| log_calibration_error(err, "ParameterCalibrator::baseline"))?;
        log::info!(
            "[Calibrator] Baseline p{:.0} silence_threshold={:.5}, resume_multiplier={:.3}",
            self.baseline_percentile,
            params.silence_threshold,
            params.resume_multiplier
        );
        Ok(params)
    }

    /// Threshold and multiplier from known pause intervals
    fn calibrate_pauses(
        &self,
        envelope: &EnergyEnvelope,
        pauses: &[TimeSpan],
        search: ResumeSearch,
    ) -> Result<CalibrationParameters, CalibrationError> {
        let points = envelope.points();
        let mut pause_means = Vec::with_capacity(pauses.len());
        let mut resume_peaks = Vec::with_capacity(pauses.len());
        for pause in pauses {
            let inside: Vec<f64> = points
                .iter()
                .filter(|p| p.time >= pause.start && p.time <= pause.end)
                .map(|p| p.rms)
                .collect();
            if inside.is_empty() {
                log::warn!(
                    "[Calibrator] Pause {:.1}-{:.1} s covers no envelope point, skipped",
                    pause.start,
                    pause.end
                );
                continue;
            }
            pause_means.push(inside.iter().sum::<f64>() / inside.len() as f64);

            let after = &points[envelope.index_at_or_after(pause.end)..];
            let peak = match search {
                ResumeSearch::Secs(secs) => after
                    .iter()
                    .take_while(|p| p.time <= pause.end + secs)
                    .map(|p| p.rms)
                    .reduce(f64::max),
                ResumeSearch::Frames(frames) => {
                    after.iter().take(frames).map(|p| p.rms).reduce(f64::max)
                }
            };
            if let Some(peak) = peak {
                resume_peaks.push(peak);
            }
        }

        if pause_means.is_empty() {
            return Err(CalibrationError::NoApneaJudgments);
        }

        let silence_threshold = pause_means.iter().sum::<f64>() / pause_means.len() as f64;
        if !(silence_threshold > 0.0) {
            return Err(CalibrationError::ZeroSilenceThreshold);
        }

        let ratios: Vec<f64> = resume_peaks
            .iter()
            .map(|peak| peak / silence_threshold)
            .collect();
        let resume_multiplier = self.mean_ratio_or_fallback(&ratios, pause_means.len());
        CalibrationParameters::new(silence_threshold, resume_multiplier)
    }

    /// Running mean, so equal ratios average to exactly that ratio
    fn mean_ratio_or_fallback(&self, ratios: &[f64], sources: usize) -> f64 {
        if ratios.is_empty() {
            log::warn!(
                "[Calibrator] None of {} sources has look-ahead data, using fallback multiplier {:.2}",
                sources,
                self.fallback_multiplier
            );
            return self.fallback_multiplier;
        }
        ratios
            .iter()
            .enumerate()
            .fold(0.0, |mean, (i, ratio)| mean + (ratio - mean) / (i + 1) as f64)
    }
}

impl Default for ParameterCalibrator {
    fn default() -> Self {
        Self::new(20.0, 10.0, 2.0, 10, 30.0, 3.0)
    }
}

// Event detection over the full envelope
//
// A run of consecutive silent points (rms < silence_threshold) becomes an
// apnea event when it lasts at least the minimum duration and breathing
// resumes (rms / threshold >= multiplier) within the look-ahead after it.
// A run still silent at the end of the recording is inconclusive and
// dropped. Qualifying events closer than the merge gap are joined.

use serde::{Deserialize, Serialize};

use super::candidates::Candidate;
use super::envelope::EnergyEnvelope;
use crate::calibration::CalibrationParameters;

/// A detected apnea pause
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApneaEvent {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Lowest rms inside the event
    pub trough_rms: f64,
}

impl ApneaEvent {
    pub fn midpoint(&self) -> f64 {
        (self.start_time + self.end_time) / 2.0
    }
}

/// Scans an envelope for apnea events with calibrated parameters
#[derive(Debug, Clone)]
pub struct EventDetector {
    min_apnea_secs: f64,
    resume_lookahead_secs: f64,
    merge_gap_secs: f64,
}

impl EventDetector {
    pub fn new(min_apnea_secs: f64, resume_lookahead_secs: f64, merge_gap_secs: f64) -> Self {
        Self {
            min_apnea_secs: min_apnea_secs.max(0.0),
            resume_lookahead_secs: resume_lookahead_secs.max(0.0),
            merge_gap_secs: merge_gap_secs.max(0.0),
        }
    }

    /// Detect time-ordered, non-overlapping apnea events
    pub fn detect(
        &self,
        envelope: &EnergyEnvelope,
        params: &CalibrationParameters,
    ) -> Vec<ApneaEvent> {
        let points = envelope.points();
        let silence = params.silence_threshold;
        // Same form the calibrator derives the multiplier in
        let resumes = |rms: f64| rms / silence >= params.resume_multiplier;

        let mut qualifying = Vec::new();
        let mut runs = 0usize;
        let mut i = 0;
        while i < points.len() {
            if points[i].rms >= silence {
                i += 1;
                continue;
            }

            let start = i;
            while i < points.len() && points[i].rms < silence {
                i += 1;
            }
            runs += 1;

            // Silent through the end of the recording
            if i == points.len() {
                tracing::debug!(
                    "[EventDetector] Discarding run at {:.1} s: recording ends while silent",
                    points[start].time
                );
                break;
            }

            let start_time = points[start].time;
            let end_time = points[i].time;
            let duration = end_time - start_time;
            if duration < self.min_apnea_secs {
                continue;
            }

            let horizon = end_time + self.resume_lookahead_secs;
            let resumed = points[i..]
                .iter()
                .take_while(|p| p.time < horizon)
                .any(|p| resumes(p.rms));
            if !resumed {
                tracing::debug!(
                    "[EventDetector] Discarding {:.1} s run at {:.1} s: no resumption within {:.1} s",
                    duration,
                    start_time,
                    self.resume_lookahead_secs
                );
                continue;
            }

            let trough_rms = points[start..i]
                .iter()
                .map(|p| p.rms)
                .fold(f64::INFINITY, f64::min);
            qualifying.push(ApneaEvent {
                start_time,
                end_time,
                duration,
                trough_rms,
            });
        }

        let events = merge_nearby_events(qualifying, self.merge_gap_secs);
        tracing::info!(
            "[EventDetector] {} silent runs, {} events (threshold {:.5}, multiplier {:.2})",
            runs,
            events.len(),
            params.silence_threshold,
            params.resume_multiplier
        );
        events
    }
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::new(10.0, 20.0, 2.0)
    }
}

/// One event per apnea-judged candidate, spanning its apnea window
///
/// This scores the human judgments directly, without calibration. Events
/// are time ordered; overlapping windows are joined.
pub fn events_from_judgments(
    envelope: &EnergyEnvelope,
    candidates: &[Candidate],
    window_secs: f64,
) -> Vec<ApneaEvent> {
    let mut events: Vec<ApneaEvent> = candidates
        .iter()
        .filter(|c| c.is_apnea())
        .map(|candidate| {
            let window = candidate.apnea_window(window_secs);
            let trough_rms = envelope
                .points()
                .iter()
                .filter(|p| p.time >= window.start && p.time <= window.end)
                .map(|p| p.rms)
                .reduce(f64::min)
                .unwrap_or(candidate.rms_value);
            ApneaEvent {
                start_time: window.start,
                end_time: window.end,
                duration: window.end - window.start,
                trough_rms,
            }
        })
        .collect();
    events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let judged = events.len();
    let events = merge_nearby_events(events, 0.0);
    tracing::info!(
        "[EventDetector] {} apnea judgments, {} events from their windows",
        judged,
        events.len()
    );
    events
}

/// Join time-ordered events whose gap is smaller than `max_gap`
pub fn merge_nearby_events(events: Vec<ApneaEvent>, max_gap: f64) -> Vec<ApneaEvent> {
    let mut merged: Vec<ApneaEvent> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(last) if event.start_time - last.end_time < max_gap => {
                last.end_time = last.end_time.max(event.end_time);
                last.duration = last.end_time - last.start_time;
                last.trough_rms = last.trough_rms.min(event.trough_rms);
            }
            _ => merged.push(event),
        }
    }
    merged
}

/// Aggregate figures over a list of events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_count: usize,
    pub average_duration: f64,
    pub max_duration: f64,
    pub total_duration: f64,
    pub recording_hours: f64,
}

impl EventSummary {
    pub fn from_events(events: &[ApneaEvent], recording_secs: f64) -> Self {
        let total_duration: f64 = events.iter().map(|e| e.duration).sum();
        let max_duration = events.iter().map(|e| e.duration).fold(0.0, f64::max);
        let average_duration = if events.is_empty() {
            0.0
        } else {
            total_duration / events.len() as f64
        };

        Self {
            event_count: events.len(),
            average_duration,
            max_duration,
            total_duration,
            recording_hours: recording_secs.max(0.0) / 3_600.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(threshold: f64, multiplier: f64) -> CalibrationParameters {
        CalibrationParameters::new(threshold, multiplier).unwrap()
    }

    /// 1 s hop envelope at breathing level 0.05 with silent spans and gasps
    fn envelope_with(len: usize, silences: &[(usize, usize)], gasps: &[usize]) -> EnergyEnvelope {
        let mut rms = vec![0.05; len];
        for &(start, end) in silences {
            for value in &mut rms[start..end] {
                *value = 0.002;
            }
        }
        for &idx in gasps {
            rms[idx] = 0.5;
        }
        EnergyEnvelope::from_rms(1.0, &rms)
    }

    #[test]
    fn test_single_qualifying_run() {
        let envelope = envelope_with(120, &[(30, 45)], &[46]);
        let events = EventDetector::default().detect(&envelope, &params(0.01, 3.0));

        assert_eq!(events.len(), 1);
        let event = events[0];
        assert_eq!(event.start_time, 30.0);
        assert_eq!(event.end_time, 45.0);
        assert_eq!(event.duration, 15.0);
        assert_eq!(event.trough_rms, 0.002);
    }

    #[test]
    fn test_short_run_rejected() {
        let envelope = envelope_with(120, &[(30, 39)], &[40]);
        assert!(EventDetector::default()
            .detect(&envelope, &params(0.01, 3.0))
            .is_empty());
    }

    #[test]
    fn test_exact_minimum_duration_qualifies() {
        let envelope = envelope_with(120, &[(30, 40)], &[40]);
        let events = EventDetector::default().detect(&envelope, &params(0.01, 3.0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration, 10.0);
    }

    #[test]
    fn test_no_resumption_rejected() {
        // Breathing returns at 0.05, below 0.01 * 10
        let envelope = envelope_with(120, &[(30, 45)], &[]);
        assert!(EventDetector::default()
            .detect(&envelope, &params(0.01, 10.0))
            .is_empty());

        // Resumption exists but after the 20 s look-ahead
        let envelope = envelope_with(120, &[(30, 45)], &[70]);
        assert!(EventDetector::default()
            .detect(&envelope, &params(0.01, 10.0))
            .is_empty());
    }

    #[test]
    fn test_resumption_at_exact_calibrated_level() {
        // Multiplier derived as gasp / threshold, the way calibration does
        let threshold = 0.03;
        let envelope = envelope_with(120, &[(30, 45)], &[45]);
        let events =
            EventDetector::default().detect(&envelope, &params(threshold, 0.5 / threshold));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_run_at_recording_end_discarded() {
        let envelope = envelope_with(60, &[(30, 60)], &[]);
        assert!(EventDetector::default()
            .detect(&envelope, &params(0.01, 3.0))
            .is_empty());
    }

    #[test]
    fn test_close_events_merged() {
        // 12 s pause, 1 s gasp, 12 s pause: gap of 1 s < 2 s merge gap
        let envelope = envelope_with(120, &[(20, 32), (33, 45)], &[32, 45]);
        let events = EventDetector::default().detect(&envelope, &params(0.01, 3.0));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_time, 20.0);
        assert_eq!(events[0].end_time, 45.0);
        assert_eq!(events[0].duration, 25.0);
    }

    #[test]
    fn test_distant_events_ordered_and_disjoint() {
        let envelope = envelope_with(200, &[(20, 35), (80, 100), (150, 162)], &[35, 100, 162]);
        let events = EventDetector::default().detect(&envelope, &params(0.01, 3.0));

        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].end_time <= w[1].start_time));
        assert!(events.iter().all(|e| e.end_time > e.start_time));
    }

    #[test]
    fn test_events_from_judgments() {
        use crate::analysis::{CandidateSource, CandidateStatus};

        let envelope = envelope_with(200, &[(30, 45)], &[45, 120]);
        let judged = |id: u32, time: f64, status: CandidateStatus| Candidate {
            id,
            time_offset: time,
            rms_value: 0.5,
            prominence: 0.5,
            source: CandidateSource::Peak,
            status,
            confidence: None,
        };
        let candidates = vec![
            judged(0, 120.0, CandidateStatus::Apnea),
            judged(1, 45.0, CandidateStatus::Apnea),
            judged(2, 160.0, CandidateStatus::Skip),
            judged(3, 4.0, CandidateStatus::Apnea),
        ];

        let events = events_from_judgments(&envelope, &candidates, 10.0);

        assert_eq!(events.len(), 3);
        assert_eq!((events[0].start_time, events[0].end_time), (0.0, 4.0));
        assert_eq!((events[1].start_time, events[1].end_time), (35.0, 45.0));
        assert_eq!(events[1].duration, 10.0);
        assert_eq!(events[1].trough_rms, 0.002);
        assert_eq!((events[2].start_time, events[2].end_time), (110.0, 120.0));
        assert_eq!(events[2].trough_rms, 0.05);
    }

    #[test]
    fn test_overlapping_judgment_windows_joined() {
        use crate::analysis::{CandidateSource, CandidateStatus};

        let envelope = envelope_with(100, &[], &[]);
        let candidates: Vec<Candidate> = [50.0, 55.0]
            .iter()
            .enumerate()
            .map(|(id, &time)| Candidate {
                id: id as u32,
                time_offset: time,
                rms_value: 0.05,
                prominence: 0.05,
                source: CandidateSource::Statistical,
                status: CandidateStatus::Apnea,
                confidence: Some(1.0),
            })
            .collect();

        let events = events_from_judgments(&envelope, &candidates, 10.0);
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].start_time, events[0].end_time), (40.0, 55.0));
    }

    #[test]
    fn test_event_summary() {
        let events = vec![
            ApneaEvent {
                start_time: 0.0,
                end_time: 10.0,
                duration: 10.0,
                trough_rms: 0.0,
            },
            ApneaEvent {
                start_time: 100.0,
                end_time: 130.0,
                duration: 30.0,
                trough_rms: 0.0,
            },
        ];
        let summary = EventSummary::from_events(&events, 7_200.0);
        assert_eq!(summary.event_count, 2);
        assert_eq!(summary.average_duration, 20.0);
        assert_eq!(summary.max_duration, 30.0);
        assert_eq!(summary.total_duration, 40.0);
        assert_eq!(summary.recording_hours, 2.0);

        let empty = EventSummary::from_events(&[], 3_600.0);
        assert_eq!(empty.average_duration, 0.0);
    }
}

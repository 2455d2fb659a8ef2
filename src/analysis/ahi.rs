// Sliding-window Apnea-Hypopnea Index
//
// Windows start at 0, S, 2S, ... while the start is inside the recording and
// are clipped to the recording end. A clipped window's count is scaled by
// its true length, so every windowed AHI is a per-hour rate.

use serde::{Deserialize, Serialize};

use super::events::ApneaEvent;
use crate::config::{SeverityThresholds, WindowAssignment};
use crate::error::{log_detection_error, DetectionError};

const SECS_PER_HOUR: f64 = 3_600.0;

/// Clinical severity class of an AHI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Classify with lower-bound inclusive thresholds
    pub fn classify(ahi: f64, thresholds: &SeverityThresholds) -> Self {
        if ahi >= thresholds.severe {
            Severity::Severe
        } else if ahi >= thresholds.moderate {
            Severity::Moderate
        } else if ahi >= thresholds.mild {
            Severity::Mild
        } else {
            Severity::Normal
        }
    }

    /// Numeric level, 0 (normal) to 3 (severe)
    pub fn level(self) -> u8 {
        match self {
            Severity::Normal => 0,
            Severity::Mild => 1,
            Severity::Moderate => 2,
            Severity::Severe => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
        }
    }
}

/// One sliding window of the timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AhiWindow {
    pub window_start: f64,
    pub window_end: f64,
    pub event_count: usize,
    pub windowed_ahi: f64,
    pub severity: Severity,
}

/// Whole-recording AHI result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SasResult {
    pub overall_ahi: f64,
    pub severity: Severity,
    pub max_ahi: f64,
    pub worst_window: AhiWindow,
    pub timeline: Vec<AhiWindow>,
}

/// Computes per-window and overall AHI
#[derive(Debug, Clone)]
pub struct AhiAggregator {
    window_secs: f64,
    step_secs: f64,
    thresholds: SeverityThresholds,
    assignment: WindowAssignment,
}

impl AhiAggregator {
    pub fn new(
        window_secs: f64,
        step_secs: f64,
        thresholds: SeverityThresholds,
        assignment: WindowAssignment,
    ) -> Self {
        Self {
            window_secs: if window_secs > 0.0 { window_secs } else { SECS_PER_HOUR },
            step_secs: if step_secs > 0.0 { step_secs } else { 300.0 },
            thresholds,
            assignment,
        }
    }

    /// Aggregate events over a recording of `duration_secs`
    ///
    /// # Errors
    /// * `DetectionError::InvalidDuration` - duration is not a positive finite number
    pub fn aggregate(
        &self,
        events: &[ApneaEvent],
        duration_secs: f64,
    ) -> Result<SasResult, DetectionError> {
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            let err = DetectionError::InvalidDuration { duration_secs };
            log_detection_error(&err, "AhiAggregator::aggregate");
            return Err(err);
        }

        let mut timeline = Vec::new();
        let mut k = 0u64;
        loop {
            let start = k as f64 * self.step_secs;
            if start >= duration_secs {
                break;
            }
            let end = (start + self.window_secs).min(duration_secs);
            let event_count = events
                .iter()
                .filter(|event| self.counts_in(event, start, end))
                .count();
            let windowed_ahi = event_count as f64 * SECS_PER_HOUR / (end - start);
            timeline.push(AhiWindow {
                window_start: start,
                window_end: end,
                event_count,
                windowed_ahi,
                severity: Severity::classify(windowed_ahi, &self.thresholds),
            });
            k += 1;
        }

        // The first window always exists because duration > 0
        let mut worst_window = timeline[0];
        for window in &timeline[1..] {
            if window.windowed_ahi > worst_window.windowed_ahi {
                worst_window = *window;
            }
        }

        let overall_ahi = events.len() as f64 * SECS_PER_HOUR / duration_secs;
        let severity = Severity::classify(overall_ahi, &self.thresholds);

        tracing::info!(
            "[AhiAggregator] {} events over {:.2} h: AHI {:.2} ({}), worst window {:.0}-{:.0} s at {:.2}",
            events.len(),
            duration_secs / SECS_PER_HOUR,
            overall_ahi,
            severity.label(),
            worst_window.window_start,
            worst_window.window_end,
            worst_window.windowed_ahi
        );

        Ok(SasResult {
            overall_ahi,
            severity,
            max_ahi: worst_window.windowed_ahi,
            worst_window,
            timeline,
        })
    }

    fn counts_in(&self, event: &ApneaEvent, start: f64, end: f64) -> bool {
        match self.assignment {
            WindowAssignment::Midpoint => {
                let mid = event.midpoint();
                mid >= start && mid < end
            }
            WindowAssignment::MajorityOverlap => {
                let overlap = event.end_time.min(end) - event.start_time.max(start);
                if overlap <= 0.0 {
                    return false;
                }
                let doubled = overlap * 2.0;
                let duration = event.end_time - event.start_time;
                if doubled > duration {
                    true
                } else if doubled == duration {
                    // Exact half: the window holding the event start takes it
                    event.start_time >= start && event.start_time < end
                } else {
                    false
                }
            }
        }
    }
}

impl Default for AhiAggregator {
    fn default() -> Self {
        Self::new(
            SECS_PER_HOUR,
            300.0,
            SeverityThresholds::default(),
            WindowAssignment::Midpoint,
        )
    }
}

#[cfg(test)]
#[path = "ahi_tests.rs"]
mod tests;

// Statistical expander - proposes unjudged peaks similar to judged apneas
//
// Workflow:
// 1. User judges a seed batch of peak candidates
// 2. expand() computes mu/sigma over the apnea judgments
// 3. Every peak in the population not yet proposed whose rms lies in
//    [mu - k*sigma, mu + k*sigma] becomes a statistical candidate
// 4. User judges those; the cycle repeats with refreshed statistics

use serde::{Deserialize, Serialize};

use super::statistics::JudgmentStatistics;
use crate::analysis::{Candidate, CandidateSource, CandidateStatus, Peak};
use crate::config::SigmaBand;
use crate::error::{log_calibration_error, CalibrationError};

/// Two times closer than this are the same peak
const SAME_PEAK_EPSILON: f64 = 1e-9;

/// Result of one expansion round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expansion {
    /// Statistics the band was derived from
    pub statistics: JudgmentStatistics,
    pub band: (f64, f64),
    /// New statistical candidates, best confidence first
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone)]
pub struct StatisticalExpander {
    band: SigmaBand,
    max_additional: usize,
}

impl StatisticalExpander {
    pub fn new(band: SigmaBand, max_additional: usize) -> Self {
        Self {
            band,
            max_additional: max_additional.max(1),
        }
    }

    /// Mine `peaks` for candidates statistically similar to the apnea judgments
    ///
    /// # Arguments
    /// * `peaks` - full peak population from candidate extraction
    /// * `candidates` - every existing candidate with its current status
    ///
    /// # Returns
    /// * `Ok(Expansion)` - new candidates with ids continuing after the
    ///   highest existing id
    /// * `Err(CalibrationError::InsufficientData)` - fewer than two apnea judgments
    pub fn expand(
        &self,
        peaks: &[Peak],
        candidates: &[Candidate],
    ) -> Result<Expansion, CalibrationError> {
        let statistics = JudgmentStatistics::from_candidates(candidates).inspect_err(|err| {
            log_calibration_error(err, "StatisticalExpander::expand");
        })?;

        let k = self.band.k();
        let mu = statistics.mean_rms;
        let sigma = statistics.std_rms;
        let band = statistics.band(k);

        let mut proposed: Vec<Candidate> = peaks
            .iter()
            .filter(|peak| {
                !candidates
                    .iter()
                    .any(|c| (c.time_offset - peak.time).abs() < SAME_PEAK_EPSILON)
            })
            .filter_map(|peak| {
                confidence(peak.rms, mu, sigma, k).map(|confidence| Candidate {
                    id: 0,
                    time_offset: peak.time,
                    rms_value: peak.rms,
                    prominence: peak.prominence,
                    source: CandidateSource::Statistical,
                    status: CandidateStatus::Unjudged,
                    confidence: Some(confidence),
                })
            })
            .collect();

        let admitted = proposed.len();
        proposed.sort_by(|a, b| {
            let ca = a.confidence.unwrap_or(0.0);
            let cb = b.confidence.unwrap_or(0.0);
            cb.total_cmp(&ca)
                .then(b.rms_value.total_cmp(&a.rms_value))
                .then(a.time_offset.total_cmp(&b.time_offset))
        });
        proposed.truncate(self.max_additional);

        let next_id = candidates.iter().map(|c| c.id + 1).max().unwrap_or(0);
        for (offset, candidate) in proposed.iter_mut().enumerate() {
            candidate.id = next_id + offset as u32;
        }

        tracing::info!(
            "[StatisticalExpander] mu={:.5} sigma={:.5} from {} judgments, band [{:.5}, {:.5}]: {} admitted, {} proposed",
            mu,
            sigma,
            statistics.judged_count,
            band.0,
            band.1,
            admitted,
            proposed.len()
        );

        Ok(Expansion {
            statistics,
            band,
            candidates: proposed,
        })
    }
}

impl Default for StatisticalExpander {
    fn default() -> Self {
        Self::new(SigmaBand::Two, 30)
    }
}

/// `1 - |x - mu| / (k*sigma)` inside the band, `None` outside
///
/// With zero spread only values equal to the mean are admitted.
fn confidence(x: f64, mu: f64, sigma: f64, k: f64) -> Option<f64> {
    let distance = (x - mu).abs();
    let half_width = k * sigma;
    if half_width <= 0.0 {
        return (distance == 0.0).then_some(1.0);
    }
    if distance > half_width {
        return None;
    }
    Some((1.0 - distance / half_width).clamp(0.0, 1.0))
}

#[cfg(test)]
#[path = "expander_tests.rs"]
mod tests;

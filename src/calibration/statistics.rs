// Judgment statistics - recomputed from current candidate statuses
//
// Neither type here is persisted as authoritative state. Both are derived
// on demand from whatever judgments the caller passes in.

use serde::{Deserialize, Serialize};

use crate::analysis::{Candidate, CandidateStatus};
use crate::error::CalibrationError;

/// Minimum apnea judgments for a usable standard deviation
pub const MIN_JUDGED_FOR_STATISTICS: usize = 2;

/// Mean and population standard deviation of apnea-judged rms values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgmentStatistics {
    pub mean_rms: f64,
    pub std_rms: f64,
    pub judged_count: usize,
}

impl JudgmentStatistics {
    /// Compute statistics over candidates with `status == Apnea`
    ///
    /// # Returns
    /// * `Ok(JudgmentStatistics)` - at least two apnea judgments
    /// * `Err(CalibrationError::InsufficientData)` - fewer than two
    pub fn from_candidates(candidates: &[Candidate]) -> Result<Self, CalibrationError> {
        let values: Vec<f64> = candidates
            .iter()
            .filter(|c| c.is_apnea())
            .map(|c| c.rms_value)
            .collect();

        if values.len() < MIN_JUDGED_FOR_STATISTICS {
            return Err(CalibrationError::InsufficientData {
                required: MIN_JUDGED_FOR_STATISTICS,
                judged: values.len(),
            });
        }

        let (mean_rms, std_rms) = mean_and_std(&values);
        Ok(Self {
            mean_rms,
            std_rms,
            judged_count: values.len(),
        })
    }

    /// `[mean - k*std, mean + k*std]`
    pub fn band(&self, k: f64) -> (f64, f64) {
        (self.mean_rms - k * self.std_rms, self.mean_rms + k * self.std_rms)
    }
}

/// `values` must be non-empty
pub(crate) fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Distribution of apnea-judged rms values, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApneaRmsSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// `[max(0, mean - std), mean + std]`
    pub band_1sigma: (f64, f64),
    /// `[max(0, mean - 2*std), mean + 2*std]`
    pub band_2sigma: (f64, f64),
}

/// Progress of the judgment round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentSummary {
    pub total: usize,
    pub apnea: usize,
    pub skip: usize,
    pub unjudged: usize,
    pub apnea_percentage: f64,
    pub skip_percentage: f64,
    /// Present once at least one candidate is judged apnea
    pub apnea_rms: Option<ApneaRmsSummary>,
}

impl JudgmentSummary {
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        let count = |status: CandidateStatus| candidates.iter().filter(|c| c.status == status).count();
        let total = candidates.len();
        let apnea = count(CandidateStatus::Apnea);
        let skip = count(CandidateStatus::Skip);
        let unjudged = count(CandidateStatus::Unjudged);
        let percentage = |n: usize| {
            if total == 0 {
                0.0
            } else {
                n as f64 * 100.0 / total as f64
            }
        };

        let apnea_values: Vec<f64> = candidates
            .iter()
            .filter(|c| c.is_apnea())
            .map(|c| c.rms_value)
            .collect();
        let apnea_rms = if apnea_values.is_empty() {
            None
        } else {
            let (mean, std) = mean_and_std(&apnea_values);
            let min = apnea_values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = apnea_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Some(ApneaRmsSummary {
                mean,
                std,
                min,
                max,
                band_1sigma: ((mean - std).max(0.0), mean + std),
                band_2sigma: ((mean - 2.0 * std).max(0.0), mean + 2.0 * std),
            })
        };

        Self {
            total,
            apnea,
            skip,
            unjudged,
            apnea_percentage: percentage(apnea),
            skip_percentage: percentage(skip),
            apnea_rms,
        }
    }
}

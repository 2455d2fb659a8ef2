// Candidate extraction - ranked, distance-suppressed envelope peaks
//
// Candidates are the points a human is asked to judge. Extraction produces
// them once; afterwards only their status changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::envelope::EnergyEnvelope;
use super::peaks::{find_local_maxima, suppress_by_distance, Peak};
use crate::error::{log_detection_error, DetectionError};

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Peak,
    Statistical,
}

/// Human judgment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    Unjudged,
    Apnea,
    Skip,
}

impl std::str::FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unjudged" => Ok(CandidateStatus::Unjudged),
            "apnea" => Ok(CandidateStatus::Apnea),
            "skip" => Ok(CandidateStatus::Skip),
            other => Err(format!(
                "unknown status '{}' (expected apnea, skip or unjudged)",
                other
            )),
        }
    }
}

/// Persisted judgments: candidate id -> status
pub type Judgments = BTreeMap<u32, CandidateStatus>;

/// Time interval `[start, end]` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

/// A timestamped point proposed for apnea judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u32,
    pub time_offset: f64,
    pub rms_value: f64,
    pub prominence: f64,
    pub source: CandidateSource,
    pub status: CandidateStatus,
    /// Only set for statistical candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Candidate {
    pub fn from_peak(id: u32, peak: &Peak) -> Self {
        Self {
            id,
            time_offset: peak.time,
            rms_value: peak.rms,
            prominence: peak.prominence,
            source: CandidateSource::Peak,
            status: CandidateStatus::Unjudged,
            confidence: None,
        }
    }

    pub fn is_apnea(&self) -> bool {
        self.status == CandidateStatus::Apnea
    }

    /// The pause preceding this peak: `[max(0, t - window_secs), t]`
    pub fn apnea_window(&self, window_secs: f64) -> TimeSpan {
        TimeSpan {
            start: (self.time_offset - window_secs).max(0.0),
            end: self.time_offset,
        }
    }
}

/// Output of candidate extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    /// Top-N candidates in rank order, ids 0..N
    pub candidates: Vec<Candidate>,
    /// Every peak that survived suppression, in rank order; the population
    /// later mined by the statistical expander
    pub peaks: Vec<Peak>,
}

/// Finds and ranks candidate peaks in an envelope
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    top_n: usize,
    min_separation_secs: f64,
    min_prominence: f64,
}

impl CandidateExtractor {
    pub fn new(top_n: usize, min_separation_secs: f64, min_prominence: f64) -> Self {
        Self {
            top_n: top_n.max(1),
            min_separation_secs: min_separation_secs.max(0.0),
            min_prominence: min_prominence.max(0.0),
        }
    }

    /// Extract the top-N peak candidates
    ///
    /// # Errors
    /// * `DetectionError::EmptyEnvelope` - envelope has no points
    /// * `DetectionError::EmptyCandidateSet` - no local maxima survive
    pub fn extract(&self, envelope: &EnergyEnvelope) -> Result<CandidateSet, DetectionError> {
        let result = self.extract_inner(envelope);
        if let Err(err) = &result {
            log_detection_error(err, "CandidateExtractor::extract");
        }
        result
    }

    fn extract_inner(&self, envelope: &EnergyEnvelope) -> Result<CandidateSet, DetectionError> {
        if envelope.is_empty() {
            return Err(DetectionError::EmptyEnvelope);
        }

        let maxima: Vec<Peak> = find_local_maxima(envelope)
            .into_iter()
            .filter(|p| p.prominence >= self.min_prominence)
            .collect();
        if maxima.is_empty() {
            return Err(DetectionError::EmptyCandidateSet);
        }

        let peaks = suppress_by_distance(&maxima, self.min_separation_secs);
        let candidates: Vec<Candidate> = peaks
            .iter()
            .take(self.top_n)
            .enumerate()
            .map(|(id, peak)| Candidate::from_peak(id as u32, peak))
            .collect();

        tracing::info!(
            "[CandidateExtractor] {} local maxima, {} after {:.1} s suppression, {} candidates",
            maxima.len(),
            peaks.len(),
            self.min_separation_secs,
            candidates.len()
        );

        Ok(CandidateSet { candidates, peaks })
    }
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::new(50, 30.0, 0.0)
    }
}

/// Return `candidates` with statuses replaced from `judgments`
///
/// Ids without a candidate are ignored.
pub fn apply_judgments(candidates: &[Candidate], judgments: &Judgments) -> Vec<Candidate> {
    candidates
        .iter()
        .map(|candidate| {
            let mut updated = candidate.clone();
            if let Some(&status) = judgments.get(&candidate.id) {
                updated.status = status;
            }
            updated
        })
        .collect()
}

// Storage - persistence of per-job analysis records
//
// The analysis core never touches storage. Front ends load the current
// snapshot, run a pipeline stage and save what it returns.

mod json_file;
mod memory;

use anyhow::{bail, Result};

use crate::analysis::{ApneaEvent, Candidate, CandidateStatus, EnergyEnvelope, Judgments};
use crate::calibration::CalibrationParameters;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Per-job record storage
///
/// Loads of records never saved return empty collections or `None`.
pub trait JobStore {
    fn load_envelope(&self, job_id: &str) -> Result<Option<EnergyEnvelope>>;
    fn save_envelope(&self, job_id: &str, envelope: &EnergyEnvelope) -> Result<()>;

    fn load_candidates(&self, job_id: &str) -> Result<Vec<Candidate>>;
    fn save_candidates(&self, job_id: &str, candidates: &[Candidate]) -> Result<()>;

    fn load_judgments(&self, job_id: &str) -> Result<Judgments>;
    fn save_judgment(&self, job_id: &str, candidate_id: u32, status: CandidateStatus)
        -> Result<()>;

    fn load_events(&self, job_id: &str) -> Result<Vec<ApneaEvent>>;
    fn save_events(&self, job_id: &str, events: &[ApneaEvent]) -> Result<()>;

    fn load_calibration(&self, job_id: &str) -> Result<Option<CalibrationParameters>>;
    fn save_calibration(&self, job_id: &str, params: &CalibrationParameters) -> Result<()>;

    /// Ids of every job with at least one record, sorted
    fn list_jobs(&self) -> Result<Vec<String>>;

    /// Remove every record of a job; returns whether the job existed
    fn delete_job(&self, job_id: &str) -> Result<bool>;
}

/// Job ids become directory names, so only a safe character set is allowed
pub fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.is_empty() || job_id.len() > 128 {
        bail!("job id must be 1-128 characters (got {:?})", job_id);
    }
    if !job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        || job_id.starts_with('.')
    {
        bail!(
            "job id {:?} may only contain ASCII letters, digits, '-', '_' and '.' and must not start with '.'",
            job_id
        );
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every `JobStore` implementation must share

    use super::*;
    use crate::analysis::{CandidateExtractor, EnergyEnvelope};

    pub fn sample_envelope() -> EnergyEnvelope {
        let mut rms = vec![0.05; 200];
        rms[50] = 0.4;
        rms[150] = 0.6;
        EnergyEnvelope::from_rms(0.5, &rms)
    }

    pub fn exercise<S: JobStore>(store: &S) {
        assert!(store.list_jobs().unwrap().is_empty());
        assert!(store.load_envelope("night-1").unwrap().is_none());
        assert!(store.load_candidates("night-1").unwrap().is_empty());
        assert!(store.load_judgments("night-1").unwrap().is_empty());
        assert!(store.load_calibration("night-1").unwrap().is_none());

        let envelope = sample_envelope();
        let set = CandidateExtractor::new(50, 30.0, 0.0)
            .extract(&envelope)
            .unwrap();
        store.save_envelope("night-1", &envelope).unwrap();
        store.save_candidates("night-1", &set.candidates).unwrap();
        assert_eq!(store.load_envelope("night-1").unwrap(), Some(envelope));
        assert_eq!(store.load_candidates("night-1").unwrap(), set.candidates);

        store
            .save_judgment("night-1", 0, CandidateStatus::Apnea)
            .unwrap();
        store
            .save_judgment("night-1", 1, CandidateStatus::Skip)
            .unwrap();
        store
            .save_judgment("night-1", 1, CandidateStatus::Apnea)
            .unwrap();
        let judgments = store.load_judgments("night-1").unwrap();
        assert_eq!(judgments.len(), 2);
        assert_eq!(judgments[&1], CandidateStatus::Apnea);

        let params = CalibrationParameters::new(0.02, 3.5).unwrap();
        store.save_calibration("night-1", &params).unwrap();
        assert_eq!(store.load_calibration("night-1").unwrap(), Some(params));

        let events = vec![ApneaEvent {
            start_time: 10.0,
            end_time: 25.0,
            duration: 15.0,
            trough_rms: 0.001,
        }];
        store.save_events("night-1", &events).unwrap();
        assert_eq!(store.load_events("night-1").unwrap(), events);

        store.save_candidates("night-2", &[]).unwrap();
        assert_eq!(
            store.list_jobs().unwrap(),
            vec!["night-1".to_string(), "night-2".to_string()]
        );

        assert!(store.delete_job("night-1").unwrap());
        assert!(!store.delete_job("night-1").unwrap());
        assert!(store.load_envelope("night-1").unwrap().is_none());
        assert_eq!(store.list_jobs().unwrap(), vec!["night-2".to_string()]);
    }
}

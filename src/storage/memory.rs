// In-memory JobStore for tests and embedding

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};

use super::{validate_job_id, JobStore};
use crate::analysis::{ApneaEvent, Candidate, CandidateStatus, EnergyEnvelope, Judgments};
use crate::calibration::CalibrationParameters;

#[derive(Debug, Default, Clone)]
struct JobRecords {
    envelope: Option<EnergyEnvelope>,
    candidates: Vec<Candidate>,
    judgments: Judgments,
    events: Vec<ApneaEvent>,
    calibration: Option<CalibrationParameters>,
}

/// RwLock-guarded map of job id to records
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: RwLock<BTreeMap<String, JobRecords>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, job_id: &str, f: impl FnOnce(&JobRecords) -> T) -> Result<Option<T>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        Ok(jobs.get(job_id).map(f))
    }

    fn write(&self, job_id: &str, f: impl FnOnce(&mut JobRecords)) -> Result<()> {
        validate_job_id(job_id)?;
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        f(jobs.entry(job_id.to_string()).or_default());
        Ok(())
    }
}

impl JobStore for MemoryStore {
    fn load_envelope(&self, job_id: &str) -> Result<Option<EnergyEnvelope>> {
        Ok(self.read(job_id, |job| job.envelope.clone())?.flatten())
    }

    fn save_envelope(&self, job_id: &str, envelope: &EnergyEnvelope) -> Result<()> {
        self.write(job_id, |job| job.envelope = Some(envelope.clone()))
    }

    fn load_candidates(&self, job_id: &str) -> Result<Vec<Candidate>> {
        Ok(self
            .read(job_id, |job| job.candidates.clone())?
            .unwrap_or_default())
    }

    fn save_candidates(&self, job_id: &str, candidates: &[Candidate]) -> Result<()> {
        self.write(job_id, |job| job.candidates = candidates.to_vec())
    }

    fn load_judgments(&self, job_id: &str) -> Result<Judgments> {
        Ok(self
            .read(job_id, |job| job.judgments.clone())?
            .unwrap_or_default())
    }

    fn save_judgment(
        &self,
        job_id: &str,
        candidate_id: u32,
        status: CandidateStatus,
    ) -> Result<()> {
        self.write(job_id, |job| {
            job.judgments.insert(candidate_id, status);
        })
    }

    fn load_events(&self, job_id: &str) -> Result<Vec<ApneaEvent>> {
        Ok(self
            .read(job_id, |job| job.events.clone())?
            .unwrap_or_default())
    }

    fn save_events(&self, job_id: &str, events: &[ApneaEvent]) -> Result<()> {
        self.write(job_id, |job| job.events = events.to_vec())
    }

    fn load_calibration(&self, job_id: &str) -> Result<Option<CalibrationParameters>> {
        Ok(self.read(job_id, |job| job.calibration)?.flatten())
    }

    fn save_calibration(&self, job_id: &str, params: &CalibrationParameters) -> Result<()> {
        self.write(job_id, |job| job.calibration = Some(*params))
    }

    fn list_jobs(&self) -> Result<Vec<String>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        Ok(jobs.keys().cloned().collect())
    }

    fn delete_job(&self, job_id: &str) -> Result<bool> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        Ok(jobs.remove(job_id).is_some())
    }
}

// JSON file JobStore
//
// Layout: <root>/<job_id>/{envelope,candidates,judgments,events,calibration}.json
// Each record kind is one pretty-printed document, replaced whole on save.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{validate_job_id, JobStore};
use crate::analysis::{ApneaEvent, Candidate, CandidateStatus, EnergyEnvelope, Judgments};
use crate::calibration::CalibrationParameters;

const ENVELOPE_FILE: &str = "envelope.json";
const CANDIDATES_FILE: &str = "candidates.json";
const JUDGMENTS_FILE: &str = "judgments.json";
const EVENTS_FILE: &str = "events.json";
const CALIBRATION_FILE: &str = "calibration.json";

/// Filesystem store, one directory per job
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, job_id: &str) -> Result<PathBuf> {
        validate_job_id(job_id)?;
        Ok(self.root.join(job_id))
    }

    fn read_record<T: DeserializeOwned>(&self, job_id: &str, file: &str) -> Result<Option<T>> {
        let path = self.job_dir(job_id)?.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let record = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(record))
    }

    fn write_record<T: Serialize + ?Sized>(&self, job_id: &str, file: &str, record: &T) -> Result<()> {
        let dir = self.job_dir(job_id)?;
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(file);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("[JsonFileStore] Wrote {}", path.display());
        Ok(())
    }
}

impl JobStore for JsonFileStore {
    fn load_envelope(&self, job_id: &str) -> Result<Option<EnergyEnvelope>> {
        self.read_record(job_id, ENVELOPE_FILE)
    }

    fn save_envelope(&self, job_id: &str, envelope: &EnergyEnvelope) -> Result<()> {
        self.write_record(job_id, ENVELOPE_FILE, envelope)
    }

    fn load_candidates(&self, job_id: &str) -> Result<Vec<Candidate>> {
        Ok(self
            .read_record(job_id, CANDIDATES_FILE)?
            .unwrap_or_default())
    }

    fn save_candidates(&self, job_id: &str, candidates: &[Candidate]) -> Result<()> {
        self.write_record(job_id, CANDIDATES_FILE, candidates)
    }

    fn load_judgments(&self, job_id: &str) -> Result<Judgments> {
        Ok(self
            .read_record(job_id, JUDGMENTS_FILE)?
            .unwrap_or_default())
    }

    fn save_judgment(
        &self,
        job_id: &str,
        candidate_id: u32,
        status: CandidateStatus,
    ) -> Result<()> {
        let mut judgments = self.load_judgments(job_id)?;
        judgments.insert(candidate_id, status);
        self.write_record(job_id, JUDGMENTS_FILE, &judgments)
    }

    fn load_events(&self, job_id: &str) -> Result<Vec<ApneaEvent>> {
        Ok(self.read_record(job_id, EVENTS_FILE)?.unwrap_or_default())
    }

    fn save_events(&self, job_id: &str, events: &[ApneaEvent]) -> Result<()> {
        self.write_record(job_id, EVENTS_FILE, events)
    }

    fn load_calibration(&self, job_id: &str) -> Result<Option<CalibrationParameters>> {
        self.read_record(job_id, CALIBRATION_FILE)
    }

    fn save_calibration(&self, job_id: &str, params: &CalibrationParameters) -> Result<()> {
        self.write_record(job_id, CALIBRATION_FILE, params)
    }

    fn list_jobs(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("listing {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_job_id(name).is_ok() {
                    jobs.push(name.to_string());
                }
            }
        }
        jobs.sort();
        Ok(jobs)
    }

    fn delete_job(&self, job_id: &str) -> Result<bool> {
        let dir = self.job_dir(job_id)?;
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).with_context(|| format!("removing {}", dir.display()))?;
        log::info!("[JsonFileStore] Deleted job {}", job_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("apnea_store_{}_{}", std::process::id(), nanos))
    }

    #[test]
    fn test_json_store_contract() {
        let root = temp_root();
        contract::exercise(&JsonFileStore::new(&root));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_records_are_readable_json() {
        let root = temp_root();
        let store = JsonFileStore::new(&root);
        store
            .save_judgment("job", 3, CandidateStatus::Skip)
            .unwrap();

        let text = fs::read_to_string(root.join("job").join(JUDGMENTS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["3"], "skip");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_corrupt_record_reports_path() {
        let root = temp_root();
        let store = JsonFileStore::new(&root);
        fs::create_dir_all(root.join("job")).unwrap();
        fs::write(root.join("job").join(EVENTS_FILE), "not json").unwrap();

        let err = store.load_events("job").unwrap_err();
        assert!(format!("{err:#}").contains(EVENTS_FILE));
        let _ = fs::remove_dir_all(root);
    }
}

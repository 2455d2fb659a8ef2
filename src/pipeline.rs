//! Pipeline façade wiring every stage to one validated configuration
//!
//! `ApneaPipeline` owns no job state. Each call takes the current snapshot
//! (envelope, candidates with their latest statuses) and returns fresh
//! value objects; persisting them is the caller's business. Callers must
//! serialise concurrent calibration runs against the same job themselves.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::{
    events_from_judgments, AhiAggregator, ApneaEvent, Candidate, CandidateExtractor,
    CandidateSet, EnergyEnvelope, EnergyEnvelopeExtractor, EventDetector, EventSummary, Peak,
    SasResult,
};
use crate::audio::{AudioDecoder, AudioTrack, WavDecoder};
use crate::calibration::{
    CalibrationParameters, Expansion, Marker, ParameterCalibrator, StatisticalExpander,
};
use crate::config::AppConfig;
use crate::error::{ApneaError, AudioError, CalibrationError, ConfigError, DetectionError};

/// Output of a full scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Absent when the events come straight from judgments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<CalibrationParameters>,
    pub events: Vec<ApneaEvent>,
    pub summary: EventSummary,
    pub sas: SasResult,
}

#[derive(Debug, Clone)]
pub struct ApneaPipeline {
    config: AppConfig,
    decoder: WavDecoder,
    envelope: EnergyEnvelopeExtractor,
    candidates: CandidateExtractor,
    expander: StatisticalExpander,
    calibrator: ParameterCalibrator,
    detector: EventDetector,
    aggregator: AhiAggregator,
}

impl ApneaPipeline {
    /// Build every stage from a validated configuration
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let decoder = WavDecoder::new(config.decoder.target_sample_rate);
        let envelope = EnergyEnvelopeExtractor::new(config.envelope.hop_seconds);
        let candidates = CandidateExtractor::new(
            config.candidates.top_n,
            config.candidates.min_separation_secs,
            config.candidates.min_prominence,
        );
        let expander =
            StatisticalExpander::new(config.expansion.sigma_band, config.expansion.max_additional);
        let calibrator = ParameterCalibrator::new(
            config.calibration.resume_lookahead_secs,
            config.candidates.apnea_window_secs,
            config.calibration.fallback_resume_multiplier,
            config.calibration.marker_resume_frames,
            config.calibration.baseline_silence_percentile,
            config.calibration.baseline_resume_multiplier,
        );
        let detector = EventDetector::new(
            config.detection.min_apnea_secs,
            config.detection.resume_lookahead_secs,
            config.detection.merge_gap_secs,
        );
        let aggregator = AhiAggregator::new(
            config.ahi.window_secs,
            config.ahi.step_secs,
            config.ahi.severity.clone(),
            config.ahi.assignment,
        );

        Ok(Self {
            config,
            decoder,
            envelope,
            candidates,
            expander,
            calibrator,
            detector,
            aggregator,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Decode a WAV recording at the configured analysis rate
    pub fn decode(&self, path: &Path) -> Result<AudioTrack, AudioError> {
        self.decoder.decode(path)
    }

    pub fn extract_envelope(&self, track: &AudioTrack) -> Result<EnergyEnvelope, AudioError> {
        self.envelope.extract(track)
    }

    pub fn extract_candidates(
        &self,
        envelope: &EnergyEnvelope,
    ) -> Result<CandidateSet, DetectionError> {
        self.candidates.extract(envelope)
    }

    /// Decode, build the envelope and extract candidates in one go
    pub fn analyze_file(&self, path: &Path) -> Result<(EnergyEnvelope, CandidateSet), ApneaError> {
        let track = self.decode(path)?;
        let envelope = self.extract_envelope(&track)?;
        let candidates = self.extract_candidates(&envelope)?;
        Ok((envelope, candidates))
    }

    pub fn expand(
        &self,
        peaks: &[Peak],
        candidates: &[Candidate],
    ) -> Result<Expansion, CalibrationError> {
        self.expander.expand(peaks, candidates)
    }

    pub fn calibrate(
        &self,
        envelope: &EnergyEnvelope,
        candidates: &[Candidate],
    ) -> Result<CalibrationParameters, CalibrationError> {
        self.calibrator.calibrate(envelope, candidates)
    }

    pub fn calibrate_from_markers(
        &self,
        envelope: &EnergyEnvelope,
        markers: &[Marker],
    ) -> Result<CalibrationParameters, CalibrationError> {
        self.calibrator.calibrate_from_markers(envelope, markers)
    }

    pub fn baseline_parameters(
        &self,
        envelope: &EnergyEnvelope,
    ) -> Result<CalibrationParameters, CalibrationError> {
        self.calibrator.baseline(envelope)
    }

    pub fn detect(
        &self,
        envelope: &EnergyEnvelope,
        params: &CalibrationParameters,
    ) -> Vec<ApneaEvent> {
        self.detector.detect(envelope, params)
    }

    pub fn aggregate(
        &self,
        events: &[ApneaEvent],
        duration_secs: f64,
    ) -> Result<SasResult, DetectionError> {
        self.aggregator.aggregate(events, duration_secs)
    }

    /// Detect and aggregate with given parameters
    pub fn score_with(
        &self,
        envelope: &EnergyEnvelope,
        parameters: CalibrationParameters,
    ) -> Result<Score, ApneaError> {
        let events = self.detect(envelope, &parameters);
        self.score_events(envelope, events, Some(parameters))
    }

    /// AHI over the apnea windows of the judged candidates, no detection
    pub fn score_judgments(
        &self,
        envelope: &EnergyEnvelope,
        candidates: &[Candidate],
    ) -> Result<Score, ApneaError> {
        let events = events_from_judgments(
            envelope,
            candidates,
            self.config.candidates.apnea_window_secs,
        );
        self.score_events(envelope, events, None)
    }

    fn score_events(
        &self,
        envelope: &EnergyEnvelope,
        events: Vec<ApneaEvent>,
        parameters: Option<CalibrationParameters>,
    ) -> Result<Score, ApneaError> {
        let duration = envelope.duration_secs();
        let sas = self.aggregate(&events, duration)?;
        let summary = EventSummary::from_events(&events, duration);
        Ok(Score {
            parameters,
            events,
            summary,
            sas,
        })
    }

    /// Fresh calibration from the current judgments, then detect and aggregate
    pub fn score(
        &self,
        envelope: &EnergyEnvelope,
        candidates: &[Candidate],
    ) -> Result<Score, ApneaError> {
        let parameters = self.calibrate(envelope, candidates)?;
        self.score_with(envelope, parameters)
    }
}

// Analysis module - signal stages of the apnea pipeline
//
// Pipeline: EnergyEnvelopeExtractor → CandidateExtractor → (human judgment,
// calibration) → EventDetector → AhiAggregator
//
// Every stage is a pure function of its inputs; no stage holds state
// between calls.

pub mod ahi;
pub mod candidates;
pub mod envelope;
pub mod events;
pub mod peaks;

pub use ahi::{AhiAggregator, AhiWindow, SasResult, Severity};
pub use candidates::{
    apply_judgments, Candidate, CandidateExtractor, CandidateSet, CandidateSource,
    CandidateStatus, Judgments, TimeSpan,
};
pub use envelope::{EnergyEnvelope, EnergyEnvelopeExtractor, EnvelopePoint, EnvelopeStatistics};
pub use events::{
    events_from_judgments, merge_nearby_events, ApneaEvent, EventDetector, EventSummary,
};
pub use peaks::{find_local_maxima, suppress_by_distance, Peak};

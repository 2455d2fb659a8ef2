//! Testing utilities shared by unit tests, integration tests and the CLI

pub mod synthetic;

pub use synthetic::{evenly_spaced_pauses, SyntheticRecording};

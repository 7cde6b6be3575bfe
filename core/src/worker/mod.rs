//! Worker module - determinism validation

pub mod determinism;

pub use determinism::{DeterminismValidationResult, DeterminismValidator};

//! The seven pipeline stages (spec §4.2–§4.8).
//!
//! Each stage module exposes a `run` entry point that mutates the shared
//! [`crate::job::Job`] and returns a [`StageOutcome`]; the orchestrator
//! interprets the outcome against the per-stage failure policy in spec
//! §4.1.

pub mod assemble;
pub mod diarize;
pub mod mix;
pub mod preprocess;
pub mod synthesize;
pub mod transcribe;
pub mod translate;

use std::time::Duration;

use crate::job::StageStatus;

/// Result of running a single stage, independent of the orchestrator's
/// fatal/degraded policy decision.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub status: StageStatus,
    pub elapsed: Duration,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl StageOutcome {
    pub fn succeeded(elapsed: Duration) -> Self {
        Self {
            status: StageStatus::Succeeded,
            elapsed,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn degraded(elapsed: Duration, warnings: Vec<String>) -> Self {
        Self {
            status: StageStatus::Degraded,
            elapsed,
            error: None,
            warnings,
        }
    }

    pub fn failed(elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Failed,
            elapsed,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }
}

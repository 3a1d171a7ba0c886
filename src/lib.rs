//! dubforge - automated video/audio dubbing orchestration engine
//!
//! Drives transcription, diarization, translation, speech synthesis,
//! time-stretching, and loudness mixing across a single shared `Job`
//! context, with retries, provider fallback, and partial-failure
//! tolerance at each stage boundary.

pub mod catalog;
pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod retry;
pub mod segment;
pub mod stages;

/// Initialize structured logging from `RUST_LOG`, defaulting to `info`
/// when unset.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

//! Application and job configuration.
//!
//! Follows the teacher's `DiarizationConfig`/`WhisperConfig` shape: a plain
//! `Default`-able struct with every tunable spelled out, overridable via
//! environment variables at process startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::segment::SpeakerMode;

/// Diarization confidence-propagation multiplier applied when a sampled
/// result is propagated to a non-sampled neighbor (spec §4.5, §9 open
/// question: "not derived from measurement").
pub const DIARIZATION_PROPAGATION_MULTIPLIER: f32 = 0.8;

/// Above this many segments, diarization samples evenly across the
/// timeline instead of analyzing every segment (spec §4.5).
pub const DIARIZATION_SAMPLING_THRESHOLD: usize = 50;

/// Fixed batch size for S4 translation requests (spec §4.4).
pub const TRANSLATION_BATCH_SIZE: usize = 20;

/// Delay enforced between consecutive translation batches (spec §4.4).
pub const TRANSLATION_INTER_BATCH_DELAY: Duration = Duration::from_millis(1500);

/// Consecutive translation batch failures after which the stage is fatal
/// (spec §4.4, §4.1).
pub const TRANSLATION_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Consecutive primary-provider TTS failures after which S5 switches all
/// remaining segments to the fallback provider (spec §4.6).
pub const SYNTHESIS_FALLBACK_THRESHOLD: u32 = 3;

/// Fraction of non-empty segments that must produce audio for S5 to be
/// `succeeded` rather than `degraded` (spec §4.6).
pub const SYNTHESIS_SUCCESS_RATIO: f64 = 0.8;

/// Maximum fraction of segment failures S5 tolerates before the whole job
/// still succeeds (spec §4.1).
pub const SYNTHESIS_MAX_FAILURE_RATIO: f64 = 0.2;

/// Application-wide configuration: provider endpoints/credentials,
/// concurrency, timeouts, and default loudness targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bounded concurrency `W` for per-segment S5/S6 work (spec §5).
    pub concurrency: usize,
    pub scratch_root: PathBuf,

    pub subprocess_timeout: Duration,
    pub transcription_timeout: Duration,
    pub translation_timeout: Duration,
    pub tts_timeout: Duration,
    pub stretch_timeout: Duration,

    pub target_integrated_lufs: f32,
    pub target_true_peak_dbtp: f32,
    pub target_loudness_range_lu: f32,

    pub cloud_transcription_api_key: Option<String>,
    pub translation_provider_a_endpoint: String,
    pub translation_provider_b_api_key: Option<String>,
    pub translation_provider_b_endpoint: String,
    pub premium_tts_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            scratch_root: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("dubforge"),
            subprocess_timeout: Duration::from_secs(300),
            transcription_timeout: Duration::from_secs(300),
            translation_timeout: Duration::from_secs(180),
            tts_timeout: Duration::from_secs(120),
            stretch_timeout: Duration::from_secs(120),
            target_integrated_lufs: -16.0,
            target_true_peak_dbtp: -1.5,
            target_loudness_range_lu: 11.0,
            cloud_transcription_api_key: None,
            translation_provider_a_endpoint: "https://api.translation-provider-a.example/v1/translate".into(),
            translation_provider_b_api_key: None,
            translation_provider_b_endpoint: "https://api.translation-provider-b.example/v1/translate".into(),
            premium_tts_api_key: None,
        }
    }
}

impl AppConfig {
    /// Load overrides from environment variables, falling back to
    /// [`AppConfig::default`] for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(w) = std::env::var("DUBFORGE_CONCURRENCY") {
            if let Ok(w) = w.parse() {
                config.concurrency = w;
            }
        }
        if let Ok(root) = std::env::var("DUBFORGE_SCRATCH_ROOT") {
            config.scratch_root = PathBuf::from(root);
        }
        config.cloud_transcription_api_key = std::env::var("DUBFORGE_STT_CLOUD_API_KEY").ok();
        if let Ok(endpoint) = std::env::var("DUBFORGE_TRANSLATE_A_ENDPOINT") {
            config.translation_provider_a_endpoint = endpoint;
        }
        config.translation_provider_b_api_key =
            std::env::var("DUBFORGE_TRANSLATE_B_API_KEY").ok();
        if let Ok(endpoint) = std::env::var("DUBFORGE_TRANSLATE_B_ENDPOINT") {
            config.translation_provider_b_endpoint = endpoint;
        }
        config.premium_tts_api_key = std::env::var("DUBFORGE_TTS_PREMIUM_API_KEY").ok();
        config
    }
}

/// Per-job options supplied by the caller (spec §6 `options`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    pub apply_noise_reduction: bool,
    pub apply_highpass: bool,
    pub apply_normalization: bool,
    pub output_format: OutputFormat,
    pub quick_mode: bool,
    pub speaker_mode: SpeakerMode,
    pub default_gender: crate::segment::Gender,
    /// Override for S7's background attenuation level (linear gain,
    /// 0.0-1.0). `None` uses the 15-18% default from spec §4.8.
    pub background_level: Option<f32>,
    pub enable_reverb_matching: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            apply_noise_reduction: true,
            apply_highpass: true,
            apply_normalization: true,
            output_format: OutputFormat::Aac,
            quick_mode: false,
            speaker_mode: SpeakerMode::Smart,
            default_gender: crate::segment::Gender::Female,
            background_level: None,
            enable_reverb_matching: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Aac,
    Mp3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_targets() {
        let config = AppConfig::default();
        assert_eq!(config.target_integrated_lufs, -16.0);
        assert_eq!(config.target_true_peak_dbtp, -1.5);
        assert_eq!(config.concurrency, 4);
    }
}

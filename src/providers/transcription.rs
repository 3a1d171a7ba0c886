//! Speech-to-text provider interface (spec §4.3, §9 design note).
//!
//! Providers return a `TranscriptResult` sum type — either word-level
//! timestamps or pre-segmented text — and normalize to the `Segment`
//! model at ingress here, so no provider-specific field names leak past
//! this module.

use async_trait::async_trait;
use std::path::Path;

use crate::error::DubResult;
use crate::segment::Word;

/// Raw provider output before segmentation. Local Whisper-style backends
/// typically return word timestamps; some cloud APIs return segments
/// directly without per-word timing.
#[derive(Debug, Clone)]
pub enum TranscriptResult {
    Words(Vec<Word>),
    Segments(Vec<RawSegment>),
}

#[derive(Debug, Clone)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct LanguageDetection {
    pub language: String,
    pub probability: f32,
}

#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub result: TranscriptResult,
    pub detected_language: Option<LanguageDetection>,
}

/// Minimum silence gap (ms) used for voice-activity filtering by the
/// local provider (spec §4.3).
pub const MIN_SILENCE_MS: u32 = 500;

#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hint: Option<&str>,
    ) -> DubResult<TranscriptionOutcome>;

    /// Whether this provider can return word-level timestamps. When
    /// `false`, segments must be opened via the silence/word-count
    /// heuristic in spec §4.3 rather than provider-native boundaries.
    fn supports_word_timestamps(&self) -> bool;
}

/// Local model provider (primary path). A real implementation wraps an
/// in-process or subprocess speech model; this stub models the
/// interface contract the orchestrator depends on.
pub struct LocalWhisperProvider {
    pub model_path: std::path::PathBuf,
}

#[async_trait]
impl TranscriptionProvider for LocalWhisperProvider {
    fn name(&self) -> &'static str {
        "local_whisper"
    }

    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language_hint: Option<&str>,
    ) -> DubResult<TranscriptionOutcome> {
        Err(crate::error::DubError::ProviderTransient {
            provider: self.name().into(),
            message: "local model backend is an external collaborator; wire a concrete model"
                .into(),
        })
    }

    fn supports_word_timestamps(&self) -> bool {
        true
    }
}

/// Cloud fallback, used only when the local path fails and the API key
/// is configured (spec §4.3).
pub struct CloudTranscriptionProvider {
    pub api_key: String,
    pub client: reqwest::Client,
}

#[async_trait]
impl TranscriptionProvider for CloudTranscriptionProvider {
    fn name(&self) -> &'static str {
        "cloud_transcription"
    }

    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language_hint: Option<&str>,
    ) -> DubResult<TranscriptionOutcome> {
        Err(crate::error::DubError::ProviderTransient {
            provider: self.name().into(),
            message: "cloud STT backend is an external collaborator; wire a concrete API".into(),
        })
    }

    fn supports_word_timestamps(&self) -> bool {
        false
    }
}

//! Shared test doubles for dubforge's integration tests.
//!
//! Built with `mockall::mock!` directly against the crate's public
//! provider traits, the same pattern the crate's own unit tests reach
//! for when a trait boundary needs a stand-in collaborator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dubforge::config::OutputFormat;
use dubforge::error::DubResult;
use dubforge::providers::media::{AudioFilter, LoudnessStats, MediaPrimitive, StretchMethod};
use dubforge::providers::translation::{ContentContext, TranslationProvider};
use dubforge::providers::tts::{SynthesisRequest, TtsProvider};
use mockall::mock;

mock! {
    pub Media {}

    #[async_trait]
    impl MediaPrimitive for Media {
        async fn extract(&self, input: &Path, output: &Path, sample_rate: u32, channels: u16) -> DubResult<()>;
        async fn filter(&self, input: &Path, output: &Path, filter: AudioFilter) -> DubResult<()>;
        async fn probe_duration(&self, input: &Path) -> DubResult<f64>;
        async fn analyze_loudness(&self, input: &Path) -> DubResult<LoudnessStats>;
        async fn concat(&self, inputs: &[PathBuf], output: &Path) -> DubResult<()>;
        async fn stretch(&self, input: &Path, output: &Path, ratio: f64, method: StretchMethod) -> DubResult<()>;
        async fn encode(&self, input: &Path, output: &Path, format: OutputFormat, sample_rate: u32, channels: u16) -> DubResult<()>;
        async fn generate_silence(&self, output: &Path, duration_seconds: f64, sample_rate: u32, channels: u16) -> DubResult<()>;
        async fn mix(&self, primary: &Path, primary_gain: f32, secondary: &Path, secondary_gain: f32, output: &Path) -> DubResult<()>;
    }
}

mock! {
    pub Translation {}

    #[async_trait]
    impl TranslationProvider for Translation {
        fn name(&self) -> &'static str;
        async fn translate_numbered_batch(
            &self,
            numbered_prompt: &str,
            target_language: &str,
            context: ContentContext,
        ) -> DubResult<String>;
    }
}

mock! {
    pub Tts {}

    #[async_trait]
    impl TtsProvider for Tts {
        fn name(&self) -> &'static str;
        async fn synthesize(&self, request: SynthesisRequest<'_>, output_path: &Path) -> DubResult<f64>;
    }
}

/// A `MockMedia` wired for S6 assemble tests: every generated-silence and
/// stretch call succeeds, and `probe_duration` returns whatever was
/// recorded via `record_duration` (defaulting to 0.0).
pub fn passthrough_media() -> MockMedia {
    let mut media = MockMedia::new();
    media.expect_generate_silence().returning(|output, _duration, _sr, _ch| {
        std::fs::write(output, b"silence").map_err(dubforge::error::DubError::Io)
    });
    media.expect_concat().returning(|_inputs, output| {
        std::fs::write(output, b"concat").map_err(dubforge::error::DubError::Io)
    });
    media
}

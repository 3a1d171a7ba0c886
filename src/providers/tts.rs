//! Text-to-speech provider interface (spec §4.6, §9 design note).

use async_trait::async_trait;
use std::path::Path;

use crate::error::{DubError, DubResult};

/// Prosody adjustment applied on top of a voice's neutral delivery
/// (spec §4.6 step 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prosody {
    pub rate_pct: i32,
    pub pitch_hz: i32,
}

impl Prosody {
    pub const NEUTRAL: Prosody = Prosody { rate_pct: 0, pitch_hz: 0 };

    /// Combine this prosody's rate with a rate-alignment adjustment,
    /// clamped to `[-50, 100]` percent (spec §4.6 step 3).
    pub fn combined_rate(&self, rate_adjust_pct: i32) -> i32 {
        (self.rate_pct + rate_adjust_pct).clamp(-50, 100)
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    pub voice_id: &'a str,
    pub rate_pct: i32,
    pub pitch_hz: i32,
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render speech to `output_path`, returning the rendered clip's
    /// measured duration in seconds.
    async fn synthesize(
        &self,
        request: SynthesisRequest<'_>,
        output_path: &Path,
    ) -> DubResult<f64>;
}

/// Premium provider (higher-quality neural voices, paid API).
pub struct PremiumTtsProvider {
    pub api_key: String,
    pub client: reqwest::Client,
}

#[async_trait]
impl TtsProvider for PremiumTtsProvider {
    fn name(&self) -> &'static str {
        "tts_premium"
    }

    async fn synthesize(
        &self,
        _request: SynthesisRequest<'_>,
        _output_path: &Path,
    ) -> DubResult<f64> {
        Err(DubError::ProviderTransient {
            provider: self.name().into(),
            message: "premium TTS backend is an external collaborator".into(),
        })
    }
}

/// Free provider (no API key required, used as S5's fallback per spec
/// §4.6).
pub struct FreeTtsProvider {
    pub client: reqwest::Client,
}

#[async_trait]
impl TtsProvider for FreeTtsProvider {
    fn name(&self) -> &'static str {
        "tts_free"
    }

    async fn synthesize(
        &self,
        _request: SynthesisRequest<'_>,
        _output_path: &Path,
    ) -> DubResult<f64> {
        Err(DubError::ProviderTransient {
            provider: self.name().into(),
            message: "free TTS backend is an external collaborator".into(),
        })
    }
}

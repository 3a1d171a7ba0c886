//! `MediaPrimitive`: the abstract interface over media transcoding,
//! filtering, probing, and concatenation (spec §9 design note).
//!
//! The orchestrator and stages depend only on this trait. A native
//! implementation shells out to an external media tool per invocation,
//! the same pattern the `annex` voice crate uses for its TTS binaries
//! (`examples/other_examples/...-annex-voice-src-tts.rs.rs`); a
//! higher-throughput implementation could call the same underlying
//! library in-process without changing any caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::OutputFormat;
use crate::error::{DubError, DubResult};

/// Adaptive denoise + high-pass + loudness-normalize parameters (spec
/// §4.2).
#[derive(Debug, Clone, Copy)]
pub enum AudioFilter {
    HighPass { hz: f32 },
    Denoise { strength: f32, floor_dbfs: f32 },
    LoudnessNormalize { lufs: f32, true_peak_dbtp: f32, lra: f32 },
    /// Subtle room-tone matching, `amount` in `[0, 1]` (spec §4.8 step 5).
    Reverb { amount: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessStats {
    pub integrated_lufs: f32,
    pub true_peak_dbtp: f32,
    pub loudness_range_lu: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StretchMethod {
    /// Pitch-preserving phase-vocoder-class stretching, ratio clamped to
    /// `[0.7, 1.5]` (spec §4.7).
    PhasePreserving,
    /// Tempo-only filter fallback, ratio clamped to `[0.5, 2.0]`.
    TempoFilter,
}

impl StretchMethod {
    pub fn ratio_bounds(&self) -> (f64, f64) {
        match self {
            StretchMethod::PhasePreserving => (0.7, 1.5),
            StretchMethod::TempoFilter => (0.5, 2.0),
        }
    }

    pub fn clamp_ratio(&self, ratio: f64) -> (f64, bool) {
        let (lo, hi) = self.ratio_bounds();
        let clamped = ratio.clamp(lo, hi);
        (clamped, (clamped - ratio).abs() > f64::EPSILON)
    }
}

/// Media transcoding/filtering/probing primitive. All operations are
/// suspension points (spec §5): the native implementation awaits a
/// subprocess, so callers yield while the underlying tool runs.
#[async_trait]
pub trait MediaPrimitive: Send + Sync {
    async fn extract(
        &self,
        input: &Path,
        output: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> DubResult<()>;

    async fn filter(&self, input: &Path, output: &Path, filter: AudioFilter) -> DubResult<()>;

    async fn probe_duration(&self, input: &Path) -> DubResult<f64>;

    async fn analyze_loudness(&self, input: &Path) -> DubResult<LoudnessStats>;

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> DubResult<()>;

    async fn stretch(
        &self,
        input: &Path,
        output: &Path,
        ratio: f64,
        method: StretchMethod,
    ) -> DubResult<()>;

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
        sample_rate: u32,
        channels: u16,
    ) -> DubResult<()>;

    async fn generate_silence(
        &self,
        output: &Path,
        duration_seconds: f64,
        sample_rate: u32,
        channels: u16,
    ) -> DubResult<()>;

    /// Sum two streams with per-stream linear gain weights, writing a new
    /// mixed file (spec §4.8 step 4).
    async fn mix(
        &self,
        primary: &Path,
        primary_gain: f32,
        secondary: &Path,
        secondary_gain: f32,
        output: &Path,
    ) -> DubResult<()>;
}

/// Native implementation invoking an external media tool (e.g. ffmpeg) as
/// a subprocess per operation, with a fixed per-call timeout (spec §5:
/// "subprocess-per-step 300s").
pub struct NativeMediaPrimitive {
    binary: PathBuf,
    timeout: Duration,
}

impl NativeMediaPrimitive {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> DubResult<()> {
        let fut = Command::new(&self.binary).args(args).output();
        let output = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                DubError::ProviderTransient {
                    provider: "media_primitive".into(),
                    message: format!("timed out after {:?}", self.timeout),
                }
            })?
            .map_err(DubError::Io)?;
        if !output.status.success() {
            return Err(DubError::ProviderPermanent {
                provider: "media_primitive".into(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaPrimitive for NativeMediaPrimitive {
    async fn extract(
        &self,
        input: &Path,
        output: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> DubResult<()> {
        self.run(&[
            "-y",
            "-i",
            &input.to_string_lossy(),
            "-ar",
            &sample_rate.to_string(),
            "-ac",
            &channels.to_string(),
            &output.to_string_lossy(),
        ])
        .await
    }

    async fn filter(&self, input: &Path, output: &Path, filter: AudioFilter) -> DubResult<()> {
        let expr = match filter {
            AudioFilter::HighPass { hz } => format!("highpass=f={hz}"),
            AudioFilter::Denoise { strength, floor_dbfs } => {
                let db = (strength.clamp(0.0, 1.0) * 40.0).round();
                format!("afftdn=nr={db}:nf={floor_dbfs}")
            }
            AudioFilter::LoudnessNormalize { lufs, true_peak_dbtp, lra } => {
                format!("loudnorm=I={lufs}:TP={true_peak_dbtp}:LRA={lra}")
            }
            AudioFilter::Reverb { amount } => {
                let amount = amount.clamp(0.0, 1.0);
                let decay = (amount * 0.6).max(0.05);
                format!("aecho=0.8:0.88:60:{decay}")
            }
        };
        self.run(&[
            "-y",
            "-i",
            &input.to_string_lossy(),
            "-af",
            &expr,
            &output.to_string_lossy(),
        ])
        .await
    }

    async fn probe_duration(&self, input: &Path) -> DubResult<f64> {
        let fut = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output();
        let output = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DubError::ProviderTransient {
                provider: "media_primitive".into(),
                message: "probe timed out".into(),
            })?
            .map_err(DubError::Io)?;
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .map_err(|e| DubError::ProviderPermanent {
                provider: "media_primitive".into(),
                message: format!("could not parse duration: {e}"),
            })
    }

    async fn analyze_loudness(&self, _input: &Path) -> DubResult<LoudnessStats> {
        // A real implementation parses ffmpeg's loudnorm first-pass JSON
        // from stderr. Left as a provider concern (spec §1).
        Err(DubError::StageFailed {
            stage: "media_primitive".into(),
            message: "analyze_loudness requires a concrete media backend".into(),
        })
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> DubResult<()> {
        if inputs.is_empty() {
            return Err(DubError::AssetMissing("no inputs to concat".into()));
        }
        let list_path = output.with_extension("concat.txt");
        let list_contents: String = inputs
            .iter()
            .map(|p| format!("file '{}'\n", p.to_string_lossy()))
            .collect();
        tokio::fs::write(&list_path, list_contents).await?;
        let result = self
            .run(&[
                "-y",
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                &list_path.to_string_lossy(),
                "-c",
                "copy",
                &output.to_string_lossy(),
            ])
            .await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result
    }

    async fn stretch(
        &self,
        input: &Path,
        output: &Path,
        ratio: f64,
        method: StretchMethod,
    ) -> DubResult<()> {
        let (clamped, _) = method.clamp_ratio(ratio);
        match method {
            StretchMethod::PhasePreserving => {
                // A real backend would invoke a phase-vocoder primitive
                // (e.g. rubberband); atempo is the portable fallback path
                // shared with TempoFilter here for the native shell-out.
                self.run(&[
                    "-y",
                    "-i",
                    &input.to_string_lossy(),
                    "-af",
                    &format!("rubberband=tempo={clamped}"),
                    &output.to_string_lossy(),
                ])
                .await
            }
            StretchMethod::TempoFilter => {
                self.run(&[
                    "-y",
                    "-i",
                    &input.to_string_lossy(),
                    "-af",
                    &format!("atempo={clamped}"),
                    &output.to_string_lossy(),
                ])
                .await
            }
        }
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
        sample_rate: u32,
        channels: u16,
    ) -> DubResult<()> {
        let codec = match format {
            OutputFormat::Aac => "aac",
            OutputFormat::Mp3 => "libmp3lame",
        };
        self.run(&[
            "-y",
            "-i",
            &input.to_string_lossy(),
            "-ar",
            &sample_rate.to_string(),
            "-ac",
            &channels.to_string(),
            "-c:a",
            codec,
            &output.to_string_lossy(),
        ])
        .await
    }

    async fn generate_silence(
        &self,
        output: &Path,
        duration_seconds: f64,
        sample_rate: u32,
        channels: u16,
    ) -> DubResult<()> {
        let layout = if channels == 1 { "mono" } else { "stereo" };
        self.run(&[
            "-y",
            "-f",
            "lavfi",
            "-i",
            &format!("anullsrc=r={sample_rate}:cl={layout}"),
            "-t",
            &format!("{duration_seconds:.3}"),
            &output.to_string_lossy(),
        ])
        .await
    }

    async fn mix(
        &self,
        primary: &Path,
        primary_gain: f32,
        secondary: &Path,
        secondary_gain: f32,
        output: &Path,
    ) -> DubResult<()> {
        let filter = format!(
            "[0:a]volume={secondary_gain}[bg];[1:a]volume={primary_gain}[fg];[bg][fg]amix=inputs=2:duration=longest"
        );
        self.run(&[
            "-y",
            "-i",
            &secondary.to_string_lossy(),
            "-i",
            &primary.to_string_lossy(),
            "-filter_complex",
            &filter,
            &output.to_string_lossy(),
        ])
        .await
    }
}

//! S7 — Mix (spec §4.8).
//!
//! Blends the original background track with the assembled dubbed track
//! at a gain balance that favors intelligibility of the dub, then
//! re-normalizes to the job's loudness targets.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::DubError;
use crate::job::Job;
use crate::providers::media::{AudioFilter, MediaPrimitive};

use super::StageOutcome;

/// Default dubbed-track loudness target (spec §4.8 step 2).
const DEFAULT_TARGET_DUBBED_LUFS: f32 = -14.0;
/// Dubbed gain clamp bounds, LU (spec §4.8 step 2).
const DUBBED_GAIN_CLAMP: f32 = 20.0;
/// Default background attenuation when no `background_level` override is
/// set (spec §4.8 step 3: "15-18% linear gain, approx -15dB").
const DEFAULT_BACKGROUND_GAIN: f32 = 0.17;
/// Mix weights applied after gain computation (spec §4.8 step 4).
const BACKGROUND_MIX_WEIGHT: f32 = 0.2;
const DUBBED_MIX_WEIGHT: f32 = 1.0;
/// Reverb amount ceiling; above this the match is considered unreliable
/// and skipped (spec §4.8 step 5).
const MAX_REVERB_AMOUNT: f32 = 0.2;

pub async fn run(job: &mut Job, media: &dyn MediaPrimitive, config: &AppConfig, quick: bool) -> StageOutcome {
    let start = Instant::now();
    match run_inner(job, media, config, quick).await {
        Ok(()) => {
            info!(job_id = %job.job_id, quick, "mix succeeded");
            StageOutcome::succeeded(start.elapsed())
        }
        Err(err) => StageOutcome::failed(start.elapsed(), err.to_string()),
    }
}

async fn run_inner(
    job: &mut Job,
    media: &dyn MediaPrimitive,
    config: &AppConfig,
    quick: bool,
) -> Result<(), DubError> {
    let background = job
        .artifacts
        .background_audio
        .clone()
        .ok_or_else(|| DubError::AssetMissing("background audio (set by S1)".into()))?;
    let dubbed = job
        .artifacts
        .assembled_audio
        .clone()
        .ok_or_else(|| DubError::AssetMissing("assembled audio (set by S6)".into()))?;

    let dubbed_loudness = media.analyze_loudness(&dubbed).await?;

    let target_dubbed_lufs = DEFAULT_TARGET_DUBBED_LUFS;
    let dubbed_gain_lu =
        (target_dubbed_lufs - dubbed_loudness.integrated_lufs).clamp(-DUBBED_GAIN_CLAMP, DUBBED_GAIN_CLAMP);
    let dubbed_linear_gain = db_to_linear(dubbed_gain_lu) * DUBBED_MIX_WEIGHT;

    let background_gain = job.options.background_level.unwrap_or(DEFAULT_BACKGROUND_GAIN);
    let background_linear_gain = background_gain * BACKGROUND_MIX_WEIGHT;

    let scratch = job.scratch.subdir("mix")?;

    let reverb_input = if job.options.enable_reverb_matching && !quick {
        match apply_reverb_match(media, &dubbed, &scratch).await {
            Ok(path) => path,
            Err(err) => {
                warn!(job_id = %job.job_id, error = %err, "reverb matching failed, mixing without it");
                dubbed.clone()
            }
        }
    } else {
        dubbed.clone()
    };

    let mixed_path = scratch.join("mixed.wav");
    media
        .mix(&reverb_input, dubbed_linear_gain, &background, background_linear_gain, &mixed_path)
        .await?;

    let normalized_path = scratch.join("normalized.wav");
    media
        .filter(
            &mixed_path,
            &normalized_path,
            AudioFilter::LoudnessNormalize {
                lufs: config.target_integrated_lufs,
                true_peak_dbtp: config.target_true_peak_dbtp,
                lra: config.target_loudness_range_lu,
            },
        )
        .await?;

    let final_path = job.scratch.path().join(format!("final.{}", job.options.output_format.extension()));
    media
        .encode(&normalized_path, &final_path, job.options.output_format, 48_000, 2)
        .await?;

    job.artifacts.mixed_audio = Some(normalized_path);
    job.artifacts.final_output = Some(final_path);
    Ok(())
}

/// Apply subtle room-tone matching before the mix, bounded per spec
/// §4.8 step 5. A real implementation would derive the reverb amount
/// from the background's measured RT60; this primitive only needs a
/// bounded amount to stay within the "subtle" ceiling.
async fn apply_reverb_match(
    media: &dyn MediaPrimitive,
    dubbed: &std::path::Path,
    scratch: &std::path::Path,
) -> Result<std::path::PathBuf, DubError> {
    let amount = MAX_REVERB_AMOUNT;
    let output = scratch.join("reverb_matched.wav");
    media.filter(dubbed, &output, AudioFilter::Reverb { amount }).await?;
    Ok(output)
}

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

impl crate::config::OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            crate::config::OutputFormat::Aac => "aac",
            crate::config::OutputFormat::Mp3 => "mp3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dubbed_gain_clamps_to_spec_bounds() {
        let huge_gain = (-14.0f32 - (-60.0f32)).clamp(-DUBBED_GAIN_CLAMP, DUBBED_GAIN_CLAMP);
        assert_eq!(huge_gain, DUBBED_GAIN_CLAMP);
    }

    #[test]
    fn db_to_linear_zero_is_unity() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn default_background_gain_is_within_spec_range() {
        assert!(DEFAULT_BACKGROUND_GAIN >= 0.15 && DEFAULT_BACKGROUND_GAIN <= 0.18);
    }
}

//! S1 — Preprocess (spec §4.2).
//!
//! Extracts a 16 kHz mono working copy for transcription plus an
//! unmodified 48 kHz stereo extract of the original audio for later
//! mixing. Each filtering sub-step is independently skippable; a
//! sub-step's failure leaves the prior artifact in use rather than
//! aborting the stage. Audio extraction itself is the only fatal point.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::{AppConfig, JobOptions};
use crate::error::DubError;
use crate::job::Job;
use crate::providers::media::{AudioFilter, MediaPrimitive};

use super::StageOutcome;

/// High-pass cutoff for rumble removal (spec §4.2).
pub const HIGH_PASS_HZ: f32 = 80.0;
/// Noise floor fed to the denoise primitive (spec §4.2).
pub const DENOISE_FLOOR_DBFS: f32 = -25.0;
/// Working audio sample rate/channels for transcription (spec §4.2).
pub const TRANSCRIPTION_SAMPLE_RATE: u32 = 16_000;
pub const TRANSCRIPTION_CHANNELS: u16 = 1;
/// Background extract sample rate/channels for later mixing (spec §4.2).
pub const BACKGROUND_SAMPLE_RATE: u32 = 48_000;
pub const BACKGROUND_CHANNELS: u16 = 2;

pub async fn run(
    job: &mut Job,
    media: &dyn MediaPrimitive,
    config: &AppConfig,
) -> StageOutcome {
    let start = Instant::now();
    let mut warnings = Vec::new();

    match run_inner(job, media, &job.options.clone(), config, &mut warnings).await {
        Ok(()) => {
            info!(job_id = %job.job_id, "preprocess succeeded");
            if warnings.is_empty() {
                StageOutcome::succeeded(start.elapsed())
            } else {
                StageOutcome::degraded(start.elapsed(), warnings)
            }
        }
        Err(err) => {
            warn!(job_id = %job.job_id, error = %err, "preprocess failed fatally");
            StageOutcome::failed(start.elapsed(), err.to_string())
        }
    }
}

async fn run_inner(
    job: &mut Job,
    media: &dyn MediaPrimitive,
    options: &JobOptions,
    config: &AppConfig,
    warnings: &mut Vec<String>,
) -> Result<(), DubError> {
    let scratch = job.scratch.subdir("preprocess")?;
    let background_path = scratch.join("background_48k_stereo.wav");
    let extracted_path = scratch.join("extracted.wav");

    // Audio extraction (and the unmodified background copy) is fatal.
    // `extract` demuxes the audio track from a video container or
    // converts a plain audio input uniformly (spec §4.2 step 1).
    media
        .extract(
            &job.source_path,
            &background_path,
            BACKGROUND_SAMPLE_RATE,
            BACKGROUND_CHANNELS,
        )
        .await?;
    job.artifacts.background_audio = Some(background_path.clone());

    media
        .extract(
            &background_path,
            &extracted_path,
            TRANSCRIPTION_SAMPLE_RATE,
            TRANSCRIPTION_CHANNELS,
        )
        .await?;

    let mut current = extracted_path;

    if options.apply_highpass {
        match apply_step(
            media,
            &current,
            &scratch,
            "highpass",
            AudioFilter::HighPass { hz: HIGH_PASS_HZ },
        )
        .await
        {
            Ok(next) => current = next,
            Err(e) => warnings.push(format!("highpass skipped: {e}")),
        }
    }

    if options.apply_noise_reduction {
        match apply_step(
            media,
            &current,
            &scratch,
            "denoise",
            AudioFilter::Denoise {
                strength: 0.5,
                floor_dbfs: DENOISE_FLOOR_DBFS,
            },
        )
        .await
        {
            Ok(next) => current = next,
            Err(e) => warnings.push(format!("denoise skipped: {e}")),
        }
    }

    if options.apply_normalization {
        match apply_step(
            media,
            &current,
            &scratch,
            "normalized",
            AudioFilter::LoudnessNormalize {
                lufs: config.target_integrated_lufs,
                true_peak_dbtp: config.target_true_peak_dbtp,
                lra: config.target_loudness_range_lu,
            },
        )
        .await
        {
            Ok(next) => current = next,
            Err(e) => warnings.push(format!("normalization skipped: {e}")),
        }
    }

    job.artifacts.preprocessed_audio = Some(current);

    let duration = media.probe_duration(&background_path).await.unwrap_or(0.0);
    job.source_duration = Some(crate::segment::round3(duration));

    Ok(())
}

async fn apply_step(
    media: &dyn MediaPrimitive,
    input: &std::path::Path,
    scratch: &std::path::Path,
    label: &str,
    filter: AudioFilter,
) -> Result<std::path::PathBuf, DubError> {
    let output = scratch.join(format!("{label}.wav"));
    media.filter(input, &output, filter).await?;
    Ok(output)
}

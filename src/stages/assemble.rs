//! S6 — Assemble (spec §4.7).
//!
//! Walks the segment timeline with a single cursor, inserting silence for
//! gaps and time-stretching clips whose measured duration drifts from the
//! segment's target duration, then concatenates everything into one
//! continuous track whose total duration matches the source within
//! tolerance.

use std::time::Instant;

use tracing::{info, warn};

use crate::error::DubError;
use crate::job::Job;
use crate::providers::media::{MediaPrimitive, StretchMethod};
use crate::segment::round3;

use super::StageOutcome;

/// Above this residual (seconds) a clip is time-stretched rather than
/// used as-is (spec §4.7 step 2).
const STRETCH_THRESHOLD_SECONDS: f64 = 0.3;
/// Final-duration tolerance: the assembled track may differ from the
/// source duration by at most this fraction...
const DURATION_TOLERANCE_RATIO: f64 = 0.01;
/// ...or this many seconds, whichever is looser (spec §4.7 numerical
/// policy).
const DURATION_TOLERANCE_SECONDS: f64 = 0.5;

pub async fn run(job: &mut Job, media: &dyn MediaPrimitive) -> StageOutcome {
    let start = Instant::now();
    match run_inner(job, media).await {
        Ok(()) => {
            info!(job_id = %job.job_id, "assemble succeeded");
            StageOutcome::succeeded(start.elapsed())
        }
        Err(err) => StageOutcome::failed(start.elapsed(), err.to_string()),
    }
}

async fn run_inner(job: &mut Job, media: &dyn MediaPrimitive) -> Result<(), DubError> {
    let total_duration = job
        .source_duration
        .ok_or_else(|| DubError::AssetMissing("source duration (set by S1)".into()))?;

    let scratch = job.scratch.subdir("assemble")?;
    let mut segments = job.segments.clone();
    segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

    let mut pieces: Vec<std::path::PathBuf> = Vec::new();
    let mut cursor = 0.0f64;

    for (i, seg) in segments.iter().enumerate() {
        if seg.start > cursor {
            let gap = round3(seg.start - cursor);
            let silence_path = scratch.join(format!("gap_{i:04}.wav"));
            media.generate_silence(&silence_path, gap, 48_000, 2).await?;
            pieces.push(silence_path);
        }

        match &seg.audio_path {
            Some(clip_path) => {
                let measured = media.probe_duration(clip_path).await.unwrap_or(seg.duration());
                let residual = measured - seg.duration();
                if residual.abs() > STRETCH_THRESHOLD_SECONDS && seg.duration() > 0.0 {
                    let ratio = measured / seg.duration();
                    let stretched_path = scratch.join(format!("stretch_{i:04}.wav"));
                    let (clamped_ratio, was_clamped) =
                        StretchMethod::PhasePreserving.clamp_ratio(ratio);
                    let stretch_result = media
                        .stretch(clip_path, &stretched_path, clamped_ratio, StretchMethod::PhasePreserving)
                        .await;
                    match stretch_result {
                        Ok(()) => {
                            if was_clamped {
                                warn!(segment = seg.id, ratio, clamped_ratio, "stretch ratio clamped");
                            }
                            pieces.push(stretched_path);
                        }
                        Err(err) => {
                            warn!(segment = seg.id, error = %err, "phase-preserving stretch failed, trying tempo filter");
                            let (fallback_ratio, fallback_clamped) =
                                StretchMethod::TempoFilter.clamp_ratio(ratio);
                            match media
                                .stretch(clip_path, &stretched_path, fallback_ratio, StretchMethod::TempoFilter)
                                .await
                            {
                                Ok(()) => {
                                    if fallback_clamped {
                                        warn!(segment = seg.id, ratio, fallback_ratio, "tempo-filter stretch ratio clamped");
                                    }
                                    pieces.push(stretched_path);
                                }
                                Err(err) => {
                                    warn!(segment = seg.id, error = %err, "tempo-filter stretch also failed, using unstretched clip");
                                    pieces.push(clip_path.clone());
                                }
                            }
                        }
                    }
                } else {
                    pieces.push(clip_path.clone());
                }
            }
            None => {
                let silence_path = scratch.join(format!("missing_{i:04}.wav"));
                media
                    .generate_silence(&silence_path, seg.duration().max(0.0), 48_000, 2)
                    .await?;
                pieces.push(silence_path);
            }
        }

        cursor = seg.end;
    }

    if cursor < total_duration {
        let trailing = round3(total_duration - cursor);
        let silence_path = scratch.join("trailing.wav");
        media.generate_silence(&silence_path, trailing, 48_000, 2).await?;
        pieces.push(silence_path);
    }

    if pieces.is_empty() {
        return Err(DubError::AssetMissing("no segments or silence to assemble".into()));
    }

    let assembled_path = job.scratch.path().join("assembled.wav");
    media.concat(&pieces, &assembled_path).await?;

    let assembled_duration = media.probe_duration(&assembled_path).await.unwrap_or(total_duration);
    let drift = (assembled_duration - total_duration).abs();
    let tolerance = (total_duration * DURATION_TOLERANCE_RATIO).max(DURATION_TOLERANCE_SECONDS);
    if drift > tolerance {
        return Err(DubError::InvariantViolation(format!(
            "assembled duration {assembled_duration:.3}s drifted {drift:.3}s from source {total_duration:.3}s (tolerance {tolerance:.3}s)"
        )));
    }

    job.artifacts.assembled_audio = Some(assembled_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_widens_for_long_sources() {
        let short = (10.0f64 * DURATION_TOLERANCE_RATIO).max(DURATION_TOLERANCE_SECONDS);
        assert_eq!(short, DURATION_TOLERANCE_SECONDS);

        let long = (600.0f64 * DURATION_TOLERANCE_RATIO).max(DURATION_TOLERANCE_SECONDS);
        assert_eq!(long, 6.0);
    }
}

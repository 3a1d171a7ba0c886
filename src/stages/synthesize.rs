//! S5 — Synthesize (spec §4.6).
//!
//! Per-segment: detect emotion from text, render with the primary TTS
//! provider, measure the clip, and re-render once with a rate-aligned
//! prosody if the residual exceeds 0.3s. Segment-level work runs with
//! bounded concurrency; the primary-provider consecutive-failure counter
//! is local to this call, not a process-global (spec §9 design note).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use futures_util::{stream, StreamExt};
use tracing::{info, warn};

use crate::catalog;
use crate::config::{SYNTHESIS_FALLBACK_THRESHOLD, SYNTHESIS_SUCCESS_RATIO};
use crate::job::Job;
use crate::providers::tts::{Prosody, SynthesisRequest, TtsProvider};
use crate::retry::{retry, RetryPolicy};
use crate::segment::{Emotion, Gender, SyncQuality};

use super::StageOutcome;

/// Render-duration residual above which S5 re-renders once with a
/// rate-aligned prosody (spec §4.6 step 3).
const REALIGN_THRESHOLD_SECONDS: f64 = 0.3;

/// Text-keyword emotion table, grounded on the acoustic category names
/// used elsewhere in this crate (spec §4.6 step 1: "keyword match against
/// an enumerated table"). Rate/pitch deltas and keyword lists follow the
/// same per-emotion prosody shape as the reference dubbing tool; the
/// reference's "excited"/"whisper" buckets fold into `Happy`/`Calm` since
/// those are the closest fit among this crate's eight emotion categories.
const EMOTION_TABLE: &[(Emotion, i32, i32, &[&str])] = &[
    (Emotion::Angry, 15, 10, &["angry", "furious", "rage", "hate", "damn", "hell"]),
    (Emotion::Sad, -10, -5, &["sad", "sorry", "grief", "cry", "tears", "miss", "lost"]),
    (Emotion::Happy, 20, 15, &["wow", "amazing", "incredible", "excited", "great", "yes!"]),
    (Emotion::Fearful, 5, 5, &["scared", "afraid", "fear", "help", "run", "danger"]),
    (Emotion::Calm, -15, -10, &["shh", "quiet", "whisper", "secret", "psst"]),
];

/// Classify a segment's base emotion and prosody from its text (spec
/// §4.6 step 1). Neutral/zero prosody when no keyword matches.
fn detect_emotion(text: &str) -> (Emotion, Prosody) {
    let lower = text.to_ascii_lowercase();
    for (emotion, rate_pct, pitch_hz, keywords) in EMOTION_TABLE {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return (*emotion, Prosody { rate_pct: *rate_pct, pitch_hz: *pitch_hz });
        }
    }
    (Emotion::Neutral, Prosody::NEUTRAL)
}

/// Pick an unused voice for `(gender, language)`, falling back to any
/// voice for the language, then to the job's configured default gender
/// (spec §4.5/§6).
fn pick_voice(job: &Job, language: &str, gender: Gender) -> String {
    let same_gender = catalog::voices_for_gender(language, gender);
    if let Some(v) = same_gender.iter().find(|v| !job.voice_assignment.is_used(v.voice_id)) {
        return v.voice_id.to_string();
    }
    if let Some(v) = same_gender.first() {
        return v.voice_id.to_string();
    }
    if let Some(v) = catalog::voices_for_language(language).and_then(|all| all.first()) {
        return v.voice_id.to_string();
    }
    "en-US-JennyNeural".to_string()
}

struct SynthesisResult {
    index: usize,
    emotion: Emotion,
    audio_path: Option<PathBuf>,
    sync_quality: Option<SyncQuality>,
}

pub async fn run(
    job: &mut Job,
    primary: &dyn TtsProvider,
    fallback: &dyn TtsProvider,
    concurrency: usize,
) -> StageOutcome {
    let start = Instant::now();

    let tts_dir = match job.scratch.subdir("tts") {
        Ok(dir) => dir,
        Err(err) => return StageOutcome::failed(start.elapsed(), err.to_string()),
    };
    job.artifacts.tts_dir = Some(tts_dir.clone());

    let target_language = job.target_language.clone();
    let default_gender = job.options.default_gender;

    // Stable voice assignment: resolved once per distinct speaker before
    // fan-out, since the assignment cache is shared job state (spec §3).
    let mut speakers_seen: Vec<(u32, Gender)> = Vec::new();
    for seg in &job.segments {
        if !speakers_seen.iter().any(|(id, _)| *id == seg.speaker_id) {
            let gender = if seg.gender == Gender::Unknown { default_gender } else { seg.gender };
            speakers_seen.push((seg.speaker_id, gender));
        }
    }
    for (speaker_id, gender) in speakers_seen {
        if job.voice_assignment.get(speaker_id, &target_language).is_none() {
            let voice_id = pick_voice(job, &target_language, gender);
            job.voice_assignment.insert(speaker_id, &target_language, voice_id);
        }
    }

    let total_non_empty = job.segments.iter().filter(|s| !s.is_empty_text()).count();
    if total_non_empty == 0 {
        info!(job_id = %job.job_id, "synthesize: no non-empty segments");
        return StageOutcome::succeeded(start.elapsed());
    }

    let work: Vec<(usize, String, f64, String)> = job
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_empty_text())
        .map(|(idx, seg)| {
            let voice_id = job
                .voice_assignment
                .get(seg.speaker_id, &target_language)
                .unwrap_or("en-US-JennyNeural")
                .to_string();
            (idx, seg.text.clone(), seg.duration(), voice_id)
        })
        .collect();

    let consecutive_primary_failures = AtomicU32::new(0);
    let use_fallback = AtomicBool::new(false);

    let results: Vec<SynthesisResult> = stream::iter(work.into_iter().map(|(idx, text, duration, voice_id)| {
        let tts_dir = &tts_dir;
        let consecutive_primary_failures = &consecutive_primary_failures;
        let use_fallback = &use_fallback;
        async move {
            synthesize_segment(
                idx,
                &text,
                duration,
                &voice_id,
                primary,
                fallback,
                tts_dir,
                consecutive_primary_failures,
                use_fallback,
            )
            .await
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut succeeded_count = 0usize;
    for r in results {
        let seg = &mut job.segments[r.index];
        seg.emotion = r.emotion;
        seg.failed = r.audio_path.is_none();
        seg.audio_path = r.audio_path;
        seg.sync_quality = r.sync_quality;
        if !seg.failed {
            succeeded_count += 1;
        }
    }

    let ratio = succeeded_count as f64 / total_non_empty as f64;
    info!(job_id = %job.job_id, succeeded_count, total_non_empty, ratio, "synthesize complete");

    if ratio >= SYNTHESIS_SUCCESS_RATIO {
        StageOutcome::succeeded(start.elapsed())
    } else if succeeded_count == 0 {
        StageOutcome::failed(start.elapsed(), "no segments produced audio")
    } else {
        StageOutcome::degraded(
            start.elapsed(),
            vec![format!("only {:.0}% of segments synthesized", ratio * 100.0)],
        )
    }
}

#[allow(clippy::too_many_arguments)]
async fn synthesize_segment(
    index: usize,
    text: &str,
    target_duration: f64,
    voice_id: &str,
    primary: &dyn TtsProvider,
    fallback: &dyn TtsProvider,
    tts_dir: &Path,
    consecutive_primary_failures: &AtomicU32,
    use_fallback: &AtomicBool,
) -> SynthesisResult {
    let (emotion, base_prosody) = detect_emotion(text);
    let output_path = tts_dir.join(format!("segment_{index:04}.wav"));
    let policy = RetryPolicy::synthesis();

    let use_primary_first = !use_fallback.load(Ordering::SeqCst);
    let first_provider: &dyn TtsProvider = if use_primary_first { primary } else { fallback };

    let first_attempt = render_with_retry(
        first_provider,
        text,
        voice_id,
        base_prosody,
        &output_path,
        &policy,
    )
    .await;

    let (provider_used_primary, first_duration) = match first_attempt {
        Ok(duration) => {
            if use_primary_first {
                consecutive_primary_failures.store(0, Ordering::SeqCst);
            }
            (use_primary_first, duration)
        }
        Err(err) => {
            if use_primary_first {
                let failures = consecutive_primary_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(segment = index, error = %err, failures, "primary TTS failed, trying fallback");
                if failures >= SYNTHESIS_FALLBACK_THRESHOLD {
                    use_fallback.store(true, Ordering::SeqCst);
                }
                match render_with_retry(fallback, text, voice_id, base_prosody, &output_path, &policy).await {
                    Ok(duration) => (false, duration),
                    Err(err) => {
                        warn!(segment = index, error = %err, "fallback TTS also failed");
                        return SynthesisResult {
                            index,
                            emotion,
                            audio_path: None,
                            sync_quality: None,
                        };
                    }
                }
            } else {
                warn!(segment = index, error = %err, "fallback TTS failed");
                return SynthesisResult {
                    index,
                    emotion,
                    audio_path: None,
                    sync_quality: None,
                };
            }
        }
    };

    let residual = first_duration - target_duration;
    if residual.abs() <= REALIGN_THRESHOLD_SECONDS || target_duration <= 0.0 {
        return SynthesisResult {
            index,
            emotion,
            audio_path: Some(output_path),
            sync_quality: Some(SyncQuality::from_residual(residual)),
        };
    }

    let rate_adjust = ((first_duration / target_duration - 1.0) * 100.0).round() as i32;
    let realigned_rate = base_prosody.combined_rate(rate_adjust);
    let realigned = SynthesisRequest {
        text,
        voice_id,
        rate_pct: realigned_rate,
        pitch_hz: base_prosody.pitch_hz,
    };

    let provider: &dyn TtsProvider = if provider_used_primary { primary } else { fallback };
    match provider.synthesize(realigned, &output_path).await {
        Ok(final_duration) => SynthesisResult {
            index,
            emotion,
            audio_path: Some(output_path),
            sync_quality: Some(SyncQuality::from_residual(final_duration - target_duration)),
        },
        Err(err) => {
            warn!(segment = index, error = %err, "re-render for rate alignment failed; keeping first pass");
            SynthesisResult {
                index,
                emotion,
                audio_path: Some(output_path),
                sync_quality: Some(SyncQuality::from_residual(residual)),
            }
        }
    }
}

async fn render_with_retry(
    provider: &dyn TtsProvider,
    text: &str,
    voice_id: &str,
    prosody: Prosody,
    output_path: &Path,
    policy: &RetryPolicy,
) -> Result<f64, crate::error::DubError> {
    retry(policy, || async {
        provider
            .synthesize(
                SynthesisRequest {
                    text,
                    voice_id,
                    rate_pct: prosody.rate_pct,
                    pitch_hz: prosody.pitch_hz,
                },
                output_path,
            )
            .await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_angry_keyword() {
        let (emotion, prosody) = detect_emotion("I am absolutely furious about this");
        assert_eq!(emotion, Emotion::Angry);
        assert_eq!(prosody.rate_pct, 15);
        assert_eq!(prosody.pitch_hz, 10);
    }

    #[test]
    fn detects_sad_keyword() {
        let (emotion, _) = detect_emotion("I miss you so much, I'm so sad");
        assert_eq!(emotion, Emotion::Sad);
    }

    #[test]
    fn defaults_to_neutral_without_keyword() {
        let (emotion, prosody) = detect_emotion("The weather today is mild");
        assert_eq!(emotion, Emotion::Neutral);
        assert_eq!(prosody, Prosody::NEUTRAL);
    }

    #[test]
    fn first_matching_keyword_wins_in_table_order() {
        // "angry" is checked before "sad" in EMOTION_TABLE order.
        let (emotion, _) = detect_emotion("angry and sad at the same time");
        assert_eq!(emotion, Emotion::Angry);
    }
}

//! S2 — Transcribe (spec §4.3).
//!
//! Primary path is a local model with word timestamps and VAD filtering;
//! cloud API is a fallback used only when the local path fails and the
//! API is configured. Fatal (`TranscriptionFatal`) if neither produces
//! any segments.

use std::time::Instant;

use tracing::{info, warn};

use crate::error::DubError;
use crate::job::Job;
use crate::providers::transcription::{TranscriptResult, TranscriptionOutcome, TranscriptionProvider};
use crate::retry::{retry, RetryPolicy};
use crate::segment::{Segment, Word};

use super::StageOutcome;

/// Open a new segment when the gap since the last word exceeds this
/// threshold (spec §4.3).
const MAX_SILENT_GAP_SECONDS: f64 = 1.5;
/// Or when the current segment reaches this many words (spec §4.3).
const MAX_WORDS_PER_SEGMENT: usize = 20;
/// A gap larger than this toggles the initial speaker-id guess between
/// 0 and 1, refined later by S3 (spec §4.3).
const SPEAKER_TOGGLE_GAP_SECONDS: f64 = 2.0;

pub async fn run(
    job: &mut Job,
    primary: &dyn TranscriptionProvider,
    fallback: Option<&dyn TranscriptionProvider>,
) -> StageOutcome {
    let start = Instant::now();
    let audio_path = match job.artifacts.preprocessed_audio.clone() {
        Some(path) => path,
        None => {
            return StageOutcome::failed(start.elapsed(), "preprocessed audio missing")
        }
    };

    let policy = RetryPolicy::transcription();
    let language_hint = job.source_language.clone();

    let primary_result = retry(&policy, || {
        let language_hint = language_hint.clone();
        async { primary.transcribe(&audio_path, language_hint.as_deref()).await }
    })
    .await;

    let outcome = match primary_result {
        Ok(outcome) => Some(outcome),
        Err(primary_err) => {
            warn!(job_id = %job.job_id, error = %primary_err, "primary transcription failed, trying fallback");
            match fallback {
                Some(fallback) => match fallback.transcribe(&audio_path, language_hint.as_deref()).await {
                    Ok(outcome) => Some(outcome),
                    Err(fallback_err) => {
                        warn!(job_id = %job.job_id, error = %fallback_err, "fallback transcription also failed");
                        None
                    }
                },
                None => None,
            }
        }
    };

    let Some(outcome) = outcome else {
        return StageOutcome::failed(
            start.elapsed(),
            DubError::stage_failed("transcribe", "both primary and fallback produced no segments")
                .to_string(),
        );
    };

    job.segments = segments_from_outcome(&outcome);
    if job.source_language.is_none() {
        if let Some(detection) = &outcome.detected_language {
            job.source_language = Some(detection.language.clone());
            info!(job_id = %job.job_id, language = %detection.language, probability = detection.probability, "detected source language");
        }
    }

    if job.segments.is_empty() {
        return StageOutcome::failed(start.elapsed(), "no segments produced");
    }

    if let Err(err) = crate::segment::enforce_ordering(&mut job.segments) {
        return StageOutcome::failed(start.elapsed(), err.to_string());
    }

    info!(job_id = %job.job_id, segments = job.segments.len(), "transcribe succeeded");
    StageOutcome::succeeded(start.elapsed())
}

fn segments_from_outcome(outcome: &TranscriptionOutcome) -> Vec<Segment> {
    match &outcome.result {
        TranscriptResult::Segments(raw) => raw
            .iter()
            .enumerate()
            .map(|(id, r)| Segment::new(id as u64, r.start, r.end, &r.text))
            .collect(),
        TranscriptResult::Words(words) => segments_from_words(words),
    }
}

/// Open a new segment per spec §4.3's silence-gap / word-count rule, and
/// assign the initial speaker-id toggle heuristic.
fn segments_from_words(words: &[Word]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<&Word> = Vec::new();
    let mut speaker_id = 0u32;
    let mut last_word_end: Option<f64> = None;

    let flush = |current: &mut Vec<&Word>, segments: &mut Vec<Segment>, speaker_id: u32| {
        if current.is_empty() {
            return;
        }
        let start = current.first().unwrap().start;
        let end = current.last().unwrap().end;
        let text = current
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mut seg = Segment::new(segments.len() as u64, start, end, text);
        seg.words = Some(current.iter().map(|w| (*w).clone()).collect());
        seg.speaker_id = speaker_id;
        segments.push(seg);
        current.clear();
    };

    for word in words {
        if let Some(last_end) = last_word_end {
            let gap = word.start - last_end;
            if gap > SPEAKER_TOGGLE_GAP_SECONDS {
                speaker_id = if speaker_id == 0 { 1 } else { 0 };
            }
            if gap > MAX_SILENT_GAP_SECONDS && !current.is_empty() {
                flush(&mut current, &mut segments, speaker_id);
            }
        }
        current.push(word);
        if current.len() >= MAX_WORDS_PER_SEGMENT {
            flush(&mut current, &mut segments, speaker_id);
        }
        last_word_end = Some(word.end);
    }
    flush(&mut current, &mut segments, speaker_id);
    segments
}

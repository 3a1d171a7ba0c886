//! S3 — Diarize (spec §4.5).
//!
//! Pitch-based diarization: for each segment, estimate the fundamental
//! frequency via normalized autocorrelation over a short audio window and
//! classify gender from it. No ML model is required. On failure the
//! stage degrades rather than aborting (spec §4.1): every segment gets
//! `speaker_id = 0, gender = unknown`.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::DIARIZATION_SAMPLING_THRESHOLD;
use crate::job::Job;
use crate::providers::media::MediaPrimitive;
use crate::segment::Gender;

use super::StageOutcome;

/// Autocorrelation lag range bounds, expressed as `sample_rate / Hz`
/// (spec §4.5: `sr/400 .. sr/50`).
const MAX_FREQ_HZ: f64 = 400.0;
const MIN_FREQ_HZ: f64 = 50.0;
/// Minimum normalized autocorrelation to accept a pitch estimate.
const AUTOCORRELATION_THRESHOLD: f32 = 0.1;

const MALE_CEILING_HZ: f32 = 140.0;
const FEMALE_FLOOR_HZ: f32 = 185.0;

/// Estimate the fundamental frequency of a mono PCM window via
/// normalized autocorrelation (spec §4.5).
pub fn estimate_f0(samples: &[f32], sample_rate: u32) -> Option<f32> {
    if samples.is_empty() || sample_rate == 0 {
        return None;
    }
    let sample_rate = sample_rate as f64;
    let min_lag = (sample_rate / MAX_FREQ_HZ).floor() as usize;
    let max_lag = (sample_rate / MIN_FREQ_HZ).ceil() as usize;
    let min_lag = min_lag.max(1);
    if max_lag >= samples.len() || min_lag >= max_lag {
        return None;
    }

    let mut best_lag = min_lag;
    let mut best_corr = -1.0f32;
    for lag in min_lag..max_lag {
        let n = samples.len() - lag;
        if n == 0 {
            continue;
        }
        let mut corr = 0.0f32;
        let mut energy = 0.0f32;
        for i in 0..n {
            corr += samples[i] * samples[i + lag];
            energy += samples[i] * samples[i];
        }
        let normalized = if energy > 0.0 { corr / energy } else { 0.0 };
        if normalized > best_corr {
            best_corr = normalized;
            best_lag = lag;
        }
    }

    if best_corr < AUTOCORRELATION_THRESHOLD {
        return None;
    }
    Some((sample_rate / best_lag as f64) as f32)
}

/// Classify gender from an F0 estimate, spec §4.5's exact thresholds and
/// confidence formulas.
pub fn classify_gender(f0_hz: Option<f32>) -> (Gender, f32) {
    let Some(f0) = f0_hz else {
        return (Gender::Unknown, 0.0);
    };

    if f0 < MALE_CEILING_HZ {
        let confidence = ((MALE_CEILING_HZ - f0) / 55.0 + 0.5).min(1.0);
        return (Gender::Male, confidence);
    }
    if f0 > FEMALE_FLOOR_HZ {
        let confidence = ((f0 - FEMALE_FLOOR_HZ) / 70.0 + 0.5).min(1.0);
        return (Gender::Female, confidence);
    }

    let male_score = (FEMALE_FLOOR_HZ - f0) / 45.0;
    let female_score = (f0 - MALE_CEILING_HZ) / 45.0;
    if male_score > female_score {
        (Gender::Male, 0.7 * male_score)
    } else {
        (Gender::Female, 0.7 * female_score)
    }
}

/// Pick evenly-spaced sample indices across `total` items, per spec §4.5's
/// scaling rule for jobs above the sampling threshold.
pub fn sample_indices(total: usize, max_samples: usize) -> Vec<usize> {
    if total <= max_samples || max_samples == 0 {
        return (0..total).collect();
    }
    let step = total / max_samples;
    (0..total).step_by(step.max(1)).collect()
}

pub async fn run(job: &mut Job, media: &dyn MediaPrimitive) -> StageOutcome {
    let start = Instant::now();
    match run_inner(job, media).await {
        Ok(()) => {
            info!(job_id = %job.job_id, "diarize succeeded");
            StageOutcome::succeeded(start.elapsed())
        }
        Err(err) => {
            warn!(job_id = %job.job_id, error = %err, "diarize degraded to defaults");
            for seg in job.segments.iter_mut() {
                seg.speaker_id = 0;
                seg.gender = Gender::Unknown;
                seg.confidence = 0.0;
            }
            StageOutcome::degraded(start.elapsed(), vec![err.to_string()])
        }
    }
}

async fn run_inner(job: &mut Job, media: &dyn MediaPrimitive) -> Result<(), crate::error::DubError> {
    let audio_path = job
        .artifacts
        .preprocessed_audio
        .clone()
        .ok_or_else(|| crate::error::DubError::AssetMissing("preprocessed audio".into()))?;

    let total = job.segments.len();
    let sampled: std::collections::HashSet<usize> =
        sample_indices(total, DIARIZATION_SAMPLING_THRESHOLD)
            .into_iter()
            .collect();

    let scratch = job.scratch.subdir("diarize")?;
    let mut results: Vec<Option<(Gender, f32)>> = vec![None; total];

    for &i in &sampled {
        let seg = &job.segments[i];
        if seg.duration() < 0.3 {
            // Forced to unknown below; don't spend a window on it.
            continue;
        }
        let window_path = scratch.join(format!("seg_{i:04}.wav"));
        media
            .extract(&audio_path, &window_path, 16_000, 1)
            .await
            .ok();
        let samples = read_wav_samples(&window_path).unwrap_or_default();
        let f0 = estimate_f0(&samples, 16_000);
        results[i] = Some(classify_gender(f0));
        let _ = std::fs::remove_file(&window_path);
    }

    // Only indices that were actually sampled and analyzed can serve as
    // propagation sources (spec §4.5). Segments under the 0.3s floor are
    // never present here even if they were picked by `sample_indices`.
    let sorted_sampled: Vec<usize> = {
        let mut v: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_some().then_some(i))
            .collect();
        v.sort_unstable();
        v
    };

    let mut current_speaker = 0u32;
    for i in 0..total {
        // Segments under the 0.3s floor are forced to unknown, unconditionally,
        // before either consulting a sampled result or propagating a neighbor's.
        let (gender, confidence) = if job.segments[i].duration() < 0.3 {
            (Gender::Unknown, 0.0)
        } else {
            match results[i] {
                Some(r) => r,
                None => {
                    if let Some(&nearest) = sorted_sampled.iter().min_by_key(|&&s| (s as i64 - i as i64).abs()) {
                        let (g, c) = results[nearest].unwrap_or((Gender::Unknown, 0.0));
                        (g, c * crate::config::DIARIZATION_PROPAGATION_MULTIPLIER)
                    } else {
                        (Gender::Unknown, 0.0)
                    }
                }
            }
        };

        let speaker_id = match gender {
            Gender::Male => 0,
            Gender::Female => 1,
            Gender::Unknown => current_speaker,
        };
        if matches!(gender, Gender::Male | Gender::Female) {
            current_speaker = speaker_id;
        }

        let seg = &mut job.segments[i];
        seg.gender = gender;
        seg.confidence = confidence;
        seg.speaker_id = speaker_id;
    }

    Ok(())
}

fn read_wav_samples(path: &std::path::Path) -> Option<Vec<f32>> {
    let mut reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(Result::ok).collect(),
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / i32::MAX as f32)
            .collect(),
    };
    Some(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wave(freq_hz: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq_hz * t).sin()
            })
            .collect()
    }

    #[test]
    fn estimates_f0_of_pure_tone() {
        let samples = sine_wave(120.0, 16_000, 0.5);
        let f0 = estimate_f0(&samples, 16_000).expect("should detect pitch");
        assert!((f0 - 120.0).abs() < 5.0, "got {f0}");
    }

    #[test]
    fn silence_yields_no_pitch() {
        let samples = vec![0.0f32; 16_000];
        assert_eq!(estimate_f0(&samples, 16_000), None);
    }

    #[test]
    fn classifies_clear_male_and_female() {
        let (gender, confidence) = classify_gender(Some(100.0));
        assert_eq!(gender, Gender::Male);
        assert!(confidence > 0.5);

        let (gender, confidence) = classify_gender(Some(220.0));
        assert_eq!(gender, Gender::Female);
        assert!(confidence > 0.5);
    }

    #[test]
    fn classifies_overlap_zone_by_score() {
        let (gender, confidence) = classify_gender(Some(150.0));
        // male_score = (185-150)/45 = 0.778, female_score = (150-140)/45 = 0.222
        assert_eq!(gender, Gender::Male);
        assert!((confidence - 0.7 * 0.7777778).abs() < 0.01, "got {confidence}");
    }

    #[test]
    fn no_pitch_is_unknown_zero_confidence() {
        assert_eq!(classify_gender(None), (Gender::Unknown, 0.0));
    }

    #[test]
    fn sampling_below_threshold_covers_everything() {
        let indices = sample_indices(10, 50);
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn sampling_above_threshold_is_even() {
        let indices = sample_indices(500, 50);
        assert_eq!(indices.len(), 50);
        assert!(indices.windows(2).all(|w| w[1] > w[0]));
    }
}

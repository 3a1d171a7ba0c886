//! Integration tests for S6 assemble (spec §8 scenario 1, boundary: 3x
//! too-long clip).

mod common;

use std::path::PathBuf;

use dubforge::config::JobOptions;
use dubforge::job::Job;
use dubforge::providers::media::StretchMethod;
use dubforge::segment::Segment;
use dubforge::stages::assemble;

fn job_with_segments(segments: Vec<Segment>, source_duration: f64) -> Job {
    let mut job = Job::new(
        PathBuf::from("/tmp/source.mp4"),
        "es",
        Some("en".to_string()),
        JobOptions::default(),
        &std::env::temp_dir(),
    )
    .expect("job creation");
    job.segments = segments;
    job.source_duration = Some(source_duration);
    job
}

fn segment_with_clip(id: u64, start: f64, end: f64) -> Segment {
    let mut seg = Segment::new(id, start, end, "hello");
    seg.audio_path = Some(PathBuf::from(format!("/tmp/clip_{id}.wav")));
    seg
}

/// Scenario 1: gaps before, between, and after segments are filled with
/// silence, and the assembled duration equals the source duration.
#[tokio::test]
async fn gap_preservation_fills_silences_and_matches_source_duration() {
    let segments = vec![segment_with_clip(0, 0.0, 2.0), segment_with_clip(1, 5.0, 7.0)];
    let mut job = job_with_segments(segments, 10.0);

    let mut media = common::passthrough_media();
    media.expect_probe_duration().returning(|path| {
        if path.to_string_lossy().ends_with("assembled.wav") {
            Ok(10.0)
        } else {
            Ok(2.0)
        }
    });

    let outcome = assemble::run(&mut job, &media).await;
    assert_eq!(outcome.status, dubforge::job::StageStatus::Succeeded);
    assert!(job.artifacts.assembled_audio.is_some());
}

/// Boundary: a clip measured at 3x its segment's target duration is
/// stretched with the ratio clamped to the phase-preserving bound (1.5),
/// not failed.
#[tokio::test]
async fn oversized_clip_is_clamped_not_failed() {
    let segments = vec![segment_with_clip(0, 0.0, 2.0)];
    let mut job = job_with_segments(segments, 2.0);

    let mut media = common::passthrough_media();
    media.expect_probe_duration().returning(|path| {
        if path.to_string_lossy().contains("stretch_") || path.to_string_lossy().ends_with("assembled.wav") {
            Ok(2.0)
        } else {
            // The original clip measures 3x too long (6.0s for a 2.0s segment).
            Ok(6.0)
        }
    });
    media
        .expect_stretch()
        .withf(|_input, _output, ratio, method| {
            *method == StretchMethod::PhasePreserving && (*ratio - 1.5).abs() < 1e-6
        })
        .returning(|_input, output, _ratio, _method| {
            std::fs::write(output, b"stretched").map_err(dubforge::error::DubError::Io)
        });

    let outcome = assemble::run(&mut job, &media).await;
    assert_eq!(outcome.status, dubforge::job::StageStatus::Succeeded);
}

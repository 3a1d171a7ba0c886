//! Integration tests for S5 synthesize: rate-realignment sync quality,
//! stable voice assignment across a recurring speaker, and partial
//! per-segment failure tolerance.

mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use dubforge::config::JobOptions;
use dubforge::error::DubError;
use dubforge::job::Job;
use dubforge::segment::{Gender, Segment, SyncQuality};
use dubforge::stages::synthesize;

fn job_with_segments(segments: Vec<Segment>, target_language: &str) -> Job {
    let mut job = Job::new(
        PathBuf::from("/tmp/source.mp4"),
        target_language,
        Some("en".to_string()),
        JobOptions::default(),
        &std::env::temp_dir(),
    )
    .expect("job creation");
    job.segments = segments;
    job
}

/// A first render that misses its target by more than 0.3s triggers a
/// rate-realigned second render; if the realigned render still misses
/// by more than 0.5s (but not more than 1.0s) the segment is classified
/// `fair`.
#[tokio::test]
async fn rate_realignment_yields_fair_sync_quality() {
    let segments = vec![Segment::new(0, 0.0, 3.0, "a plain sentence")];
    let mut job = job_with_segments(segments, "es");

    let calls = Arc::new(AtomicU32::new(0));
    let mut primary = common::MockTts::new();
    primary.expect_name().return_const("primary");
    primary.expect_synthesize().returning(move |_req, _output| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Ok(4.1)
        } else {
            Ok(3.6)
        }
    });
    let mut fallback = common::MockTts::new();
    fallback.expect_name().return_const("fallback");
    fallback.expect_synthesize().never();

    let outcome = synthesize::run(&mut job, &primary, &fallback, 1).await;

    assert_eq!(outcome.status, dubforge::job::StageStatus::Succeeded);
    assert_eq!(job.segments[0].sync_quality, Some(SyncQuality::Fair));
}

/// The same speaker id, seen across many segments targeting the same
/// language, always resolves to the same catalog voice.
#[tokio::test]
async fn recurring_speaker_gets_one_stable_voice() {
    let segments: Vec<Segment> = (0..12u64)
        .map(|i| {
            let mut seg = Segment::new(i, i as f64 * 2.0, i as f64 * 2.0 + 2.0, format!("line {i}"));
            seg.speaker_id = 2;
            seg.gender = Gender::Male;
            seg
        })
        .collect();
    let mut job = job_with_segments(segments, "fr");

    let used_voices: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut primary = common::MockTts::new();
    primary.expect_name().return_const("primary");
    let recorded = used_voices.clone();
    primary.expect_synthesize().returning(move |req, _output| {
        recorded.lock().unwrap().push(req.voice_id.to_string());
        Ok(2.0)
    });
    let mut fallback = common::MockTts::new();
    fallback.expect_name().return_const("fallback");
    fallback.expect_synthesize().never();

    let outcome = synthesize::run(&mut job, &primary, &fallback, 4).await;

    assert_eq!(outcome.status, dubforge::job::StageStatus::Succeeded);
    let voices = used_voices.lock().unwrap();
    assert_eq!(voices.len(), 12);
    assert!(voices.iter().all(|v| v == &voices[0]));
    assert!(dubforge::catalog::voices_for_language("fr")
        .unwrap()
        .iter()
        .any(|c| c.voice_id == voices[0]));
}

/// A quarter of segments fail on both providers; the stage degrades
/// rather than failing outright, and the failed segments are marked so
/// S6 can fill them with silence.
#[tokio::test]
async fn partial_failure_degrades_without_failing_the_job() {
    let segments: Vec<Segment> = (0..100u64)
        .map(|i| {
            let text = if i < 25 { "FAIL".to_string() } else { format!("line {i}") };
            Segment::new(i, i as f64 * 2.0, i as f64 * 2.0 + 2.0, text)
        })
        .collect();
    let mut job = job_with_segments(segments, "es");

    let mut primary = common::MockTts::new();
    primary.expect_name().return_const("primary");
    primary.expect_synthesize().returning(|req, _output| {
        if req.text == "FAIL" {
            Err(DubError::ProviderPermanent {
                provider: "primary".into(),
                message: "unsupported input".into(),
            })
        } else {
            Ok(2.0)
        }
    });
    let mut fallback = common::MockTts::new();
    fallback.expect_name().return_const("fallback");
    fallback.expect_synthesize().returning(|req, _output| {
        if req.text == "FAIL" {
            Err(DubError::ProviderPermanent {
                provider: "fallback".into(),
                message: "unsupported input".into(),
            })
        } else {
            Ok(2.0)
        }
    });

    let outcome = synthesize::run(&mut job, &primary, &fallback, 8).await;

    assert_eq!(outcome.status, dubforge::job::StageStatus::Degraded);
    let failed: Vec<_> = job.segments.iter().filter(|s| s.failed).collect();
    assert_eq!(failed.len(), 25);
    assert!(failed.iter().all(|s| s.audio_path.is_none()));
    assert!(job.segments.iter().filter(|s| !s.failed).all(|s| s.audio_path.is_some()));
}

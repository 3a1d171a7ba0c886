//! Integration tests for S4 translate (spec §8 scenarios 3 and 6).

mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dubforge::config::JobOptions;
use dubforge::error::DubError;
use dubforge::job::Job;
use dubforge::providers::translation::ContentContext;
use dubforge::stages::translate;

fn job_with_n_segments(n: usize) -> Job {
    let mut job = Job::new(
        PathBuf::from("/tmp/source.mp4"),
        "es",
        Some("en".to_string()),
        JobOptions::default(),
        &std::env::temp_dir(),
    )
    .expect("job creation");
    job.segments = (0..n)
        .map(|i| dubforge::segment::Segment::new(i as u64, i as f64, i as f64 + 1.0, format!("line {i}")))
        .collect();
    job
}

/// Scenario 3: 45 segments in 3 batches of 20/20/5. The first batch's
/// response has one line with its `[N]` prefix dropped, which breaks
/// strict numbered parsing; the stage recovers via line-split fallback
/// and still translates all 20 lines of that batch, leaving all 45
/// segments translated overall.
#[tokio::test]
async fn batch_with_malformed_line_recovers_via_line_split() {
    let mut job = job_with_n_segments(45);

    let mut provider_a = common::MockTranslation::new();
    provider_a.expect_name().return_const("provider_a");
    provider_a
        .expect_translate_numbered_batch()
        .returning(|prompt, _lang, _ctx| {
            let count = prompt.lines().count();
            let lines: Vec<String> = (1..=count)
                .map(|i| {
                    if count == 20 && i == 10 {
                        format!("translated {i}")
                    } else {
                        format!("[{i}] translated {i}")
                    }
                })
                .collect();
            Ok(lines.join("\n"))
        });

    let mut provider_b = common::MockTranslation::new();
    provider_b.expect_name().return_const("provider_b");
    provider_b.expect_translate_numbered_batch().never();

    let outcome = translate::run(&mut job, &provider_a, &provider_b, ContentContext::MovieDialogue).await;

    assert_eq!(outcome.status, dubforge::job::StageStatus::Succeeded);
    assert_eq!(job.segments.len(), 45);
    assert!(job.segments.iter().all(|s| s.original_text.is_some()));
}

/// Scenario 6: three consecutive batch failures on both providers end
/// the stage fatally.
#[tokio::test]
async fn three_consecutive_batch_failures_is_fatal() {
    let mut job = job_with_n_segments(65);

    let attempts = Arc::new(AtomicU32::new(0));

    let mut provider_a = common::MockTranslation::new();
    provider_a.expect_name().return_const("provider_a");
    let attempts_a = attempts.clone();
    provider_a.expect_translate_numbered_batch().returning(move |_, _, _| {
        attempts_a.fetch_add(1, Ordering::SeqCst);
        Err(DubError::ProviderPermanent {
            provider: "provider_a".into(),
            message: "quota exhausted".into(),
        })
    });

    let mut provider_b = common::MockTranslation::new();
    provider_b.expect_name().return_const("provider_b");
    provider_b.expect_translate_numbered_batch().returning(move |_, _, _| {
        Err(DubError::ProviderPermanent {
            provider: "provider_b".into(),
            message: "quota exhausted".into(),
        })
    });

    let outcome = translate::run(&mut job, &provider_a, &provider_b, ContentContext::MovieDialogue).await;

    assert_eq!(outcome.status, dubforge::job::StageStatus::Failed);
    assert!(outcome.error.unwrap().contains("3 consecutive"));
}

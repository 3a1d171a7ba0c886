//! S4 — Translate (spec §4.4).
//!
//! Batches segments in groups of 20, tries provider A first and falls
//! back to provider B on configured failures, and tolerates individual
//! batch failures up to a consecutive-failure limit before going fatal.
//! Failure-count state lives on this call's stack, not behind a
//! process-global flag (spec §9 design note).

use std::time::Instant;

use tracing::{info, warn};

use crate::config::{
    TRANSLATION_BATCH_SIZE, TRANSLATION_INTER_BATCH_DELAY, TRANSLATION_MAX_CONSECUTIVE_FAILURES,
};
use crate::error::{DubError, TransientKind};
use crate::job::Job;
use crate::providers::translation::{format_numbered_prompt, parse_numbered_response, ContentContext, TranslationProvider};
use crate::retry::{retry, RetryPolicy};

use super::StageOutcome;

pub async fn run(
    job: &mut Job,
    provider_a: &dyn TranslationProvider,
    provider_b: &dyn TranslationProvider,
    context: ContentContext,
) -> StageOutcome {
    let start = Instant::now();
    let target_language = job.target_language.clone();
    let total = job.segments.len();
    let mut consecutive_failures = 0u32;
    let mut translated_count = 0usize;

    let batches: Vec<(usize, usize)> = (0..total)
        .step_by(TRANSLATION_BATCH_SIZE)
        .map(|start| (start, (start + TRANSLATION_BATCH_SIZE).min(total)))
        .collect();
    let num_batches = batches.len();

    for (batch_index, (lo, hi)) in batches.into_iter().enumerate() {
        let texts: Vec<String> = job.segments[lo..hi].iter().map(|s| s.text.clone()).collect();

        match translate_batch(provider_a, provider_b, &texts, &target_language, context).await {
            Ok(translations) => {
                consecutive_failures = 0;
                for (offset, translated) in translations.into_iter().enumerate() {
                    let seg = &mut job.segments[lo + offset];
                    seg.original_text = Some(seg.text.clone());
                    seg.text = translated.trim().to_string();
                }
                translated_count = hi;
            }
            Err(err) => {
                consecutive_failures += 1;
                warn!(job_id = %job.job_id, batch = batch_index, error = %err, consecutive_failures, "translation batch failed");
                if consecutive_failures >= TRANSLATION_MAX_CONSECUTIVE_FAILURES {
                    return StageOutcome::failed(
                        start.elapsed(),
                        format!(
                            "{} consecutive batch failures; partial_count={}",
                            consecutive_failures, translated_count
                        ),
                    );
                }
            }
        }

        if batch_index + 1 < num_batches {
            tokio::time::sleep(TRANSLATION_INTER_BATCH_DELAY).await;
        }
    }

    info!(job_id = %job.job_id, translated = translated_count, total, "translate succeeded");
    StageOutcome::succeeded(start.elapsed())
}

async fn translate_batch(
    provider_a: &dyn TranslationProvider,
    provider_b: &dyn TranslationProvider,
    texts: &[String],
    target_language: &str,
    context: ContentContext,
) -> Result<Vec<String>, DubError> {
    let prompt = format_numbered_prompt(texts);

    match translate_with_backoff(provider_a, &prompt, target_language, context).await {
        Ok(raw) => parse_and_validate(&raw, texts.len()),
        Err(primary_err) => {
            warn!(provider = provider_a.name(), error = %primary_err, "falling back to provider B");
            let raw = translate_with_backoff(provider_b, &prompt, target_language, context).await?;
            parse_and_validate(&raw, texts.len())
        }
    }
}

fn parse_and_validate(raw: &str, expected: usize) -> Result<Vec<String>, DubError> {
    let parsed = parse_numbered_response(raw, expected);
    if parsed.len() != expected {
        return Err(DubError::InvariantViolation(format!(
            "translated count {} does not match expected {}",
            parsed.len(),
            expected
        )));
    }
    Ok(parsed)
}

/// Issue a single provider call with up to 3 total attempts, routed
/// through [`RetryPolicy`]: the schedule is picked by the first failure's
/// transient kind — 5s/10s/20s for rate limits, 2s/4s/8s for 5xx/network,
/// no retry on permanent (4xx) errors (spec §4.4). The first attempt runs
/// outside `retry()` because the policy can't be chosen before an error
/// reveals its kind; the remaining attempts run through the generic
/// `retry` function with that policy's own backoff tail.
async fn translate_with_backoff(
    provider: &dyn TranslationProvider,
    prompt: &str,
    target_language: &str,
    context: ContentContext,
) -> Result<String, DubError> {
    let first_err = match provider.translate_numbered_batch(prompt, target_language, context).await {
        Ok(raw) => return Ok(raw),
        Err(err) => err,
    };
    if !first_err.is_retryable() {
        return Err(first_err);
    }

    let policy = policy_for(first_err.transient_kind());
    tokio::time::sleep(policy.backoff[0]).await;

    let remaining = RetryPolicy {
        max_attempts: policy.max_attempts - 1,
        backoff: policy.backoff[1..].to_vec(),
        retryable: policy.retryable,
    };
    retry(&remaining, || provider.translate_numbered_batch(prompt, target_language, context)).await
}

/// Select the backoff schedule for a transient failure kind (spec §4.4).
fn policy_for(kind: Option<TransientKind>) -> RetryPolicy {
    match kind {
        Some(TransientKind::RateLimited) => RetryPolicy::translation_rate_limited(),
        _ => RetryPolicy::translation_server_error(),
    }
}

//! Stage sequencing, retry/fallback wiring, and partial-failure policy
//! (spec §4.1).
//!
//! The orchestrator owns no mutable state beyond what it threads through
//! a single `Job`; everything it needs from a stage is returned as a
//! [`crate::stages::StageOutcome`], and the happens-before ordering
//! between stages is enforced by simple sequential `.await`s rather than
//! a generic scheduler.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::job::{Artifacts, Job, StageName, StageRecord, StageStatus};
use crate::metrics::JobMetrics;
use crate::providers::media::MediaPrimitive;
use crate::providers::translation::{ContentContext, TranslationProvider};
use crate::providers::transcription::TranscriptionProvider;
use crate::providers::tts::TtsProvider;
use crate::stages::{self, StageOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: uuid::Uuid,
    pub status: JobStatus,
    pub stages: Vec<StageRecord>,
    pub artifacts: Artifacts,
    pub metrics: JobMetrics,
}

/// The set of external collaborators a job run needs (spec §9 design
/// note: the orchestrator depends only on these traits).
pub struct Providers<'a> {
    pub media: &'a dyn MediaPrimitive,
    pub transcription_primary: &'a dyn TranscriptionProvider,
    pub transcription_fallback: Option<&'a dyn TranscriptionProvider>,
    pub translation_primary: &'a dyn TranslationProvider,
    pub translation_fallback: &'a dyn TranslationProvider,
    pub tts_primary: &'a dyn TtsProvider,
    pub tts_fallback: &'a dyn TtsProvider,
}

/// Run every stage of a job in order, stopping early only on a fatal
/// stage outcome, and assembling the final job record (spec §6).
pub async fn run(
    job: &mut Job,
    providers: &Providers<'_>,
    config: &AppConfig,
    content_context: ContentContext,
) -> JobResult {
    let mut stages_record = Vec::new();
    let mut fatal = false;

    macro_rules! run_stage {
        ($name:expr, $fut:expr, $fatal_on_failure:expr) => {{
            job.set_stage_status($name, StageStatus::Running);
            let stage_start = Instant::now();
            let outcome: StageOutcome = $fut;
            job.set_stage_status($name, outcome.status);
            if outcome.status == StageStatus::Failed {
                warn!(job_id = %job.job_id, stage = $name.as_str(), error = ?outcome.error, "stage failed");
            }
            stages_record.push(StageRecord {
                name: $name,
                status: outcome.status,
                duration_ms: stage_start.elapsed().as_millis() as u64,
                error: outcome.error.clone(),
            });
            if outcome.status == StageStatus::Failed && $fatal_on_failure {
                fatal = true;
            }
        }};
    }

    run_stage!(
        StageName::Preprocess,
        stages::preprocess::run(job, providers.media, config).await,
        true
    );

    if !fatal {
        run_stage!(
            StageName::Transcribe,
            stages::transcribe::run(job, providers.transcription_primary, providers.transcription_fallback).await,
            true
        );
    }

    if !fatal {
        run_stage!(
            StageName::Diarize,
            stages::diarize::run(job, providers.media).await,
            false
        );
    }

    if !fatal {
        run_stage!(
            StageName::Translate,
            stages::translate::run(
                job,
                providers.translation_primary,
                providers.translation_fallback,
                content_context
            )
            .await,
            true
        );
    }

    if !fatal {
        run_stage!(
            StageName::Synthesize,
            stages::synthesize::run(
                job,
                providers.tts_primary,
                providers.tts_fallback,
                config.concurrency
            )
            .await,
            false
        );
    }

    if !fatal {
        run_stage!(
            StageName::Assemble,
            stages::assemble::run(job, providers.media).await,
            true
        );
    }

    let mut final_loudness = None;
    if !fatal {
        let quick = job.options.quick_mode;
        let mix_outcome = stages::mix::run(job, providers.media, config, quick).await;
        if let Some(mixed) = &job.artifacts.mixed_audio {
            final_loudness = providers.media.analyze_loudness(mixed).await.ok();
        }
        job.set_stage_status(StageName::Mix, mix_outcome.status);
        if mix_outcome.status == StageStatus::Failed {
            fatal = true;
            warn!(job_id = %job.job_id, error = ?mix_outcome.error, "mix stage failed");
        }
        stages_record.push(StageRecord {
            name: StageName::Mix,
            status: mix_outcome.status,
            duration_ms: mix_outcome.elapsed.as_millis() as u64,
            error: mix_outcome.error,
        });
    }

    // A fatal stage skips every `run_stage!` call after it, so nothing
    // pushes a record for the stages never attempted. Fill those in as
    // `Pending` so `stages[]` always reports all seven stages (spec §6),
    // even though `job.stage_status` already holds `Pending` for them.
    for name in StageName::ALL {
        if !stages_record.iter().any(|r| r.name == name) {
            stages_record.push(StageRecord {
                name,
                status: StageStatus::Pending,
                duration_ms: 0,
                error: None,
            });
        }
    }

    let metrics = JobMetrics::collect(job, final_loudness);
    let status = if fatal || !stages_record.iter().all(|s| s.status.is_terminal_ok()) {
        JobStatus::Failed
    } else {
        JobStatus::Succeeded
    };

    info!(job_id = %job.job_id, ?status, "job complete");

    JobResult {
        job_id: job.job_id,
        status,
        stages: stages_record,
        artifacts: job.artifacts.clone(),
        metrics,
    }
}

//! CLI entry point: dub a single source media file into a target
//! language and print the resulting job record as JSON (spec §6).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use dubforge::config::{AppConfig, JobOptions};
use dubforge::job::Job;
use dubforge::orchestrator::{self, JobStatus, Providers};
use dubforge::providers::media::NativeMediaPrimitive;
use dubforge::providers::transcription::{CloudTranscriptionProvider, LocalWhisperProvider};
use dubforge::providers::translation::{
    ContentContext, GenerativeTranslationProvider, GrammarTranslationProvider,
};
use dubforge::providers::tts::{FreeTtsProvider, PremiumTtsProvider};

#[derive(Parser, Debug)]
#[command(name = "dubforge", about = "Automated video/audio dubbing pipeline")]
struct Args {
    /// Path to the source video or audio file.
    source_path: PathBuf,

    /// Target language code (e.g. "es", "fr", "ja").
    target_language: String,

    #[arg(long, help = "Source language code, auto-detected if omitted")]
    source_language: Option<String>,

    #[arg(long, default_value = "movie", help = "Content context hint for translation prompts: movie, documentary, general")]
    context: String,

    #[arg(long, help = "Directory to write the final mixed track to")]
    output: Option<PathBuf>,

    #[arg(long, help = "Use the quick-mix variant with fewer analyses")]
    quick: bool,

    #[arg(long, help = "Disable noise reduction in preprocessing")]
    no_denoise: bool,

    #[arg(long, help = "Disable high-pass filtering in preprocessing")]
    no_highpass: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dubforge::init_tracing();
    let args = Args::parse();
    match try_main(args).await {
        Ok(code) => code,
        Err(err) => {
            error!("dubforge failed: {err:?}");
            ExitCode::FAILURE
        }
    }
}

/// Aggregates every top-level fallible step (job setup, the final JSON
/// write, the optional output copy) into one `anyhow::Result`, the way
/// the teacher's `initialize_systems()` aggregates its own startup
/// errors in `lib.rs`. Stage-level errors stay `DubError`/`JobResult`
/// and never unwind through here.
async fn try_main(args: Args) -> anyhow::Result<ExitCode> {
    let config = AppConfig::from_env();

    let content_context = match args.context.as_str() {
        "documentary" => ContentContext::Documentary,
        "general" => ContentContext::General,
        _ => ContentContext::MovieDialogue,
    };

    let mut options = JobOptions::default();
    options.quick_mode = args.quick;
    options.apply_noise_reduction = !args.no_denoise;
    options.apply_highpass = !args.no_highpass;

    let mut job = Job::new(
        args.source_path,
        args.target_language,
        args.source_language,
        options,
        &config.scratch_root,
    )
    .context("failed to create job")?;

    let media = NativeMediaPrimitive::new("ffmpeg", config.subprocess_timeout);
    let transcription_primary = LocalWhisperProvider {
        model_path: PathBuf::from("models/ggml-base.bin"),
    };
    let transcription_fallback = config.cloud_transcription_api_key.as_ref().map(|key| {
        CloudTranscriptionProvider {
            api_key: key.clone(),
            client: reqwest::Client::new(),
        }
    });
    let translation_primary = GrammarTranslationProvider {
        client: reqwest::Client::new(),
        endpoint: config.translation_provider_a_endpoint.clone(),
    };
    let translation_fallback = GenerativeTranslationProvider {
        api_key: config.translation_provider_b_api_key.clone().unwrap_or_default(),
        client: reqwest::Client::new(),
        endpoint: config.translation_provider_b_endpoint.clone(),
    };
    let tts_primary = PremiumTtsProvider {
        api_key: config.premium_tts_api_key.clone().unwrap_or_default(),
        client: reqwest::Client::new(),
    };
    let tts_fallback = FreeTtsProvider { client: reqwest::Client::new() };

    let providers = Providers {
        media: &media,
        transcription_primary: &transcription_primary,
        transcription_fallback: transcription_fallback
            .as_ref()
            .map(|p| p as &dyn dubforge::providers::TranscriptionProvider),
        translation_primary: &translation_primary,
        translation_fallback: &translation_fallback,
        tts_primary: &tts_primary,
        tts_fallback: &tts_fallback,
    };

    let result = orchestrator::run(&mut job, &providers, &config, content_context).await;

    let json = serde_json::to_string_pretty(&result).context("failed to serialize job record")?;
    println!("{json}");

    if let (Some(final_output), Some(output_dir)) = (&result.artifacts.final_output, &args.output) {
        std::fs::create_dir_all(output_dir).context("failed to create output directory")?;
        if let Some(file_name) = final_output.file_name() {
            let dest = output_dir.join(file_name);
            std::fs::copy(final_output, &dest)
                .with_context(|| format!("failed to copy final output to {}", dest.display()))?;
            info!("wrote final output to {}", dest.display());
        }
    }

    Ok(match result.status {
        JobStatus::Succeeded => ExitCode::SUCCESS,
        JobStatus::Failed => ExitCode::FAILURE,
    })
}

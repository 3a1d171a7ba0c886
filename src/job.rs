//! Job context: the single shared state threaded through every stage.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JobOptions;
use crate::segment::{Segment, VoiceAssignment};

/// Stage identifiers, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Preprocess,
    Transcribe,
    Diarize,
    Translate,
    Synthesize,
    Assemble,
    Mix,
}

impl StageName {
    pub const ALL: [StageName; 7] = [
        StageName::Preprocess,
        StageName::Transcribe,
        StageName::Diarize,
        StageName::Translate,
        StageName::Synthesize,
        StageName::Assemble,
        StageName::Mix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Preprocess => "preprocess",
            StageName::Transcribe => "transcribe",
            StageName::Diarize => "diarize",
            StageName::Translate => "translate",
            StageName::Synthesize => "synthesize",
            StageName::Assemble => "assemble",
            StageName::Mix => "mix",
        }
    }
}

/// Per-stage lifecycle state, spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Degraded,
    Failed,
}

impl StageStatus {
    pub fn is_terminal_ok(&self) -> bool {
        matches!(self, StageStatus::Succeeded | StageStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: StageName,
    pub status: StageStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Scratch-directory artifact paths produced across stages (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifacts {
    pub preprocessed_audio: Option<PathBuf>,
    pub background_audio: Option<PathBuf>,
    pub tts_dir: Option<PathBuf>,
    pub assembled_audio: Option<PathBuf>,
    pub mixed_audio: Option<PathBuf>,
    pub final_output: Option<PathBuf>,
}

/// Job-scoped cooperative cancellation signal (spec §5). Cloning shares the
/// same underlying flag; cancelling any clone cancels the job.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Job-scoped scratch directory. Exclusively owned by its job; released
/// when the final artifact has been persisted or the job is abandoned
/// (spec §3).
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    released: AtomicBool,
}

impl ScratchDir {
    pub fn create(root: &Path, job_id: Uuid) -> std::io::Result<Self> {
        let path = root.join(job_id.to_string());
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            released: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subdir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.path.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Remove the scratch directory from disk. Idempotent.
    pub fn release(&self) -> std::io::Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.path.exists() {
            std::fs::remove_dir_all(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.released.load(Ordering::SeqCst) {
            let _ = self.release();
        }
    }
}

/// The shared state threaded through every stage of a single dubbing job.
pub struct Job {
    pub job_id: Uuid,
    pub source_path: PathBuf,
    pub target_language: String,
    pub source_language: Option<String>,
    pub options: JobOptions,
    pub created_at: DateTime<Utc>,
    pub scratch: ScratchDir,
    pub cancellation: CancellationToken,

    pub stage_status: std::collections::HashMap<StageName, StageStatus>,
    pub segments: Vec<Segment>,
    pub artifacts: Artifacts,
    pub voice_assignment: VoiceAssignment,
    /// Source audio total duration in seconds, known after S1.
    pub source_duration: Option<f64>,
}

impl Job {
    pub fn new(
        source_path: PathBuf,
        target_language: impl Into<String>,
        source_language: Option<String>,
        options: JobOptions,
        scratch_root: &Path,
    ) -> std::io::Result<Self> {
        let job_id = Uuid::new_v4();
        let scratch = ScratchDir::create(scratch_root, job_id)?;
        let mut stage_status = std::collections::HashMap::new();
        for stage in StageName::ALL {
            stage_status.insert(stage, StageStatus::Pending);
        }
        Ok(Self {
            job_id,
            source_path,
            target_language: target_language.into(),
            source_language,
            options,
            created_at: Utc::now(),
            scratch,
            cancellation: CancellationToken::new(),
            stage_status,
            segments: Vec::new(),
            artifacts: Artifacts::default(),
            voice_assignment: VoiceAssignment::new(),
            source_duration: None,
        })
    }

    pub fn set_stage_status(&mut self, stage: StageName, status: StageStatus) {
        self.stage_status.insert(stage, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_makes_a_directory_and_release_removes_it() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path(), Uuid::new_v4()).unwrap();
        assert!(scratch.path().exists());
        scratch.release().unwrap();
        assert!(!scratch.path().exists());
    }

    #[test]
    fn release_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path(), Uuid::new_v4()).unwrap();
        scratch.release().unwrap();
        scratch.release().unwrap();
    }

    #[test]
    fn drop_releases_an_unreleased_scratch_dir() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(root.path(), Uuid::new_v4()).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn subdir_is_created_under_the_scratch_root() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path(), Uuid::new_v4()).unwrap();
        let sub = scratch.subdir("tts").unwrap();
        assert!(sub.exists());
        assert_eq!(sub, scratch.path().join("tts"));
    }
}

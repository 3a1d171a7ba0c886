//! Segment data model
//!
//! The core unit of work flowing through every pipeline stage. A `Segment`
//! is immutable once a stage produces it; downstream stages construct a new
//! `Segment` rather than mutating one in place.

use serde::{Deserialize, Serialize};

/// Tolerance (seconds) within which adjacent segments may overlap without
/// being treated as an ordering violation (spec: 50ms, to avoid silent
/// re-ordering bugs from upstream transcription timestamps).
pub const OVERLAP_TOLERANCE_SECONDS: f64 = 0.05;

/// Sort segments by `start` and enforce the non-overlap invariant: any
/// overlap at or below [`OVERLAP_TOLERANCE_SECONDS`] is resolved by
/// truncating the earlier segment's end; anything larger is a fatal
/// ordering violation.
pub fn enforce_ordering(segments: &mut [Segment]) -> Result<(), crate::error::DubError> {
    segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    for i in 0..segments.len().saturating_sub(1) {
        let next_start = segments[i + 1].start;
        let overlap = segments[i].end - next_start;
        if overlap > 0.0 {
            if overlap <= OVERLAP_TOLERANCE_SECONDS {
                segments[i].end = next_start;
            } else {
                return Err(crate::error::DubError::InvariantViolation(format!(
                    "segment {} overlaps segment {} by {:.3}s",
                    segments[i].id,
                    segments[i + 1].id,
                    overlap
                )));
            }
        }
    }
    Ok(())
}

/// Speaker gender as classified by diarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Unknown
    }
}

/// Emotion classification driving TTS prosody adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Surprised,
    Disgusted,
    Calm,
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Neutral
    }
}

/// Sync quality classification assigned after S5 rate-alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncQuality {
    Good,
    Fair,
    Poor,
}

impl SyncQuality {
    /// Classify sync quality from the residual (seconds) between measured
    /// and target clip duration, per spec §4.6 step 4.
    pub fn from_residual(residual_seconds: f64) -> Self {
        let residual = residual_seconds.abs();
        if residual <= 0.5 {
            SyncQuality::Good
        } else if residual <= 1.0 {
            SyncQuality::Fair
        } else {
            SyncQuality::Poor
        }
    }
}

/// A single transcribed word with timing, produced when the transcription
/// provider supports word-level timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub probability: Option<f32>,
}

/// A contiguous span of speech, transformed into a new `Segment` at each
/// downstream stage. See spec §3 for the field-by-field invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: u64,
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Text prior to S4 translation; `None` until S4 has run.
    pub original_text: Option<String>,
    pub words: Option<Vec<Word>>,
    pub speaker_id: u32,
    pub gender: Gender,
    pub confidence: f32,
    pub emotion: Emotion,
    /// Path to the TTS-rendered clip for this segment, set in S5.
    pub audio_path: Option<std::path::PathBuf>,
    /// Set when S5 exhausted retries for this segment; S6 then inserts
    /// silence of `duration()` in its place instead of failing the stage.
    pub failed: bool,
    pub sync_quality: Option<SyncQuality>,
}

impl Segment {
    pub fn new(id: u64, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            id,
            start: round3(start),
            end: round3(end),
            text: text.into().trim().to_string(),
            original_text: None,
            words: None,
            speaker_id: 0,
            gender: Gender::Unknown,
            confidence: 0.0,
            emotion: Emotion::Neutral,
            audio_path: None,
            failed: false,
            sync_quality: None,
        }
    }

    pub fn duration(&self) -> f64 {
        round3(self.end - self.start)
    }

    pub fn is_empty_text(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Round to 3 decimal places, the precision boundary spec §3/§4.7 mandate
/// for all segment timestamps and durations.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Stable per-job mapping from `(speaker_id, language)` to a catalog voice,
/// chosen at first use and cached for the job's lifetime (spec §3, §4.5).
#[derive(Debug, Clone, Default)]
pub struct VoiceAssignment {
    assignments: std::collections::HashMap<(u32, String), String>,
    used_voices: std::collections::HashSet<String>,
}

impl VoiceAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, speaker_id: u32, language: &str) -> Option<&str> {
        self.assignments
            .get(&(speaker_id, language.to_string()))
            .map(|s| s.as_str())
    }

    pub fn insert(&mut self, speaker_id: u32, language: &str, voice_id: impl Into<String>) {
        let voice_id = voice_id.into();
        self.used_voices.insert(voice_id.clone());
        self.assignments
            .insert((speaker_id, language.to_string()), voice_id);
    }

    pub fn is_used(&self, voice_id: &str) -> bool {
        self.used_voices.contains(voice_id)
    }
}

/// Portable "Segment JSON" exchanged between stages, per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDocument {
    pub language: String,
    pub full_text: String,
    pub total_segments: usize,
    pub total_duration: f64,
    pub segments: Vec<Segment>,
}

impl SegmentDocument {
    pub fn from_segments(language: impl Into<String>, segments: Vec<Segment>) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let total_duration = segments.last().map(|s| s.end).unwrap_or(0.0);
        Self {
            language: language.into(),
            full_text,
            total_segments: segments.len(),
            total_duration,
            segments,
        }
    }
}

/// `speaker_mode` option, spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerMode {
    Single,
    Alternating,
    Multi,
    Smart,
}

/// Speaker config JSON, consumed when `mode = smart` to feed S3 results
/// into S5 (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerConfig {
    pub mode: SpeakerMode,
    pub default_gender: Gender,
    pub speakers: Vec<SpeakerDescriptor>,
    #[serde(default)]
    pub segment_assignments: Vec<SegmentAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerDescriptor {
    pub id: u32,
    pub name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentAssignment {
    pub segment_id: u64,
    pub speaker_id: u32,
    pub gender: Gender,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_rounds_to_three_decimals() {
        let seg = Segment::new(0, 0.1234, 2.6789, "hello");
        assert_eq!(seg.start, 0.123);
        assert_eq!(seg.end, 2.679);
        assert_eq!(seg.duration(), 2.556);
    }

    #[test]
    fn sync_quality_thresholds() {
        assert_eq!(SyncQuality::from_residual(0.2), SyncQuality::Good);
        assert_eq!(SyncQuality::from_residual(0.5), SyncQuality::Good);
        assert_eq!(SyncQuality::from_residual(0.9), SyncQuality::Fair);
        assert_eq!(SyncQuality::from_residual(1.5), SyncQuality::Poor);
    }

    #[test]
    fn voice_assignment_is_stable() {
        let mut va = VoiceAssignment::new();
        va.insert(2, "fr", "fr-FR-DeniseNeural");
        assert_eq!(va.get(2, "fr"), Some("fr-FR-DeniseNeural"));
        assert_eq!(va.get(2, "es"), None);
        assert!(va.is_used("fr-FR-DeniseNeural"));
    }

    #[test]
    fn enforce_ordering_sorts_and_truncates_small_overlap() {
        let mut segments = vec![
            Segment::new(0, 1.0, 2.04, "b"),
            Segment::new(1, 0.0, 1.02, "a"),
        ];
        enforce_ordering(&mut segments).unwrap();
        assert_eq!(segments[0].id, 1);
        assert_eq!(segments[0].end, 1.0);
        assert_eq!(segments[1].id, 0);
    }

    #[test]
    fn enforce_ordering_rejects_large_overlap() {
        let mut segments = vec![Segment::new(0, 0.0, 2.0, "a"), Segment::new(1, 1.0, 3.0, "b")];
        let err = enforce_ordering(&mut segments).unwrap_err();
        assert!(matches!(err, crate::error::DubError::InvariantViolation(_)));
    }

    proptest::proptest! {
        /// round3 never moves a value by more than half a millisecond and
        /// is idempotent once applied.
        #[test]
        fn round3_is_idempotent_and_close_to_input(value in -100_000.0f64..100_000.0) {
            let rounded = round3(value);
            proptest::prop_assert!((rounded - value).abs() <= 0.0005 + f64::EPSILON);
            proptest::prop_assert_eq!(round3(rounded), rounded);
        }
    }
}

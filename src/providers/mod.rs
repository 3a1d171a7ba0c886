//! External collaborator interfaces (spec §1, §9).
//!
//! The orchestrator and every stage depend only on these traits, never on
//! a concrete provider. This keeps the neural TTS services, translation
//! services, and the speech-to-text engine swappable without touching
//! pipeline logic.

pub mod media;
pub mod transcription;
pub mod translation;
pub mod tts;

pub use media::MediaPrimitive;
pub use transcription::TranscriptionProvider;
pub use translation::TranslationProvider;
pub use tts::TtsProvider;

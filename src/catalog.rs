//! Static voice/language catalog.
//!
//! Out of scope per spec §1 ("language/voice catalog data (supplied as
//! tables)") in the sense that a production deployment would load a much
//! larger table from data; this module ships a representative static
//! table so voice assignment (§4.5) is runnable and testable standalone.

use crate::segment::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogVoice {
    pub voice_id: &'static str,
    pub gender: Gender,
    pub style: &'static str,
    pub age: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct LanguageVoices {
    pub language: &'static str,
    pub voices: &'static [CatalogVoice],
}

macro_rules! voice {
    ($id:expr, $gender:expr, $style:expr, $age:expr) => {
        CatalogVoice {
            voice_id: $id,
            gender: $gender,
            style: $style,
            age: $age,
        }
    };
}

const EN_VOICES: &[CatalogVoice] = &[
    voice!("en-US-GuyNeural", Gender::Male, "general", "adult"),
    voice!("en-US-DavisNeural", Gender::Male, "general", "adult"),
    voice!("en-GB-RyanNeural", Gender::Male, "general", "adult"),
    voice!("en-US-JennyNeural", Gender::Female, "general", "adult"),
    voice!("en-US-AriaNeural", Gender::Female, "expressive", "young_adult"),
    voice!("en-GB-SoniaNeural", Gender::Female, "general", "adult"),
];

const ES_VOICES: &[CatalogVoice] = &[
    voice!("es-MX-JorgeNeural", Gender::Male, "general", "adult"),
    voice!("es-ES-AlvaroNeural", Gender::Male, "general", "adult"),
    voice!("es-MX-DaliaNeural", Gender::Female, "general", "adult"),
    voice!("es-ES-ElviraNeural", Gender::Female, "general", "adult"),
];

const FR_VOICES: &[CatalogVoice] = &[
    voice!("fr-FR-HenriNeural", Gender::Male, "general", "adult"),
    voice!("fr-CA-AntoineNeural", Gender::Male, "general", "adult"),
    voice!("fr-FR-DeniseNeural", Gender::Female, "general", "adult"),
    voice!("fr-CA-SylvieNeural", Gender::Female, "general", "adult"),
];

const DE_VOICES: &[CatalogVoice] = &[
    voice!("de-DE-ConradNeural", Gender::Male, "general", "adult"),
    voice!("de-DE-KatjaNeural", Gender::Female, "general", "adult"),
];

const PT_VOICES: &[CatalogVoice] = &[
    voice!("pt-BR-AntonioNeural", Gender::Male, "general", "adult"),
    voice!("pt-BR-FranciscaNeural", Gender::Female, "general", "adult"),
];

const JA_VOICES: &[CatalogVoice] = &[
    voice!("ja-JP-KeitaNeural", Gender::Male, "general", "adult"),
    voice!("ja-JP-NanamiNeural", Gender::Female, "general", "adult"),
];

/// All language entries. Regional variants (e.g. `es-MX`) fall back to
/// their base code (`es`) via [`voices_for_language`].
const CATALOG: &[LanguageVoices] = &[
    LanguageVoices { language: "en", voices: EN_VOICES },
    LanguageVoices { language: "es", voices: ES_VOICES },
    LanguageVoices { language: "fr", voices: FR_VOICES },
    LanguageVoices { language: "de", voices: DE_VOICES },
    LanguageVoices { language: "pt", voices: PT_VOICES },
    LanguageVoices { language: "ja", voices: JA_VOICES },
];

/// Resolve the voice list for a language code, accepting both base codes
/// (`es`) and regional variants (`es-MX`) per spec §6.
pub fn voices_for_language(language: &str) -> Option<&'static [CatalogVoice]> {
    let base = language.split('-').next().unwrap_or(language).to_ascii_lowercase();
    CATALOG
        .iter()
        .find(|entry| entry.language == base)
        .map(|entry| entry.voices)
}

pub fn voices_for_gender(language: &str, gender: Gender) -> Vec<CatalogVoice> {
    voices_for_language(language)
        .unwrap_or(&[])
        .iter()
        .filter(|v| v.gender == gender)
        .copied()
        .collect()
}

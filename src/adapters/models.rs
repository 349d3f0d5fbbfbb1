//! Catalog of pretrained models the pipeline has been run with.

use serde::Serialize;

/// A pretrained TTS model and the language it speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub id: &'static str,
    pub language: &'static str,
}

pub const KNOWN_MODELS: &[ModelSpec] = &[
    ModelSpec {
        id: "facebook/fastspeech2-en-200_speaker-cv4",
        language: "en",
    },
    ModelSpec {
        id: "facebook/fastspeech2-en-ljspeech",
        language: "en",
    },
    ModelSpec {
        id: "facebook/tts_transformer-en-ljspeech",
        language: "en",
    },
    ModelSpec {
        id: "facebook/tts_transformer-en-200_speaker-cv4",
        language: "en",
    },
    ModelSpec {
        id: "facebook/tts_transformer-tr-cv7",
        language: "tr",
    },
    ModelSpec {
        id: "facebook/tts_transformer-ar-cv7",
        language: "ar",
    },
    ModelSpec {
        id: "facebook/tts_transformer-es-css10",
        language: "es",
    },
    ModelSpec {
        id: "facebook/tts_transformer-ru-cv7_css10",
        language: "ru",
    },
    ModelSpec {
        id: "facebook/tts_transformer-fr-cv7_css10",
        language: "fr",
    },
    ModelSpec {
        id: "facebook/tts_transformer-zh-cv7_css10",
        language: "zh",
    },
    ModelSpec {
        id: "facebook/tts_transformer-vi-cv7",
        language: "vi",
    },
    ModelSpec {
        id: "espnet/english_male_ryanspeech_fastspeech2",
        language: "en",
    },
];

/// Model used when nothing is configured
pub const DEFAULT_MODEL: &str = "facebook/fastspeech2-en-200_speaker-cv4";

/// Find a catalog entry by id
pub fn lookup(id: &str) -> Option<&'static ModelSpec> {
    KNOWN_MODELS.iter().find(|m| m.id == id)
}

/// Language of a known model
pub fn language_for(id: &str) -> Option<&'static str> {
    lookup(id).map(|m| m.language)
}

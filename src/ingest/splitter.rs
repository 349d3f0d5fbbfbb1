//! Sentence splitting for ingestion.
//!
//! Sentences are approximated by splitting on `". "`. Each piece has its
//! line breaks folded into spaces and is split on `". "` a second time, then
//! trimmed. Empty fragments are kept.

use std::collections::VecDeque;

use super::normalizer::SpellingNormalizer;
use crate::domain::NewRecord;

/// Sentence boundary marker
pub const SENTENCE_BREAK: &str = ". ";

/// Normalizes documents and splits them into sentence fragments
#[derive(Debug, Clone, Default)]
pub struct TextSplitter {
    normalizer: SpellingNormalizer,
}

impl TextSplitter {
    pub fn new(normalizer: SpellingNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &SpellingNormalizer {
        &self.normalizer
    }

    /// Split one document into pending records
    pub fn split(&self, document: &str) -> Fragments {
        let text = self.normalizer.normalize(document).trim().to_string();
        Fragments {
            text,
            cursor: Some(0),
            queued: VecDeque::new(),
        }
    }
}

/// Lazy sequence of fragments for one document
#[derive(Debug)]
pub struct Fragments {
    text: String,
    cursor: Option<usize>,
    queued: VecDeque<String>,
}

impl Iterator for Fragments {
    type Item = NewRecord;

    fn next(&mut self) -> Option<NewRecord> {
        loop {
            if let Some(text) = self.queued.pop_front() {
                return Some(NewRecord::pending(text));
            }

            let start = self.cursor?;
            let rest = &self.text[start..];
            let piece = match rest.find(SENTENCE_BREAK) {
                Some(at) => {
                    self.cursor = Some(start + at + SENTENCE_BREAK.len());
                    &rest[..at]
                }
                None => {
                    self.cursor = None;
                    rest
                }
            };

            let joined = piece.lines().collect::<Vec<_>>().join(" ");
            self.queued
                .extend(joined.split(SENTENCE_BREAK).map(|s| s.trim().to_string()));
        }
    }
}

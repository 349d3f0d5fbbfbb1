//! British to American spelling normalization.
//!
//! The table is a flat JSON object (`{"colour": "color", ...}`) loaded once
//! at startup.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Word-level spelling mapper
#[derive(Debug, Clone, Default)]
pub struct SpellingNormalizer {
    mapping: HashMap<String, String>,
}

impl SpellingNormalizer {
    /// Load the mapping table. A missing or malformed file is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read normalization table: {}", path.display()))?;

        let mapping: HashMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse normalization table: {}", path.display()))?;

        tracing::info!(entries = mapping.len(), "Loaded normalization table");
        Ok(Self { mapping })
    }

    pub fn from_map(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Map every whitespace-separated word through the table.
    ///
    /// Unknown words pass through unchanged; runs of whitespace (including
    /// line breaks) collapse to a single space.
    pub fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for word in text.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(self.mapping.get(word).map(String::as_str).unwrap_or(word));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn normalizer() -> SpellingNormalizer {
        SpellingNormalizer::from_map(
            [("colour", "color"), ("flavour", "flavor")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_maps_known_words() {
        assert_eq!(normalizer().normalize("colour and flavour"), "color and flavor");
    }

    #[test]
    fn test_unknown_words_and_whitespace() {
        let n = normalizer();
        assert_eq!(n.normalize("  the\ncolour\t of  tea "), "the color of tea");
        assert_eq!(n.normalize(""), "");
        // Lookup is exact; punctuation stays attached to the word
        assert_eq!(n.normalize("colour."), "colour.");
    }

    #[test]
    fn test_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("english.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"normalise": "normalize"}}"#).unwrap();

        let n = SpellingNormalizer::from_file(&path).unwrap();
        assert_eq!(n.len(), 1);
        assert_eq!(n.normalize("normalise it"), "normalize it");
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let err = SpellingNormalizer::from_file(&temp.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("normalization table"));
    }
}

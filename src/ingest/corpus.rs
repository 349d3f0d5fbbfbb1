//! Corpus loading.
//!
//! The corpus is newline-delimited JSON, one document per line with a
//! `text` field (the layout HuggingFace dataset exports use). Other fields
//! are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One raw corpus document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Read every document from a JSONL file, skipping blank lines
pub fn read_jsonl(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open corpus: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut documents = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read corpus: {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        let document: Document = serde_json::from_str(&line).with_context(|| {
            format!("Failed to parse document at {}:{}", path.display(), index + 1)
        })?;
        documents.push(document);
    }

    tracing::info!(documents = documents.len(), path = %path.display(), "Corpus loaded");
    Ok(documents)
}

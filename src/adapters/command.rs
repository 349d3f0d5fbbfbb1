//! External-program TTS backend.
//!
//! Spawns a TTS program per sentence (piper, an espnet/fairseq wrapper
//! script, ...). The sentence is written to the program's stdin and the
//! placeholders `{output}`, `{model}` and `{text}` in the arguments are
//! substituted. The program must leave a WAV file at `{output}`.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use super::{models, wav, Synthesis, SynthesisError, Synthesizer};

/// How to invoke the external program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to run
    pub program: String,

    /// Arguments, with placeholders
    #[serde(default)]
    pub args: Vec<String>,

    /// Model identifier passed as `{model}` and recorded as provenance
    pub model: String,

    /// Language override; defaults to the catalog entry for `model`, then "en"
    #[serde(default)]
    pub language: Option<String>,
}

/// Synthesizer that shells out to a TTS program
pub struct CommandSynthesizer {
    config: CommandConfig,
    language: String,
}

impl CommandSynthesizer {
    pub fn new(config: CommandConfig) -> Self {
        let language = config
            .language
            .clone()
            .or_else(|| models::language_for(&config.model).map(str::to_string))
            .unwrap_or_else(|| "en".to_string());

        Self { config, language }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    fn render_args(&self, output: &str, text: &str) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{output}", output)
                    .replace("{model}", &self.config.model)
                    .replace("{text}", text)
            })
            .collect()
    }
}

impl Synthesizer for CommandSynthesizer {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn synthesize(&mut self, text: &str) -> Result<Synthesis, SynthesisError> {
        let scratch = tempfile::tempdir()?;
        let output_path = scratch.path().join("out.wav");
        let args = self.render_args(&output_path.to_string_lossy(), text);

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SynthesisError::Backend(format!("Failed to spawn {}: {}", self.config.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that takes text from {text} may close stdin early
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            // Drop stdin to signal EOF
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SynthesisError::Backend(format!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }

        if !output_path.exists() {
            return Err(SynthesisError::EmptyOutput);
        }

        let synthesis = wav::read_mono(&output_path)?;
        if synthesis.samples.is_empty() {
            return Err(SynthesisError::EmptyOutput);
        }

        tracing::debug!(
            model = %self.config.model,
            seconds = synthesis.duration_secs(),
            "Synthesized sentence"
        );
        Ok(synthesis)
    }
}

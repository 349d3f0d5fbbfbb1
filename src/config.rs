//! Configuration for speechbank.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI)
//! 2. Environment variables (SPEECHBANK_HOME, SPEECHBANK_DB,
//!    SPEECHBANK_SAVE_DIR, SPEECHBANK_TAR_DIR)
//! 3. Config file (.speechbank/config.yaml)
//! 4. Defaults (~/.speechbank)
//!
//! Config file discovery:
//! - Searches current directory and parents for .speechbank/config.yaml
//! - `home` is relative to the .speechbank/ directory, every other path is
//!   relative to the project root (the directory containing .speechbank/)

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::models::DEFAULT_MODEL;
use crate::ingest::IngestOptions;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub ingest: Option<IngestOptions>,
    #[serde(default)]
    pub synthesis: Option<SynthesisConfig>,
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .speechbank/)
    pub home: Option<String>,
    pub database: Option<String>,
    pub normalization_table: Option<String>,
    pub save_dir: Option<String>,
    pub tar_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub table: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub audio_ext: Option<String>,
    pub archive_every: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    pub shard_size: Option<usize>,
    pub shuffle: Option<bool>,
    pub delete_files: Option<bool>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state directory
    pub home: PathBuf,
    /// SQLite database holding the work tables
    pub database: PathBuf,
    /// British → American spelling table
    pub normalization_table: PathBuf,
    /// Output directory for synthesized samples
    pub save_dir: PathBuf,
    /// Output directory for tar shards
    pub tar_dir: PathBuf,
    /// Work table (one per source/language)
    pub table: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub ingest: IngestOptions,
    pub synthesis: SynthesisSettings,
    pub archive: ArchiveSettings,
}

#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    /// External TTS program; required for `synthesize`
    pub program: Option<String>,
    pub args: Vec<String>,
    pub model: String,
    pub language: Option<String>,
    pub audio_ext: String,
    pub archive_every: usize,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            model: DEFAULT_MODEL.to_string(),
            language: None,
            audio_ext: "wav".to_string(),
            archive_every: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub shard_size: usize,
    pub shuffle: bool,
    pub delete_files: bool,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            shard_size: 512,
            shuffle: false,
            delete_files: true,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".speechbank").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".speechbank");

    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(file, |key| std::env::var(key).ok(), default_home))
}

/// Merge config file, environment and defaults
fn resolve(
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
    default_home: PathBuf,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path), Some(config)),
        None => (None, None),
    };

    // .speechbank/ and the project root above it
    let speechbank_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = speechbank_dir.parent().unwrap_or(Path::new("."));

    let paths = config
        .as_ref()
        .map(|c| c.paths.clone())
        .unwrap_or_default();

    let home = env("SPEECHBANK_HOME")
        .map(PathBuf::from)
        .or_else(|| paths.home.as_deref().map(|h| resolve_path(speechbank_dir, h)))
        .unwrap_or(default_home);

    let pick = |var: &str, configured: &Option<String>, fallback: &str| -> PathBuf {
        env(var)
            .map(PathBuf::from)
            .or_else(|| configured.as_deref().map(|p| resolve_path(base_dir, p)))
            .unwrap_or_else(|| home.join(fallback))
    };

    let database = pick("SPEECHBANK_DB", &paths.database, paths::DATABASE_FILE);
    let save_dir = pick("SPEECHBANK_SAVE_DIR", &paths.save_dir, paths::SAMPLES_DIR);
    let tar_dir = pick("SPEECHBANK_TAR_DIR", &paths.tar_dir, paths::SHARDS_DIR);
    let normalization_table = paths
        .normalization_table
        .as_deref()
        .map(|p| resolve_path(base_dir, p))
        .unwrap_or_else(|| home.join(paths::NORMALIZATION_FILE));

    let table = config
        .as_ref()
        .and_then(|c| c.store.as_ref())
        .and_then(|s| s.table.clone())
        .unwrap_or_else(|| "en".to_string());

    let ingest = config
        .as_ref()
        .and_then(|c| c.ingest.clone())
        .unwrap_or_default();

    let mut synthesis = SynthesisSettings::default();
    if let Some(s) = config.as_ref().and_then(|c| c.synthesis.as_ref()) {
        synthesis.program = s.program.clone();
        synthesis.args = s.args.clone();
        if let Some(model) = &s.model {
            synthesis.model = model.clone();
        }
        synthesis.language = s.language.clone();
        if let Some(ext) = &s.audio_ext {
            synthesis.audio_ext = ext.clone();
        }
        if let Some(every) = s.archive_every {
            synthesis.archive_every = every;
        }
    }

    let mut archive = ArchiveSettings::default();
    if let Some(a) = config.as_ref().and_then(|c| c.archive.as_ref()) {
        archive.shard_size = a.shard_size.unwrap_or(archive.shard_size);
        archive.shuffle = a.shuffle.unwrap_or(archive.shuffle);
        archive.delete_files = a.delete_files.unwrap_or(archive.delete_files);
    }

    ResolvedConfig {
        home,
        database,
        normalization_table,
        save_dir,
        tar_dir,
        table,
        config_file,
        ingest,
        synthesis,
        archive,
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let home = PathBuf::from("/h/.speechbank");
        let config = resolve(None, no_env, home.clone());

        assert_eq!(config.home, home);
        assert_eq!(config.database, home.join("speechbank.db"));
        assert_eq!(config.save_dir, home.join("samples"));
        assert_eq!(config.tar_dir, home.join("shards"));
        assert_eq!(config.normalization_table, home.join("english.json"));
        assert_eq!(config.table, "en");
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.archive.shard_size, 512);
        assert!(config.archive.delete_files);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SPEECHBANK_HOME", "/env/home"),
            ("SPEECHBANK_DB", "/env/db.sqlite"),
        ]
        .into_iter()
        .collect();
        let env = |key: &str| vars.get(key).map(|v| v.to_string());

        let config = resolve(None, env, PathBuf::from("/unused"));
        assert_eq!(config.home, PathBuf::from("/env/home"));
        assert_eq!(config.database, PathBuf::from("/env/db.sqlite"));
        assert_eq!(config.save_dir, PathBuf::from("/env/home/samples"));
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".speechbank");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  database: /data/wiki.db
  save_dir: /data/samples
store:
  table: wiki_en
ingest:
  chunk_size: 64
synthesis:
  program: piper
  args: ["--model", "{{model}}", "--output_file", "{{output}}"]
  model: facebook/tts_transformer-es-css10
  archive_every: 500
archive:
  shard_size: 256
  delete_files: false
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.paths.database, Some("/data/wiki.db".to_string()));

        let config = resolve(
            Some((config_path.clone(), parsed)),
            no_env,
            PathBuf::from("/unused"),
        );
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(config.database, PathBuf::from("/data/wiki.db"));
        assert_eq!(config.save_dir, PathBuf::from("/data/samples"));
        assert_eq!(config.table, "wiki_en");
        assert_eq!(config.ingest.chunk_size, 64);
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.synthesis.program.as_deref(), Some("piper"));
        assert_eq!(config.synthesis.args[1], "{model}");
        assert_eq!(config.synthesis.model, "facebook/tts_transformer-es-css10");
        assert_eq!(config.synthesis.archive_every, 500);
        assert_eq!(config.archive.shard_size, 256);
        assert!(!config.archive.delete_files);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}

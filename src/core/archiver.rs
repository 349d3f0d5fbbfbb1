//! Tar sharding of completed samples.
//!
//! A sample is every file in the source directory sharing a stem
//! (`5.wav` + `5.json`). Samples are packed into `{tar_dir}/{n}.tar` in
//! groups of `shard_size`; the last shard may be smaller. Each finalized
//! shard is recorded in `{tar_dir}/../sizes.json` before its sources are
//! deleted, so an interrupted run never loses track of a written shard.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Extension that marks a sample's metadata sidecar
pub const METADATA_EXT: &str = "json";

/// Name of the manifest, stored next to the shard directory
pub const MANIFEST_NAME: &str = "sizes.json";

const LOCK_NAME: &str = ".archive.lock";

/// Errors that can occur while archiving
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Shard size must be at least 1")]
    InvalidShardSize,

    #[error("Shard already exists: {0}")]
    ShardExists(PathBuf),

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for an archiver
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Directory of completed samples
    pub source_dir: PathBuf,

    /// Directory receiving `{n}.tar` shards
    pub tar_dir: PathBuf,

    /// Samples per shard
    pub shard_size: usize,

    /// Shuffle samples before sharding
    pub shuffle: bool,

    /// Remove source files once their shard is recorded
    pub delete_files: bool,

    /// First shard index; by default one past the highest recorded index
    pub start_idx: Option<usize>,
}

fn default_shard_size() -> usize {
    512
}

impl ArchiveOptions {
    pub fn new(source_dir: impl Into<PathBuf>, tar_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            tar_dir: tar_dir.into(),
            shard_size: default_shard_size(),
            shuffle: false,
            delete_files: false,
            start_idx: None,
        }
    }
}

/// A shard written by one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub index: usize,
    pub path: PathBuf,
    pub entries: usize,
}

/// Summary of one archiver run
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    pub shards: Vec<ShardInfo>,

    /// Samples packed this run
    pub samples: usize,

    /// Stems skipped because their sidecar or audio was missing
    pub incomplete: usize,
}

/// Shard path to entry count, persisted as `sizes.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub sizes: BTreeMap<String, usize>,
}

impl Manifest {
    /// Load the manifest, or an empty one if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| ArchiveError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the manifest atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        let json = serde_json::to_string_pretty(self).map_err(|source| ArchiveError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Total entries across all shards
    pub fn total_entries(&self) -> usize {
        self.sizes.values().sum()
    }

    /// One past the highest numbered shard recorded for `tar_dir`
    pub fn next_index(&self, tar_dir: &Path) -> usize {
        self.sizes
            .keys()
            .map(Path::new)
            .filter(|p| p.parent() == Some(tar_dir))
            .filter_map(|p| p.file_stem()?.to_str()?.parse::<usize>().ok())
            .max()
            .map_or(0, |max| max + 1)
    }
}

/// One sample: every file sharing a stem
#[derive(Debug, Clone)]
struct Sample {
    stem: String,
    files: Vec<PathBuf>,
}

/// Packs completed samples into size-bounded tar shards
pub struct Archiver {
    options: ArchiveOptions,
}

impl Archiver {
    pub fn new(options: ArchiveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Location of `sizes.json`: the parent of the shard directory
    pub fn manifest_path(&self) -> PathBuf {
        manifest_path_for(&self.options.tar_dir)
    }

    /// Pack everything currently in the source directory.
    ///
    /// Without `delete_files`, samples stay in place and the next run packs
    /// them again.
    #[tracing::instrument(skip_all, fields(source = %self.options.source_dir.display()))]
    pub fn run(&self) -> Result<ArchiveReport, ArchiveError> {
        let opts = &self.options;
        if opts.shard_size == 0 {
            return Err(ArchiveError::InvalidShardSize);
        }

        fs::create_dir_all(&opts.tar_dir)?;
        let lock_path = opts.tar_dir.join(LOCK_NAME);
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.lock_exclusive().map_err(|source| ArchiveError::Lock {
            path: lock_path.clone(),
            source,
        })?;

        let result = self.pack();

        if let Err(e) = lock.unlock() {
            tracing::warn!("Failed to release {}: {}", lock_path.display(), e);
        }
        result
    }

    fn pack(&self) -> Result<ArchiveReport, ArchiveError> {
        let opts = &self.options;
        let manifest_path = self.manifest_path();

        let (mut samples, incomplete) = self.collect_samples()?;
        let mut report = ArchiveReport {
            incomplete,
            ..ArchiveReport::default()
        };

        if samples.is_empty() {
            tracing::debug!("Nothing to archive");
            return Ok(report);
        }

        if opts.shuffle {
            samples.shuffle(&mut rand::thread_rng());
        } else {
            samples.sort_by_key(sample_order);
        }

        let mut manifest = Manifest::load(&manifest_path)?;
        let first = opts
            .start_idx
            .unwrap_or_else(|| manifest.next_index(&opts.tar_dir));

        for (offset, group) in samples.chunks(opts.shard_size).enumerate() {
            let index = first + offset;
            let path = opts.tar_dir.join(format!("{}.tar", index));
            let key = path.to_string_lossy().into_owned();

            // A shard missing from the manifest was cut short before it was
            // recorded; its sources are still here, so it is rebuilt.
            let orphaned = path.exists() && !manifest.sizes.contains_key(&key);
            if orphaned {
                tracing::warn!(shard = %path.display(), "Replacing unrecorded shard");
            }
            write_shard(&path, group, orphaned)?;

            manifest.sizes.insert(key, group.len());
            manifest.save(&manifest_path)?;

            tracing::info!(shard = %path.display(), entries = group.len(), "Shard written");

            if opts.delete_files {
                for file in group.iter().flat_map(|s| &s.files) {
                    if let Err(e) = fs::remove_file(file) {
                        tracing::warn!("Failed to delete {}: {}", file.display(), e);
                    }
                }
            }

            report.samples += group.len();
            report.shards.push(ShardInfo {
                index,
                path,
                entries: group.len(),
            });
        }

        Ok(report)
    }

    /// Group source files by stem; returns complete samples and the number
    /// of incomplete stems.
    fn collect_samples(&self) -> Result<(Vec<Sample>, usize), ArchiveError> {
        let pattern = format!(
            "{}/*",
            glob::Pattern::escape(&self.options.source_dir.to_string_lossy())
        );

        let mut by_stem: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Temp files of in-flight writes
            if name.starts_with('.') || !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            by_stem.entry(stem.to_string()).or_default().push(path.clone());
        }

        let mut samples = Vec::with_capacity(by_stem.len());
        let mut incomplete = 0;
        for (stem, mut files) in by_stem {
            let has_metadata = files.iter().any(|f| has_extension(f, METADATA_EXT));
            if !has_metadata || files.len() < 2 {
                tracing::debug!(stem = %stem, "Skipping incomplete sample");
                incomplete += 1;
                continue;
            }
            files.sort();
            samples.push(Sample { stem, files });
        }

        Ok((samples, incomplete))
    }
}

/// `sizes.json` next to the shard directory
pub fn manifest_path_for(tar_dir: &Path) -> PathBuf {
    match tar_dir.parent() {
        Some(parent) => parent.join(MANIFEST_NAME),
        None => tar_dir.join(MANIFEST_NAME),
    }
}

/// Numeric stems first, ascending, then everything else by name
fn sample_order(sample: &Sample) -> (u8, u64, String) {
    match sample.stem.parse::<u64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, sample.stem.clone()),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Write one shard through a temp file. An existing shard is only replaced
/// when `replace` is set.
fn write_shard(path: &Path, samples: &[Sample], replace: bool) -> Result<(), ArchiveError> {
    if !replace && path.exists() {
        return Err(ArchiveError::ShardExists(path.to_path_buf()));
    }

    let dir = path.parent().unwrap_or(Path::new("."));
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut builder = tar::Builder::new(BufWriter::new(tmp.as_file()));
        for file in samples.iter().flat_map(|s| &s.files) {
            let name = file.file_name().unwrap_or_default();
            let mut source = File::open(file)?;
            builder.append_file(name, &mut source)?;
        }
        let mut writer = builder.into_inner()?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    if replace {
        tmp.persist(path).map_err(|e| e.error)?;
        return Ok(());
    }

    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            ArchiveError::ShardExists(path.to_path_buf())
        } else {
            ArchiveError::Io(e.error)
        }
    })?;
    Ok(())
}

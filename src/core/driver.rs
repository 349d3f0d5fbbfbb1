//! Synthesis driver: the single consumer of the work table.
//!
//! Records move `PENDING -> COMPLETE` only after their audio and sidecar
//! are both in place. Any failure along the way removes partial output and
//! leaves the record pending for the next pass.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use super::archiver::Archiver;
use super::store::WorkStore;
use crate::adapters::{wav, Synthesizer};
use crate::domain::{Provenance, SampleMetadata, WorkRecord};

/// Driver settings
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Where `{id}.wav` and `{id}.json` are written
    pub save_dir: PathBuf,

    /// Audio file extension
    pub audio_ext: String,

    /// Stop after this many successfully processed records
    pub limit: Option<usize>,

    /// Run the archiver every N processed records (0 = only at the end)
    pub archive_every: usize,
}

fn default_audio_ext() -> String {
    "wav".to_string()
}

impl DriverOptions {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            audio_ext: default_audio_ext(),
            limit: None,
            archive_every: 0,
        }
    }

    /// `{save_dir}/{id}.{audio_ext}`
    pub fn audio_path(&self, id: i64) -> PathBuf {
        self.save_dir.join(format!("{}.{}", id, self.audio_ext))
    }

    /// `{save_dir}/{id}.json`
    pub fn metadata_path(&self, id: i64) -> PathBuf {
        self.save_dir.join(format!("{}.json", id))
    }
}

/// Summary of one driver pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub archived_shards: usize,

    /// Ended early because of the stop flag or the limit
    pub interrupted: bool,
}

/// Pulls pending records, synthesizes them and marks them complete
pub struct SynthesisDriver<'a, S> {
    store: &'a WorkStore,
    synthesizer: S,
    options: DriverOptions,
    archiver: Option<Archiver>,
    stop: Arc<AtomicBool>,
}

impl<'a, S: Synthesizer> SynthesisDriver<'a, S> {
    pub fn new(store: &'a WorkStore, synthesizer: S, options: DriverOptions) -> Self {
        Self {
            store,
            synthesizer,
            options,
            archiver: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Archive completed samples inline at checkpoints and at the end
    pub fn with_archiver(mut self, archiver: Archiver) -> Self {
        self.archiver = Some(archiver);
        self
    }

    /// Flag checked between records; setting it ends the run cleanly
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// One full pass over the pending records.
    ///
    /// Store read errors abort the pass; everything else is contained to the
    /// record it happened on.
    #[tracing::instrument(
        skip_all,
        fields(table = %self.store.table(), model = %self.synthesizer.model_id())
    )]
    pub fn run(&mut self) -> Result<DriverReport> {
        fs::create_dir_all(&self.options.save_dir).with_context(|| {
            format!("Failed to create save dir: {}", self.options.save_dir.display())
        })?;

        let store = self.store;
        let mut report = DriverReport::default();

        for record in store.iter_pending() {
            if self.stop.load(Ordering::Relaxed) {
                tracing::info!("Stop requested, ending pass");
                report.interrupted = true;
                break;
            }
            if let Some(limit) = self.options.limit {
                if report.processed >= limit {
                    tracing::info!(limit, "Record limit reached");
                    report.interrupted = true;
                    break;
                }
            }

            let record = record.context("Failed to read pending records")?;
            if record.complete {
                report.skipped += 1;
                continue;
            }

            let started = Instant::now();
            match self.process(&record) {
                Ok(()) => {
                    report.processed += 1;
                    tracing::info!(
                        id = record.id,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Record complete"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(id = record.id, "Record failed, left pending: {:#}", e);
                    continue;
                }
            }

            let every = self.options.archive_every;
            if every > 0 && report.processed % every == 0 {
                report.archived_shards += self.archive();
            }
        }

        report.archived_shards += self.archive();

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "Synthesis pass finished"
        );
        Ok(report)
    }

    /// Synthesize, write and mark one record as a single unit
    fn process(&mut self, record: &WorkRecord) -> Result<()> {
        let audio_path = self.options.audio_path(record.id);
        let metadata_path = self.options.metadata_path(record.id);

        let result = self
            .write_outputs(record, &audio_path, &metadata_path)
            .and_then(|()| {
                self.store
                    .mark_complete(record.id)
                    .with_context(|| format!("Failed to mark record {} complete", record.id))
                    .map(|_| ())
            });

        if result.is_err() {
            remove_if_exists(&audio_path);
            remove_if_exists(&metadata_path);
        }
        result
    }

    fn write_outputs(
        &mut self,
        record: &WorkRecord,
        audio_path: &Path,
        metadata_path: &Path,
    ) -> Result<()> {
        let synthesis = self
            .synthesizer
            .synthesize(&record.text)
            .with_context(|| format!("Synthesis failed for record {}", record.id))?;

        let dir = &self.options.save_dir;

        let mut audio = NamedTempFile::new_in(dir)?;
        wav::write_wav(BufWriter::new(audio.as_file_mut()), &synthesis)
            .with_context(|| format!("Failed to encode audio for record {}", record.id))?;

        let filename = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = SampleMetadata::new(
            filename,
            record.text.clone(),
            Provenance {
                language: self.synthesizer.language().to_string(),
                model: self.synthesizer.model_id().to_string(),
            },
        )
        .with_sample_rate(synthesis.sample_rate);

        let mut sidecar = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut sidecar, &metadata)?;
        sidecar.flush()?;

        // Audio first: a sample only counts once its sidecar exists
        audio
            .persist(audio_path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write {}", audio_path.display()))?;
        sidecar
            .persist(metadata_path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write {}", metadata_path.display()))?;

        Ok(())
    }

    /// Run the archiver if one is configured; returns shards written
    fn archive(&self) -> usize {
        let Some(archiver) = &self.archiver else {
            return 0;
        };

        match archiver.run() {
            Ok(report) => report.shards.len(),
            Err(e) => {
                tracing::error!("Archiving failed: {}", e);
                0
            }
        }
    }
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

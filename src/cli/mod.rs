//! Command-line interface for speechbank.
//!
//! Provides commands for ingesting a corpus into a work table, driving a
//! TTS model over the pending records, packing finished samples into tar
//! shards, and inspecting progress.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::adapters::command::{CommandConfig, CommandSynthesizer};
use crate::adapters::{Synthesizer, KNOWN_MODELS};
use crate::config::{self, ResolvedConfig};
use crate::core::{ArchiveOptions, Archiver, DriverOptions, Manifest, SynthesisDriver, WorkStore};
use crate::ingest::{pool, IngestionPool, SpellingNormalizer, TextSplitter};

/// speechbank - text-to-speech dataset builder
#[derive(Parser, Debug)]
#[command(name = "speechbank")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Work table selection shared by several commands
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// SQLite database (defaults to config)
    #[arg(long, env = "SPEECHBANK_DB")]
    pub db: Option<PathBuf>,

    /// Work table, one per source/language (defaults to config)
    #[arg(short, long)]
    pub table: Option<String>,
}

/// Shard settings shared by `archive` and `synthesize`
#[derive(Args, Debug, Clone, Default)]
pub struct ShardArgs {
    /// Directory receiving {n}.tar shards (defaults to config)
    #[arg(long)]
    pub tar_dir: Option<PathBuf>,

    /// Samples per shard
    #[arg(long)]
    pub shard_size: Option<usize>,

    /// Shuffle samples before sharding
    #[arg(long)]
    pub shuffle: bool,

    /// Keep source files after packing (they will be packed again next run)
    #[arg(long)]
    pub keep_files: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a JSONL corpus into sentences and queue them
    Ingest {
        /// Corpus file, one {"text": ...} document per line
        corpus: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// British → American spelling table (defaults to config)
        #[arg(long)]
        normalization_table: Option<PathBuf>,

        /// Documents per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Records per insert transaction
        #[arg(long)]
        batch_size: Option<usize>,

        /// Worker threads (defaults to number of CPUs)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Synthesize every pending record
    Synthesize {
        #[command(flatten)]
        store: StoreArgs,

        /// Output directory for {id}.wav and {id}.json (defaults to config)
        #[arg(short, long)]
        save_dir: Option<PathBuf>,

        /// TTS program to run per sentence (defaults to config)
        #[arg(long)]
        program: Option<String>,

        /// Program argument; may use {output}, {model} and {text} (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Model identifier (see `speechbank models`)
        #[arg(short, long)]
        model: Option<String>,

        /// Language recorded in the sidecar (defaults to the model's)
        #[arg(long)]
        language: Option<String>,

        /// Stop after N records
        #[arg(long)]
        limit: Option<usize>,

        /// Archive every N records
        #[arg(long)]
        archive_every: Option<usize>,

        /// Do not archive while synthesizing
        #[arg(long)]
        no_archive: bool,

        #[command(flatten)]
        shards: ShardArgs,
    },

    /// Pack finished samples into tar shards
    Archive {
        /// Directory of finished samples (defaults to config save_dir)
        #[arg(short, long)]
        source: Option<PathBuf>,

        #[command(flatten)]
        shards: ShardArgs,

        /// First shard index (defaults to one past the manifest's highest)
        #[arg(long)]
        start_idx: Option<usize>,

        /// Keep running, re-archiving every N seconds until Ctrl+C
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show work table and shard progress
    Status {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// List known pretrained models
    Models,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Ingest {
                corpus,
                store,
                normalization_table,
                chunk_size,
                batch_size,
                workers,
            } => {
                ingest(corpus, store, normalization_table, chunk_size, batch_size, workers).await
            }
            Commands::Synthesize {
                store,
                save_dir,
                program,
                args,
                model,
                language,
                limit,
                archive_every,
                no_archive,
                shards,
            } => {
                let request = SynthesizeRequest {
                    store,
                    save_dir,
                    program,
                    args,
                    model,
                    language,
                    limit,
                    archive_every,
                    no_archive,
                    shards,
                };
                synthesize(request).await
            }
            Commands::Archive {
                source,
                shards,
                start_idx,
                interval,
            } => archive(source, shards, start_idx, interval).await,
            Commands::Status { store } => show_status(store).await,
            Commands::Models => {
                list_models();
                Ok(())
            }
            Commands::Config => show_config(),
        }
    }
}

fn resolve_store(cfg: &ResolvedConfig, args: StoreArgs) -> (PathBuf, String) {
    (
        args.db.unwrap_or_else(|| cfg.database.clone()),
        args.table.unwrap_or_else(|| cfg.table.clone()),
    )
}

fn archive_options(
    cfg: &ResolvedConfig,
    source_dir: PathBuf,
    shards: ShardArgs,
    start_idx: Option<usize>,
) -> ArchiveOptions {
    ArchiveOptions {
        source_dir,
        tar_dir: shards.tar_dir.unwrap_or_else(|| cfg.tar_dir.clone()),
        shard_size: shards.shard_size.unwrap_or(cfg.archive.shard_size),
        shuffle: shards.shuffle || cfg.archive.shuffle,
        delete_files: !shards.keep_files && cfg.archive.delete_files,
        start_idx,
    }
}

/// Set the returned flag on Ctrl+C
fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current record...");
            flag.store(true, Ordering::Relaxed);
        }
    });
    stop
}

/// Split a corpus and queue the sentences
async fn ingest(
    corpus: PathBuf,
    store: StoreArgs,
    normalization_table: Option<PathBuf>,
    chunk_size: Option<usize>,
    batch_size: Option<usize>,
    workers: Option<usize>,
) -> Result<()> {
    let cfg = config::config()?;
    let (db, table) = resolve_store(cfg, store);
    let table_path = normalization_table.unwrap_or_else(|| cfg.normalization_table.clone());

    let mut options = cfg.ingest.clone();
    if let Some(n) = chunk_size {
        options.chunk_size = n;
    }
    if let Some(n) = batch_size {
        options.batch_size = n;
    }
    if let Some(n) = workers {
        options.workers = n;
    }

    if let Some(parent) = db.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let normalizer = SpellingNormalizer::from_file(&table_path)?;
    let ingestion = IngestionPool::new(&db, &table, TextSplitter::new(normalizer), options);

    println!("📥 Ingesting {} into {}:{}", corpus.display(), db.display(), table);
    let report =
        tokio::task::spawn_blocking(move || pool::ingest_file(&ingestion, &corpus)).await??;

    println!();
    println!("Ingestion Results:");
    println!("  Documents:        {}", report.documents);
    println!("  Chunks:           {}", report.chunks);
    println!("  Records inserted: {}", report.records_inserted);
    if !report.is_clean() {
        anyhow::bail!("{} of {} chunks failed", report.failed_chunks, report.chunks);
    }

    Ok(())
}

struct SynthesizeRequest {
    store: StoreArgs,
    save_dir: Option<PathBuf>,
    program: Option<String>,
    args: Vec<String>,
    model: Option<String>,
    language: Option<String>,
    limit: Option<usize>,
    archive_every: Option<usize>,
    no_archive: bool,
    shards: ShardArgs,
}

/// Drive the TTS program over every pending record
async fn synthesize(request: SynthesizeRequest) -> Result<()> {
    let cfg = config::config()?;
    let (db, table) = resolve_store(cfg, request.store);

    let program = request
        .program
        .or_else(|| cfg.synthesis.program.clone())
        .context("No TTS program configured. Use --program or set synthesis.program in config")?;
    let args = if request.args.is_empty() {
        cfg.synthesis.args.clone()
    } else {
        request.args
    };
    let synthesizer = CommandSynthesizer::new(CommandConfig {
        program,
        args,
        model: request.model.unwrap_or_else(|| cfg.synthesis.model.clone()),
        language: request.language.or_else(|| cfg.synthesis.language.clone()),
    });

    let save_dir = request.save_dir.unwrap_or_else(|| cfg.save_dir.clone());
    let options = DriverOptions {
        save_dir: save_dir.clone(),
        audio_ext: cfg.synthesis.audio_ext.clone(),
        limit: request.limit,
        archive_every: request.archive_every.unwrap_or(cfg.synthesis.archive_every),
    };
    let archiver = (!request.no_archive)
        .then(|| Archiver::new(archive_options(cfg, save_dir, request.shards, None)));

    println!(
        "🔊 Synthesizing {}:{} with {} ({})",
        db.display(),
        table,
        synthesizer.model_id(),
        synthesizer.language()
    );

    let stop = stop_on_ctrl_c();
    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let store = WorkStore::open(&db, &table)
            .with_context(|| format!("Failed to open work store: {}", db.display()))?;

        let mut driver = SynthesisDriver::new(&store, synthesizer, options).with_stop_flag(stop);
        if let Some(archiver) = archiver {
            driver = driver.with_archiver(archiver);
        }
        driver.run()
    })
    .await??;

    println!();
    println!("Synthesis Results:");
    println!("  Processed:  {}", report.processed);
    println!("  Failed:     {}", report.failed);
    println!("  Skipped:    {}", report.skipped);
    println!("  Shards:     {}", report.archived_shards);
    if report.failed > 0 {
        println!();
        println!("ℹ️  Failed records stay pending and will be retried on the next run");
    }

    Ok(())
}

/// Pack finished samples, once or on an interval
async fn archive(
    source: Option<PathBuf>,
    shards: ShardArgs,
    start_idx: Option<usize>,
    interval: Option<u64>,
) -> Result<()> {
    let cfg = config::config()?;
    let source = source.unwrap_or_else(|| cfg.save_dir.clone());
    let archiver = Arc::new(Archiver::new(archive_options(cfg, source, shards, start_idx)));

    let Some(secs) = interval else {
        return run_archiver(archiver).await;
    };

    if start_idx.is_some() {
        anyhow::bail!("--start-idx cannot be combined with --interval");
    }

    println!("👁️  Archiving every {}s, press Ctrl+C to stop", secs);
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_archiver(archiver.clone()).await {
                    tracing::error!("Archive pass failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("🛑 Stopping archiver...");
                break;
            }
        }
    }

    Ok(())
}

async fn run_archiver(archiver: Arc<Archiver>) -> Result<()> {
    let report = tokio::task::spawn_blocking(move || archiver.run()).await??;

    if report.shards.is_empty() {
        println!("ℹ️  Nothing to archive");
    }
    for shard in &report.shards {
        println!("📦 {} ({} samples)", shard.path.display(), shard.entries);
    }
    if report.incomplete > 0 {
        println!("   Skipped {} incomplete sample(s)", report.incomplete);
    }

    Ok(())
}

/// Show work table and manifest progress
async fn show_status(store: StoreArgs) -> Result<()> {
    let cfg = config::config()?;
    let (db, table) = resolve_store(cfg, store);
    if !db.exists() {
        anyhow::bail!("Database not found: {}", db.display());
    }

    let stats = {
        let db = db.clone();
        let table = table.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            Ok(WorkStore::open(&db, &table)?.stats()?)
        })
        .await??
    };
    let manifest_path = crate::core::archiver::manifest_path_for(&cfg.tar_dir);
    let manifest = Manifest::load(&manifest_path)?;

    println!();
    println!("speechbank Status");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Database:  {}", db.display());
    println!("Table:     {}", table);
    println!();
    println!("Records:");
    println!("  Pending:   {}", stats.pending);
    println!("  Complete:  {}", stats.complete);
    println!("  Total:     {}", stats.total);
    println!("  Progress:  {:.1}%", stats.progress() * 100.0);
    println!();
    println!("Shards ({}):", display_or_missing(&manifest_path));
    println!("  Shards:    {}", manifest.sizes.len());
    println!("  Samples:   {}", manifest.total_entries());
    println!();

    Ok(())
}

fn display_or_missing(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{}, not written yet", path.display())
    }
}

/// List the model catalog
fn list_models() {
    println!("{:<50} {:<8}", "MODEL", "LANGUAGE");
    println!("{}", "-".repeat(60));
    for model in KNOWN_MODELS {
        println!("{:<50} {:<8}", model.id, model.language);
    }
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    let config_file = cfg
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none, using defaults)".to_string());

    println!("Config file:         {}", config_file);
    println!("Home:                {}", cfg.home.display());
    println!("Database:            {}", cfg.database.display());
    println!("Table:               {}", cfg.table);
    println!("Normalization table: {}", cfg.normalization_table.display());
    println!("Save dir:            {}", cfg.save_dir.display());
    println!("Tar dir:             {}", cfg.tar_dir.display());
    println!();
    println!(
        "Ingest:     chunk_size={} batch_size={} workers={}",
        cfg.ingest.chunk_size, cfg.ingest.batch_size, cfg.ingest.workers
    );
    println!(
        "Synthesis:  program={} model={} archive_every={}",
        cfg.synthesis.program.as_deref().unwrap_or("(unset)"),
        cfg.synthesis.model,
        cfg.synthesis.archive_every
    );
    println!(
        "Archive:    shard_size={} shuffle={} delete_files={}",
        cfg.archive.shard_size, cfg.archive.shuffle, cfg.archive.delete_files
    );

    Ok(())
}

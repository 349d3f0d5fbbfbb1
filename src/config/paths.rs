//! Canonical layout for the speechbank pipeline.
//!
//! Single source of truth for default file names; `config` joins them onto
//! the resolved home directory.
//!
//! ## Layout (defaults, under $SPEECHBANK_HOME)
//!
//! | Location | Owner | Purpose |
//! |----------|-------|---------|
//! | speechbank.db | WorkStore | Work tables |
//! | english.json | Splitter | Spelling table |
//! | samples/ | Driver | `{id}.wav` + `{id}.json` |
//! | shards/ | Archiver | `{n}.tar` |
//! | sizes.json | Archiver | Shard manifest (parent of shards/) |

pub const DATABASE_FILE: &str = "speechbank.db";
pub const NORMALIZATION_FILE: &str = "english.json";
pub const SAMPLES_DIR: &str = "samples";
pub const SHARDS_DIR: &str = "shards";

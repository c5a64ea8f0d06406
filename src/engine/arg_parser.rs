use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resumable per-object metadata index for ZFS pools, built from zdb output.
#[derive(Clone, Parser)]
#[command(name = "zdb-index")]
#[command(about = "Index dnode metadata from a ZFS dataset via zdb.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Dataset to inspect (pool/filesystem; must contain '/').
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Path to the index database. Default: ~/.zdb-index/<dataset>.db
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Suppress the live status counter on stderr.
    #[arg(long)]
    pub no_status: bool,

    /// Debug logging (echoes the zdb argv and checkpoint saves).
    #[arg(long)]
    pub debug: bool,

    /// Stop a phase after N records (for testing).
    #[arg(long, value_name = "N")]
    pub exit_early: Option<u64>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Two-phase scan: structural pass, then path enrichment for plain files.
    Scan {
        #[command(flatten)]
        common: CommonArgs,

        /// Structural pass only; skip path enrichment.
        #[arg(long)]
        skip_paths: bool,

        /// Object ids per enrichment zdb invocation.
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },
    /// Structural scan that prints `object_id parent_id` for every object
    /// whose parent is in the watch set.
    Parents {
        #[command(flatten)]
        common: CommonArgs,

        /// Parent object ids to watch.
        #[arg(value_name = "PARENT_ID")]
        parents: Vec<u64>,
    },
    /// Print the summary for an existing index without scanning.
    Report {
        #[command(flatten)]
        common: CommonArgs,
    },
}

//! Application configuration constants.
//! Tuning, zdb argument vectors, and index paths in one place.

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::{ScanError, ScanResult};

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived paths: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    data_dir_name: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                data_dir_name: format!(".{pkg}"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Directory under $HOME holding per-dataset index databases.
    pub fn data_dir_name(&self) -> &str {
        &self.data_dir_name
    }
}

/// Index DB path for a dataset: the override if given, else
/// `~/.zdb-index/<dataset with '/' -> '_'>.db`. Stable per dataset so a later
/// run can reopen and resume.
pub fn index_db_path(dataset: &str, db_override: Option<&PathBuf>) -> ScanResult<PathBuf> {
    if let Some(p) = db_override {
        return Ok(p.clone());
    }
    let home = dirs_next::home_dir().ok_or_else(|| ScanError::NoIndexDir {
        dataset: dataset.to_string(),
    })?;
    Ok(home
        .join(PackagePaths::get().data_dir_name())
        .join(format!("{}.db", dataset.replace('/', "_"))))
}

// ---- External tool ----

/// The pool-debugging binary.
pub const ZDB_BIN: &str = "zdb";

/// Phase 1: structural dump of the whole dataset, no path resolution.
pub fn phase1_argv(dataset: &str) -> Vec<String> {
    vec![
        ZDB_BIN.to_string(),
        "-L".to_string(),
        "-dddd".to_string(),
        dataset.to_string(),
    ]
}

/// Phase 2: same dump restricted to the given object ids, with the extra
/// verbosity level that turns on path resolution.
pub fn phase2_argv(dataset: &str, ids: &[u64]) -> Vec<String> {
    let mut argv = vec![
        ZDB_BIN.to_string(),
        "-L".to_string(),
        "-ddddd".to_string(),
        dataset.to_string(),
    ];
    argv.extend(ids.iter().map(|id| id.to_string()));
    argv
}

// ---- Checkpointing / batching ----

/// Checkpoint the index every this many finalized records. Too frequent
/// harms throughput (whole-map snapshot), too rare risks losing hours of a
/// long scan.
pub const CHECKPOINT_EVERY: u64 = 40_000;

/// Default object ids per phase-2 zdb invocation. Bounds argv length and
/// per-invocation tool overhead.
pub const DEFAULT_ENRICH_BATCH: usize = 1_000;

// ---- Streaming ----

/// Line channel capacity between the subprocess reader thread and the
/// parser. Bounded so a slow consumer backpressures the reader (and, through
/// the pipe, zdb itself).
pub const LINE_CHANNEL_CAP: usize = 8_192;
